//! Listening socket and shutdown triggers for the daemon.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use anyhow::{anyhow, Context, Result};
use listenfd::ListenFd;
use socket2::{Domain, Protocol, Socket, Type};
use tokenmeter_types::GatewayConfig;
use tokio::net::TcpListener;
use tokio::signal;

const LISTEN_BACKLOG: i32 = 4096;

/// Where the listening socket came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerSource {
    /// Handed over by the service manager (`LISTEN_FDS`).
    Inherited,
    /// Bound by this process.
    Bound(SocketAddr),
}

/// Take the socket passed by the service manager, or bind `host:port`.
pub async fn open_listener(config: &GatewayConfig) -> Result<(TcpListener, ListenerSource)> {
    if let Some(std_listener) = inherited_listener()? {
        std_listener.set_nonblocking(true)?;
        return Ok((TcpListener::from_std(std_listener)?, ListenerSource::Inherited));
    }

    let addr = resolve_bind_addr(config).await?;
    let std_listener =
        bind_reuseport(addr).with_context(|| format!("Failed to bind {}", addr))?;
    Ok((TcpListener::from_std(std_listener)?, ListenerSource::Bound(addr)))
}

fn inherited_listener() -> io::Result<Option<std::net::TcpListener>> {
    ListenFd::from_env().take_tcp_listener(0)
}

/// First address `host:port` resolves to. Accepts literal IPs and host names.
pub async fn resolve_bind_addr(config: &GatewayConfig) -> Result<SocketAddr> {
    let target = config.get_socket_addr();
    let addr = tokio::net::lookup_host(&target)
        .await
        .with_context(|| format!("Invalid bind address '{}'", target))?
        .next()
        .ok_or_else(|| anyhow!("Bind address '{}' resolved to nothing", target));
    addr
}

/// Non-blocking listener with `SO_REUSEADDR`, plus `SO_REUSEPORT` on unix so
/// a replacement process can bind while the old one drains.
pub fn bind_reuseport(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

/// Why the server stopped accepting connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM. A handler that cannot be installed is
/// logged and never fires.
pub async fn wait_for_shutdown() -> ShutdownReason {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => ShutdownReason::Interrupt,
        () = terminate => ShutdownReason::Terminate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_config() -> GatewayConfig {
        GatewayConfig { host: "127.0.0.1".to_string(), port: 0, ..GatewayConfig::default() }
    }

    #[tokio::test]
    async fn test_resolve_bind_addr_from_config() {
        let addr = resolve_bind_addr(&loopback_config()).await.unwrap();
        assert_eq!(addr, "127.0.0.1:0".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_bind_reuseport_assigns_port() {
        let listener = bind_reuseport("127.0.0.1:0".parse().unwrap()).unwrap();
        let local = listener.local_addr().unwrap();
        assert!(local.ip().is_loopback());
        assert_ne!(local.port(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_second_bind_shares_port() {
        let first = bind_reuseport("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = first.local_addr().unwrap();
        let second = bind_reuseport(addr).unwrap();
        assert_eq!(second.local_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn test_open_listener_binds_when_nothing_inherited() {
        let (listener, source) = open_listener(&loopback_config()).await.unwrap();
        assert_eq!(source, ListenerSource::Bound("127.0.0.1:0".parse().unwrap()));
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn test_shutdown_reason_names_signal() {
        assert_eq!(ShutdownReason::Interrupt.to_string(), "SIGINT");
        assert_eq!(ShutdownReason::Terminate.to_string(), "SIGTERM");
    }
}
