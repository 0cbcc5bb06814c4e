//! Buffer-then-emit capture of a streamed upstream reply.
//!
//! Every chunk is appended to the reply in arrival order, while complete
//! `data:` lines are decoded on the side for usage counters.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::proxy::common::{data_payload, SseLineBuffer};
use crate::proxy::providers::{ProviderAdapter, UsageAccumulator};

const DONE_MARKER: &str = "[DONE]";

/// Drain `stream` to the end and return the concatenated bytes.
pub async fn drain_event_stream<A, S, E>(
    adapter: &A,
    stream: S,
    acc: &mut UsageAccumulator,
) -> Result<Bytes, E>
where
    A: ProviderAdapter + ?Sized,
    S: Stream<Item = Result<Bytes, E>>,
{
    tokio::pin!(stream);

    let mut body = BytesMut::new();
    let mut lines = SseLineBuffer::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        body.extend_from_slice(&chunk);
        for line in lines.push(&chunk) {
            observe_line(adapter, &line, acc);
        }
    }
    if let Some(line) = lines.finish() {
        observe_line(adapter, &line, acc);
    }

    Ok(body.freeze())
}

fn observe_line<A: ProviderAdapter + ?Sized>(adapter: &A, line: &str, acc: &mut UsageAccumulator) {
    let Some(payload) = data_payload(line) else {
        return;
    };
    let payload = payload.trim();
    if payload.is_empty() || payload == DONE_MARKER {
        return;
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(event) => adapter.observe_stream_event(&event, acc),
        Err(e) => tracing::debug!("Skipping non-JSON SSE payload: {}", e),
    }
}
