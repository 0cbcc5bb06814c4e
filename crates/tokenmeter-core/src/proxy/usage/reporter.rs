//! Bounded background delivery of usage events.
//!
//! Handlers enqueue with `try_send` and never wait. A single worker drains the
//! queue with a fixed number of posts in flight. Delivery is at-most-once:
//! a full queue or a failed post loses the event, with a log line.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokenmeter_types::{BillingContext, GatewayConfig, Provider, TokenUsage, UsageEvent};

use super::UsageSink;

/// An event waiting for delivery, with the key it is posted under.
#[derive(Debug, Clone)]
pub struct PendingReport {
    pub event: UsageEvent,
    pub api_key: String,
}

/// Cheap handle used by request handlers.
#[derive(Debug, Clone)]
pub struct UsageReporter {
    tx: mpsc::Sender<PendingReport>,
}

impl UsageReporter {
    /// Start the worker and return the sending side.
    pub fn spawn(
        sink: Arc<dyn UsageSink>,
        capacity: usize,
        concurrency: usize,
    ) -> (Self, UsageWorker) {
        let (reporter, rx) = Self::bounded(capacity);
        (reporter, UsageWorker::spawn(sink, rx, concurrency))
    }

    pub fn from_config(config: &GatewayConfig, sink: Arc<dyn UsageSink>) -> (Self, UsageWorker) {
        Self::spawn(sink, config.usage_queue_capacity, config.usage_concurrency)
    }

    fn bounded(capacity: usize) -> (Self, mpsc::Receiver<PendingReport>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Build the event for one request and queue it.
    pub fn report(
        &self,
        context: &BillingContext,
        provider: Provider,
        model: &str,
        usage: TokenUsage,
    ) -> bool {
        let event = UsageEvent::new(context, provider, model, usage);
        self.dispatch(PendingReport { event, api_key: context.api_key.clone() })
    }

    /// Queue without waiting. Returns `false` when the event was dropped.
    pub fn dispatch(&self, report: PendingReport) -> bool {
        match self.tx.try_send(report) {
            Ok(()) => true,
            Err(TrySendError::Full(report)) => {
                tracing::warn!(
                    event_id = %report.event.event_id,
                    customer_id = %report.event.customer_id,
                    "Usage queue full, dropping event"
                );
                false
            },
            Err(TrySendError::Closed(report)) => {
                tracing::warn!(
                    event_id = %report.event.event_id,
                    "Usage worker stopped, dropping event"
                );
                false
            },
        }
    }
}

/// The background task draining the queue.
#[derive(Debug)]
pub struct UsageWorker {
    handle: JoinHandle<()>,
}

impl UsageWorker {
    fn spawn(
        sink: Arc<dyn UsageSink>,
        rx: mpsc::Receiver<PendingReport>,
        concurrency: usize,
    ) -> Self {
        let concurrency = concurrency.max(1);
        let handle = tokio::spawn(async move {
            ReceiverStream::new(rx)
                .for_each_concurrent(concurrency, |report| {
                    let sink = Arc::clone(&sink);
                    async move { deliver(sink.as_ref(), report).await }
                })
                .await;
            tracing::debug!("Usage worker finished");
        });
        Self { handle }
    }

    /// Wait for queued events to be delivered.
    ///
    /// Completes once every [`UsageReporter`] clone is dropped and the queue is
    /// empty. Returns `false` if `deadline` expired first.
    pub async fn drain(self, deadline: Duration) -> bool {
        match tokio::time::timeout(deadline, self.handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!("Usage worker panicked: {}", e);
                false
            },
            Err(_) => {
                tracing::warn!("Usage queue not drained within {:?}", deadline);
                false
            },
        }
    }
}

async fn deliver(sink: &dyn UsageSink, report: PendingReport) {
    let event = &report.event;
    match sink.send(event, &report.api_key).await {
        Ok(()) => tracing::debug!(
            event_id = %event.event_id,
            customer_id = %event.customer_id,
            input_tokens = event.input_tokens,
            output_tokens = event.output_tokens,
            "Usage event reported"
        ),
        Err(e) => tracing::error!(
            event_id = %event.event_id,
            customer_id = %event.customer_id,
            "Failed to report usage: {}",
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::usage::ReportError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(UsageEvent, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl UsageSink for RecordingSink {
        async fn send(&self, event: &UsageEvent, api_key: &str) -> Result<(), ReportError> {
            self.events.lock().unwrap().push((event.clone(), api_key.to_string()));
            if self.fail {
                Err(ReportError::Rejected { status: 500, body: "boom".to_string() })
            } else {
                Ok(())
            }
        }
    }

    fn context() -> BillingContext {
        BillingContext {
            customer_id: "cust-1".to_string(),
            user_id: "user-1".to_string(),
            feature_id: "chat".to_string(),
            api_key: "om_key".to_string(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_events_delivered_before_drain_completes() {
        let sink = Arc::new(RecordingSink::default());
        let (reporter, worker) = UsageReporter::spawn(sink.clone(), 8, 2);

        for i in 0..5 {
            assert!(reporter.report(&context(), Provider::Anthropic, "claude", TokenUsage::new(i, 1)));
        }
        drop(reporter);
        assert!(worker.drain(Duration::from_secs(5)).await);

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 5);
        assert!(events.iter().all(|(e, key)| key == "om_key" && e.provider == "ANTHROPIC"));
    }

    #[tokio::test]
    async fn test_full_queue_drops_event() {
        let (reporter, _rx) = UsageReporter::bounded(1);

        assert!(reporter.report(&context(), Provider::OpenAi, "gpt-4o", TokenUsage::new(1, 1)));
        assert!(!reporter.report(&context(), Provider::OpenAi, "gpt-4o", TokenUsage::new(2, 2)));
    }

    #[tokio::test]
    async fn test_closed_queue_drops_event() {
        let (reporter, rx) = UsageReporter::bounded(4);
        drop(rx);
        assert!(!reporter.report(&context(), Provider::Gemini, "gemini", TokenUsage::new(1, 0)));
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let sink = Arc::new(RecordingSink { fail: true, ..RecordingSink::default() });
        let (reporter, worker) = UsageReporter::spawn(sink.clone(), 4, 1);

        assert!(reporter.report(&context(), Provider::OpenAi, "gpt-4o", TokenUsage::new(3, 4)));
        drop(reporter);

        assert!(worker.drain(Duration::from_secs(5)).await);
        assert_eq!(sink.events.lock().unwrap().len(), 1);
    }
}
