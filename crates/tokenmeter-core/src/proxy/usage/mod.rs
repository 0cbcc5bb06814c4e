//! Best-effort usage reporting.

pub mod reporter;
pub mod sink;

pub use reporter::{PendingReport, UsageReporter, UsageWorker};
pub use sink::{IngestionClient, ReportError, UsageSink};
