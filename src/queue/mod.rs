//! Job queue client
//!
//! The queue hands out one job per poll and receives exactly one terminal
//! report per job.

mod http;

pub use http::HttpJobQueue;

use eco_protocol::{CompileErrorReport, ErrorReason, Job, ReadyReport};

/// Errors talking to the job queue
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue unreachable: {0}")]
    Transport(String),

    #[error("Queue returned an undecodable job: {0}")]
    Decode(String),

    #[error("Queue server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },
}

/// How the queue answered a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
    /// 2xx
    Accepted,
    /// Any other non-500 status; logged and ignored
    Rejected { status: u16, body: String },
}

/// The job queue's request/response contract
///
/// Report methods return `Err` only for failures that must stop the worker:
/// an unreachable queue or a 500 from it.
pub trait JobQueue {
    /// Next pending job, or `None` when the queue has nothing to hand out.
    fn next_job(&self) -> Result<Option<Job>, QueueError>;

    fn report_error(&self, seq: u64, reason: ErrorReason) -> Result<Acknowledgement, QueueError>;

    fn report_compile_error(
        &self,
        seq: u64,
        report: &CompileErrorReport,
    ) -> Result<Acknowledgement, QueueError>;

    fn report_ready(&self, seq: u64, report: &ReadyReport) -> Result<Acknowledgement, QueueError>;
}
