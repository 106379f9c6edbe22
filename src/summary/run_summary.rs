//! Per-process job counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eco_protocol::ErrorReason;

use crate::pipeline::JobOutcome;

/// Counts of jobs handled by one worker process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    /// When the loop started
    pub started_at: DateTime<Utc>,

    /// Jobs that reached a terminal report
    pub processed: u64,

    /// Jobs reported ready
    pub ready: u64,

    /// Jobs reported with an input error reason
    pub errored: u64,

    /// Jobs reported as compile failures
    pub compile_failed: u64,

    /// Whether the loop stopped on a shutdown request rather than an empty queue
    pub interrupted: bool,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            processed: 0,
            ready: 0,
            errored: 0,
            compile_failed: 0,
            interrupted: false,
        }
    }

    /// Count a reported job
    pub fn record(&mut self, outcome: &JobOutcome) {
        self.processed += 1;
        match outcome {
            JobOutcome::Ready => self.ready += 1,
            JobOutcome::Errored(ErrorReason::CompileFailed) | JobOutcome::CompileFailed => {
                self.compile_failed += 1
            }
            JobOutcome::Errored(_) => self.errored += 1,
        }
    }

    /// One-line human summary
    pub fn human_summary(&self) -> String {
        let mut line = format!(
            "{} job{} processed: {} ready, {} errored, {} compile-failed",
            self.processed,
            if self.processed == 1 { "" } else { "s" },
            self.ready,
            self.errored,
            self.compile_failed
        );
        if self.interrupted {
            line.push_str(" (stopped on interrupt)");
        }
        line
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
