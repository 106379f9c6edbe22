//! Run summary and exit codes
//!
//! The worker logs one summary line when the loop stops, then exits with a
//! stable code.

mod exit_code;
mod run_summary;

pub use exit_code::ExitCode;
pub use run_summary::RunSummary;
