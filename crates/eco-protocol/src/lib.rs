//! Package Build Queue Protocol Types
//!
//! Request and response bodies exchanged with the package job queue:
//!
//! - `GET  /packages/nextjob`      -> [`Job`]
//! - `POST /packages/{seq}/error`  <- [`ErrorReport`] or [`CompileErrorReport`]
//! - `POST /packages/{seq}/ready`  <- [`ReadyReport`]

pub mod job;
pub mod report;

pub use job::Job;
pub use report::{CompileErrorReport, CompileReport, ErrorReason, ErrorReport, ReadyReport};

/// Path segment under the API root for package endpoints.
pub const PACKAGES_PATH: &str = "packages";
