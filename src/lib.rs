//! Eco build worker - package build worker for the Elm package catalogue
//!
//! Polls a job queue for published package versions, downloads each source
//! archive, keeps only the files that make up the package, compiles it with
//! the matching compiler, stores a canonical archive and reports the result
//! back to the queue.

pub mod archive;
pub mod blob;
pub mod compiler;
pub mod config;
mod http_client;
pub mod manifest;
pub mod pipeline;
pub mod queue;
pub mod signal;
pub mod summary;
pub mod workspace;

pub use archive::{digest_archive, ArchiveFetcher, ContentDigest, HttpFetcher};
pub use blob::{BlobStore, ConfiguredBlobStore, FsBlobStore, HttpBlobStore};
pub use compiler::{CompileOutcome, CompilerRunner};
pub use config::{LoadedConfig, WorkerConfig};
pub use pipeline::{FatalError, JobLoop, JobOutcome, Stage};
pub use queue::{HttpJobQueue, JobQueue};
pub use summary::{ExitCode, RunSummary};
