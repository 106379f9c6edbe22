//! Job loop
//!
//! Each iteration walks one job through
//! `Polling → Fetching → Filtering → VersionCheck → Compiling → Packaging →
//! Hashing → Uploading → Reporting` and then polls again. Bad job input ends
//! the iteration with an error report; control-plane and local-environment
//! failures stop the loop with a [`FatalError`].

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use eco_classifier::PackageFilter;
use eco_protocol::{CompileErrorReport, ErrorReason, Job, ReadyReport};

use crate::archive::{
    digest_archive, extract_filtered_with_limits, repackage, ArchiveFetcher, ContentDigest,
    DigestError, ExtractError, ExtractLimits, FetchError, RepackError,
};
use crate::blob::{BlobError, BlobStore};
use crate::compiler::{Artifact, ArtifactNames, CompileError, CompileOutcome, CompilerRunner};
use crate::config::WorkerConfig;
use crate::manifest::PackageManifest;
use crate::queue::{Acknowledgement, JobQueue, QueueError};
use crate::signal::ShutdownState;
use crate::summary::{ExitCode, RunSummary};
use crate::workspace::{self, JobWorkspace};

/// Directory inside the job workspace the source archive is downloaded to.
/// GitHub owners cannot start with a dot, so it never collides with `<author>/`.
const DOWNLOAD_DIR: &str = ".download";

/// Job loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Polling,
    Fetching,
    Filtering,
    VersionCheck,
    Compiling,
    Packaging,
    Hashing,
    Uploading,
    Reporting,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Polling => "polling",
            Stage::Fetching => "fetching",
            Stage::Filtering => "filtering",
            Stage::VersionCheck => "version-check",
            Stage::Compiling => "compiling",
            Stage::Packaging => "packaging",
            Stage::Hashing => "hashing",
            Stage::Uploading => "uploading",
            Stage::Reporting => "reporting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was reported for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Ready,
    Errored(ErrorReason),
    CompileFailed,
}

/// Failures that stop the worker
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("Job queue failure: {0}")]
    Queue(#[from] QueueError),

    #[error("Job workspace error at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Archive download failed locally: {0}")]
    Fetch(#[source] FetchError),

    #[error("Archive extraction failed locally: {0}")]
    Extract(#[source] ExtractError),

    #[error("Packaging failed: {0}")]
    Packaging(#[from] RepackError),

    #[error("Hashing failed: {0}")]
    Hashing(#[from] DigestError),

    #[error("Compiler failure: {0}")]
    Compile(#[from] CompileError),

    #[error("Blob storage failure: {0}")]
    Blob(#[from] BlobError),

    #[error("Blob storage refused the package archive {bucket}/{object}")]
    ArchiveRefused { bucket: String, object: String },
}

impl FatalError {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::Fatal
    }

    fn workspace(path: &Path, source: io::Error) -> Self {
        Self::Workspace {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Terminal report for one job, before it is posted
#[derive(Debug, Clone, PartialEq)]
enum Report {
    Error(ErrorReason),
    CompileError(CompileErrorReport),
    Ready(ReadyReport),
}

/// Polls the queue and builds jobs until it is empty or shutdown is requested
pub struct JobLoop<'a, Q, F, B> {
    config: &'a WorkerConfig,
    queue: Q,
    fetcher: F,
    blobs: B,
    compiler: CompilerRunner,
    limits: ExtractLimits,
    shutdown: Arc<ShutdownState>,
}

impl<'a, Q, F, B> JobLoop<'a, Q, F, B>
where
    Q: JobQueue,
    F: ArchiveFetcher,
    B: BlobStore,
{
    pub fn new(config: &'a WorkerConfig, queue: Q, fetcher: F, blobs: B, shutdown: Arc<ShutdownState>) -> Self {
        Self {
            config,
            queue,
            fetcher,
            blobs,
            compiler: CompilerRunner::new(&config.compiler),
            limits: ExtractLimits::default(),
            shutdown,
        }
    }

    /// Replace the compiler runner
    pub fn with_compiler(mut self, compiler: CompilerRunner) -> Self {
        self.compiler = compiler;
        self
    }

    /// Replace the extraction safety limits
    pub fn with_limits(mut self, limits: ExtractLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Run until the queue has no job or a shutdown was requested.
    pub fn run(&self) -> Result<RunSummary, FatalError> {
        let work_dir = &self.config.workspace.work_dir;
        fs::create_dir_all(work_dir).map_err(|e| FatalError::workspace(work_dir, e))?;
        let reclaimed = workspace::cleanup_orphans(work_dir).map_err(|e| FatalError::workspace(work_dir, e))?;
        if reclaimed > 0 {
            tracing::info!(bytes = reclaimed, "removed orphaned job directories");
        }

        let mut summary = RunSummary::new(Utc::now());
        loop {
            if self.shutdown.is_shutdown_requested() {
                tracing::info!("shutdown requested, not polling again");
                summary.interrupted = true;
                break;
            }

            tracing::debug!(stage = %Stage::Polling, "polling for next job");
            let Some(job) = self.queue.next_job()? else {
                tracing::info!("no job available, exiting");
                break;
            };

            let outcome = self.process(&job)?;
            summary.record(&outcome);
        }

        tracing::info!(
            processed = summary.processed,
            ready = summary.ready,
            errored = summary.errored,
            compile_failed = summary.compile_failed,
            "{}",
            summary.human_summary()
        );
        Ok(summary)
    }

    /// Build one job and post exactly one terminal report for it.
    pub fn process(&self, job: &Job) -> Result<JobOutcome, FatalError> {
        let span = tracing::info_span!(
            "job",
            seq = job.seq,
            author = %job.author,
            name = %job.name,
            version = %job.version
        );
        let _entered = span.enter();
        tracing::info!(zip_url = %job.zip_url, "starting job");

        let workspace = JobWorkspace::create(&self.config.workspace.work_dir, job.seq)
            .map_err(|e| FatalError::workspace(&self.config.workspace.work_dir, e))?;
        let report = self.build(job, &workspace)?;

        tracing::debug!(stage = %Stage::Reporting, "reporting");
        let (outcome, ack) = match &report {
            Report::Error(reason) => {
                tracing::info!(reason = %reason, "reporting error");
                (JobOutcome::Errored(*reason), self.queue.report_error(job.seq, *reason)?)
            }
            Report::CompileError(payload) => {
                tracing::info!("reporting compile failure");
                (JobOutcome::CompileFailed, self.queue.report_compile_error(job.seq, payload)?)
            }
            Report::Ready(payload) => {
                tracing::info!(url = %payload.url, "reporting ready");
                (JobOutcome::Ready, self.queue.report_ready(job.seq, payload)?)
            }
        };
        if let Acknowledgement::Rejected { status, body } = ack {
            tracing::warn!(status, %body, "queue did not accept the report");
        }

        drop(workspace);
        Ok(outcome)
    }

    fn build(&self, job: &Job, workspace: &JobWorkspace) -> Result<Report, FatalError> {
        let package_dir = job.package_dir();
        if !is_path_segment(&job.author) || !is_path_segment(&package_dir) {
            tracing::warn!("job coordinates are not usable as directory names");
            return Ok(Report::Error(ErrorReason::PackageRenamed));
        }

        // Fetching
        tracing::debug!(stage = %Stage::Fetching, "downloading archive");
        let download_dir = workspace.path().join(DOWNLOAD_DIR);
        fs::create_dir_all(&download_dir).map_err(|e| FatalError::workspace(&download_dir, e))?;
        let fallback_name = format!("{}.zip", package_dir);
        let archive = match self.fetcher.fetch(&job.zip_url, &download_dir, Some(&fallback_name)) {
            Ok(path) => path,
            Err(err) if err.is_remote() => {
                tracing::warn!(error = %err, "source archive unavailable");
                return Ok(Report::Error(ErrorReason::NoGithubPackage));
            }
            Err(err) => return Err(FatalError::Fetch(err)),
        };

        // Filtering
        tracing::debug!(stage = %Stage::Filtering, "extracting package files");
        let filter = match PackageFilter::for_root(&package_dir) {
            Ok(filter) => filter,
            Err(err) => {
                tracing::warn!(error = %err, "cannot build a filter for the package directory");
                return Ok(Report::Error(ErrorReason::PackageRenamed));
            }
        };
        let source_root = workspace.source_root(&job.author);
        let extracted = match extract_filtered_with_limits(&archive, &source_root, &filter, self.limits) {
            Ok(names) => names,
            Err(err) if err.is_bad_archive() => {
                tracing::warn!(error = %err, "source archive unusable");
                return Ok(Report::Error(ErrorReason::NoGithubPackage));
            }
            Err(err) => return Err(FatalError::Extract(err)),
        };
        fs::remove_dir_all(&download_dir).map_err(|e| FatalError::workspace(&download_dir, e))?;

        let package_root = source_root.join(&package_dir);
        if extracted.is_empty() || !package_root.is_dir() {
            tracing::warn!(expected = %package_dir, "package directory missing from archive");
            return Ok(Report::Error(ErrorReason::PackageRenamed));
        }
        tracing::info!(files = extracted.len(), "extracted package files");

        // VersionCheck
        tracing::debug!(stage = %Stage::VersionCheck, "reading manifest");
        let manifest = match PackageManifest::load(&package_root) {
            Ok(manifest) => manifest,
            Err(err) => {
                tracing::warn!(error = %err, "no usable manifest");
                return Ok(Report::Error(ErrorReason::NotElmPackage));
            }
        };

        // Compiling
        tracing::debug!(stage = %Stage::Compiling, elm_version = %manifest.elm_version, "compiling");
        let names = ArtifactNames::new(workspace.path(), job, Utc::now());
        let run = self.compiler.compile(&package_root, &manifest.elm_version, &names)?;
        if let CompileOutcome::Failure {
            reason: reason @ ErrorReason::UnsupportedElmVersion,
            ..
        } = run.outcome
        {
            tracing::warn!(elm_version = %manifest.elm_version, "unsupported compiler version");
            return Ok(Report::Error(reason));
        }

        // Packaging
        tracing::debug!(stage = %Stage::Packaging, "building canonical archive");
        let archive_object = format!("{}.zip", package_dir);
        let canonical = repackage(&source_root, &package_dir, &workspace.path().join(&archive_object))?;

        // Hashing
        tracing::debug!(stage = %Stage::Hashing, "hashing canonical archive");
        let digest = digest_archive(&canonical)?;
        tracing::info!(
            sha1_zip_archive = %digest.archive_digest,
            sha1_package_contents = %digest.contents_digest,
            "hashed canonical archive"
        );

        // Uploading
        tracing::debug!(stage = %Stage::Uploading, "uploading artifacts");
        let log_url = run.log.as_ref().map(|log| self.upload_log(log));
        let json_report_url = run.json_report.as_ref().map(|report| self.upload_log(report));
        let url = self.upload_archive(&canonical, &archive_object)?;

        let ContentDigest {
            archive_digest,
            contents_digest,
        } = digest;
        match run.outcome {
            CompileOutcome::Success => Ok(Report::Ready(ReadyReport {
                elm_json: manifest.into_raw(),
                url,
                sha1_zip_archive: archive_digest,
                sha1_package_contents: contents_digest,
            })),
            CompileOutcome::Failure { reason, detail } => Ok(Report::CompileError(CompileErrorReport {
                error_reason: reason,
                compiler_version: run.compiler_version.unwrap_or_default(),
                report_json: detail,
                compile_log_url: log_url.unwrap_or_default(),
                json_report_url,
                url,
                sha1_zip_archive: archive_digest,
                sha1_package_contents: contents_digest,
            })),
        }
    }

    /// Upload a build log; failures are logged and the URL is still returned.
    fn upload_log(&self, artifact: &Artifact) -> String {
        let bucket = &self.config.storage.build_logs_bucket;
        let url = self.blobs.object_url(bucket, &artifact.name);
        let stored = fs::read(&artifact.path)
            .map_err(BlobError::from)
            .and_then(|bytes| self.blobs.put(bucket, &artifact.name, &bytes));
        match stored {
            Ok(true) => tracing::info!(%url, "uploaded build log"),
            Ok(false) => tracing::warn!(%url, "blob storage refused build log"),
            Err(err) => tracing::warn!(%url, error = %err, "failed to upload build log"),
        }
        url
    }

    fn upload_archive(&self, path: &Path, object: &str) -> Result<String, FatalError> {
        let bucket = &self.config.storage.package_bucket;
        let bytes = fs::read(path).map_err(BlobError::from)?;
        if !self.blobs.put(bucket, object, &bytes)? {
            return Err(FatalError::ArchiveRefused {
                bucket: bucket.clone(),
                object: object.to_string(),
            });
        }
        let url = self.blobs.object_url(bucket, object);
        tracing::info!(%url, bytes = bytes.len(), "uploaded package archive");
        Ok(url)
    }
}

/// A single, non-special path component
fn is_path_segment(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.starts_with('.')
        && !value.contains(['/', '\\', '\0'])
}
