//! Built-in worker defaults (layer 1)
//!
//! Hardcoded defaults for every configuration value.

use std::path::PathBuf;

use super::effective::{
    CompilerConfig, CompilerVersion, QueueConfig, StorageBackend, StorageConfig, WorkerConfig,
    WorkspaceConfig,
};

/// Config file looked up in the current directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "eco-worker.toml";

/// Default job queue root.
pub const DEFAULT_API_ROOT: &str = "http://localhost:3000";

/// Default public URL template for objects uploaded by the `http` backend.
pub const DEFAULT_PUBLIC_URL: &str = "https://{bucket}.s3.amazonaws.com";

/// Default bucket for canonical package archives.
pub const DEFAULT_PACKAGE_BUCKET: &str = "eco-packages";

/// Default bucket for compile logs and reports.
pub const DEFAULT_BUILD_LOGS_BUCKET: &str = "eco-build-logs";

/// Default compile timeout (15 minutes).
pub const DEFAULT_COMPILE_TIMEOUT_SECONDS: u64 = 900;

/// Default cap on captured compiler output (4 MiB).
pub const DEFAULT_MAX_LOG_BYTES: u64 = 4 * 1024 * 1024;

/// Default cap on each whitelisted report field.
pub const DEFAULT_MAX_REPORT_FIELD_CHARS: usize = 1024;

/// Default cap on downloaded archives (256 MiB).
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 256 * 1024 * 1024;

/// Compilers supported out of the box: (version prefix, binary).
pub const DEFAULT_COMPILERS: &[(&str, &str)] = &[("0.19.0", "elm19"), ("0.19.1", "elm")];

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            storage: StorageConfig::default(),
            workspace: WorkspaceConfig::default(),
            compiler: CompilerConfig::default(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: PathBuf::from("blobs"),
            endpoint: None,
            public_url: None,
            package_bucket: DEFAULT_PACKAGE_BUCKET.to_string(),
            build_logs_bucket: DEFAULT_BUILD_LOGS_BUCKET.to_string(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            max_archive_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_COMPILE_TIMEOUT_SECONDS,
            max_log_bytes: DEFAULT_MAX_LOG_BYTES,
            max_report_field_chars: DEFAULT_MAX_REPORT_FIELD_CHARS,
            versions: DEFAULT_COMPILERS
                .iter()
                .map(|(prefix, binary)| CompilerVersion {
                    prefix: prefix.to_string(),
                    binary: binary.to_string(),
                })
                .collect(),
        }
    }
}
