//! Worker configuration
//!
//! Layers, later wins:
//! 1. Built-in defaults
//! 2. TOML file (`--config`, or `eco-worker.toml` if present)
//! 3. Environment (`PACKAGE_API_ROOT`, `PACKAGE_BUCKET_NAME`, `BUILD_LOGS_BUCKET_NAME`)
//! 4. CLI flags

mod defaults;
mod effective;

pub use defaults::{
    DEFAULT_API_ROOT, DEFAULT_COMPILERS, DEFAULT_CONFIG_FILE, DEFAULT_MAX_ARCHIVE_BYTES,
    DEFAULT_MAX_LOG_BYTES, DEFAULT_MAX_REPORT_FIELD_CHARS, DEFAULT_PUBLIC_URL,
};
pub use effective::{
    CompilerConfig, CompilerVersion, ConfigError, ConfigSource, LoadedConfig, QueueConfig,
    StorageBackend, StorageConfig, WorkerConfig, WorkspaceConfig, ENV_API_ROOT,
    ENV_BUILD_LOGS_BUCKET, ENV_PACKAGE_BUCKET,
};
