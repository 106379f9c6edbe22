//! Effective worker configuration with provenance
//!
//! Built once at startup from built-in defaults, an optional TOML file and
//! environment overrides, then handed to the job loop by reference and never
//! mutated again.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::defaults::{DEFAULT_CONFIG_FILE, DEFAULT_PUBLIC_URL};

/// Environment variable overriding `queue.api_root`.
pub const ENV_API_ROOT: &str = "PACKAGE_API_ROOT";
/// Environment variable overriding `storage.package_bucket`.
pub const ENV_PACKAGE_BUCKET: &str = "PACKAGE_BUCKET_NAME";
/// Environment variable overriding `storage.build_logs_bucket`.
pub const ENV_BUILD_LOGS_BUCKET: &str = "BUILD_LOGS_BUCKET_NAME";

/// Errors loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Job queue settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Root URL of the package API; endpoints live under `{api_root}/packages/`.
    pub api_root: String,
}

/// Where artifacts are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local directory, one subdirectory per bucket
    Fs,
    /// HTTP PUT to an S3-compatible endpoint
    Http,
}

/// Blob storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the `fs` backend
    pub root: PathBuf,
    /// Endpoint for the `http` backend
    pub endpoint: Option<String>,
    /// Public URL template; `{bucket}` is replaced with the bucket name.
    /// When unset, `http` uses the S3 bucket URL and `fs` a `file://` URL
    /// under `root`.
    pub public_url: Option<String>,
    pub package_bucket: String,
    pub build_logs_bucket: String,
}

impl StorageConfig {
    /// Public URL template in effect for the configured backend.
    pub fn public_url_template(&self) -> std::io::Result<String> {
        if let Some(template) = &self.public_url {
            return Ok(template.clone());
        }
        match self.backend {
            StorageBackend::Http => Ok(DEFAULT_PUBLIC_URL.to_string()),
            StorageBackend::Fs => {
                let root = if self.root.is_absolute() {
                    self.root.clone()
                } else {
                    std::env::current_dir()?.join(&self.root)
                };
                let root = root.to_string_lossy().replace('\\', "/");
                let root = root.trim_end_matches('/');
                let sep = if root.starts_with('/') { "" } else { "/" };
                Ok(format!("file://{}{}/{{bucket}}", sep, root))
            }
        }
    }
}

/// Per-job working area settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Fixed start directory; job directories are created beneath it
    pub work_dir: PathBuf,
    /// Largest source archive that will be downloaded
    pub max_archive_bytes: u64,
}

/// A supported compiler, selected by manifest version prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerVersion {
    /// Version prefix matched against `elm-version`, also reported as the
    /// compiler version
    pub prefix: String,
    /// Executable name or path
    pub binary: String,
}

/// Compiler runner settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    pub timeout_seconds: u64,
    pub max_log_bytes: u64,
    pub max_report_field_chars: usize,
    pub versions: Vec<CompilerVersion>,
}

/// The complete worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub workspace: WorkspaceConfig,
    pub compiler: CompilerConfig,
}

/// The config file that contributed to the effective config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// SHA-256 digest of the raw file bytes
    pub digest: String,
}

/// Configuration together with where it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: WorkerConfig,
    pub source: Option<ConfigSource>,
}

impl WorkerConfig {
    /// Load defaults overlaid with a TOML file.
    ///
    /// An explicit `path` must exist. Without one, `eco-worker.toml` in the
    /// current directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                fallback.exists().then_some(fallback)
            }
        };

        let Some(path) = path else {
            return Ok(LoadedConfig {
                config: WorkerConfig::default(),
                source: None,
            });
        };

        let bytes = fs::read(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let digest = {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            hex::encode(hasher.finalize())
        };
        let contents = String::from_utf8_lossy(&bytes);
        let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        Ok(LoadedConfig {
            config,
            source: Some(ConfigSource { path, digest }),
        })
    }

    /// Apply the deployment's environment overrides.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_API_ROOT).filter(|v| !v.is_empty()) {
            self.queue.api_root = root;
        }
        if let Some(bucket) = lookup(ENV_PACKAGE_BUCKET).filter(|v| !v.is_empty()) {
            self.storage.package_bucket = bucket;
        }
        if let Some(bucket) = lookup(ENV_BUILD_LOGS_BUCKET).filter(|v| !v.is_empty()) {
            self.storage.build_logs_bucket = bucket;
        }
    }

    /// Reject configurations the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.api_root.trim().is_empty() {
            return Err(ConfigError::Invalid("queue.api_root is empty".to_string()));
        }
        if self.storage.package_bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.package_bucket is empty".to_string()));
        }
        if self.storage.build_logs_bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.build_logs_bucket is empty".to_string()));
        }
        if self.storage.backend == StorageBackend::Http && self.storage.endpoint.is_none() {
            return Err(ConfigError::Invalid(
                "storage.endpoint is required for the http backend".to_string(),
            ));
        }
        if let Some(template) = &self.storage.public_url {
            if template.trim().is_empty() {
                return Err(ConfigError::Invalid("storage.public_url is empty".to_string()));
            }
        }
        if self.workspace.max_archive_bytes == 0 {
            return Err(ConfigError::Invalid("workspace.max_archive_bytes must be > 0".to_string()));
        }
        if self.compiler.timeout_seconds == 0 {
            return Err(ConfigError::Invalid("compiler.timeout_seconds must be > 0".to_string()));
        }
        if self.compiler.max_log_bytes == 0 {
            return Err(ConfigError::Invalid("compiler.max_log_bytes must be > 0".to_string()));
        }
        if self.compiler.versions.is_empty() {
            return Err(ConfigError::Invalid("compiler.versions is empty".to_string()));
        }
        for (i, version) in self.compiler.versions.iter().enumerate() {
            if version.prefix.is_empty() || version.binary.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "compiler.versions[{}] needs both prefix and binary",
                    i
                )));
            }
            if self.compiler.versions[..i].iter().any(|v| v.prefix == version.prefix) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate compiler prefix '{}'",
                    version.prefix
                )));
            }
        }
        Ok(())
    }
}
