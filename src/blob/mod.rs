//! Blob storage sinks for build logs and canonical archives
//!
//! A sink only needs `put(bucket, object, bytes)`; public URLs are derived
//! from a `{bucket}` template so reports point where consumers download from.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{StorageBackend, StorageConfig};
use crate::http_client;

/// Errors that prevent an upload from being attempted or completed
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Storage unreachable: {0}")]
    Transport(String),

    #[error("Invalid object name: {0}")]
    InvalidName(String),

    #[error("Storage endpoint not configured for the http backend")]
    MissingEndpoint,
}

/// Put-object sink
pub trait BlobStore {
    /// Store `bytes` as `bucket/object`. `Ok(false)` means the store refused it.
    fn put(&self, bucket: &str, object: &str, bytes: &[u8]) -> Result<bool, BlobError>;

    /// Public URL of `bucket/object`.
    fn object_url(&self, bucket: &str, object: &str) -> String;
}

/// Expand a `{bucket}` URL template and append the object name.
pub fn public_url(template: &str, bucket: &str, object: &str) -> String {
    format!("{}/{}", template.replace("{bucket}", bucket).trim_end_matches('/'), object)
}

fn check_name(name: &str) -> Result<(), BlobError> {
    let bad = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad {
        return Err(BlobError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Writes objects to `<root>/<bucket>/<object>`
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path an object is stored at
    pub fn object_path(&self, bucket: &str, object: &str) -> PathBuf {
        self.root.join(bucket).join(object)
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, bucket: &str, object: &str, bytes: &[u8]) -> Result<bool, BlobError> {
        check_name(bucket)?;
        check_name(object)?;
        let path = self.object_path(bucket, object);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write then rename so readers never see a partial object
        let tmp = path.with_extension("partial");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(true)
    }

    fn object_url(&self, bucket: &str, object: &str) -> String {
        public_url(&self.public_url, bucket, object)
    }
}

/// PUTs objects to `{endpoint}/{bucket}/{object}`
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    endpoint: String,
    public_url: String,
}

impl HttpBlobStore {
    pub fn new(endpoint: &str, public_url: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            public_url: public_url.to_string(),
        }
    }

    pub fn put_url(&self, bucket: &str, object: &str) -> String {
        format!("{}/{}/{}", self.endpoint, bucket, object)
    }
}

impl BlobStore for HttpBlobStore {
    fn put(&self, bucket: &str, object: &str, bytes: &[u8]) -> Result<bool, BlobError> {
        check_name(bucket)?;
        check_name(object)?;
        let url = self.put_url(bucket, object);
        match http_client::agent()
            .put(&url)
            .set("Content-Type", content_type(object))
            .send_bytes(bytes)
        {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(status, _)) => {
                tracing::warn!(%url, status, "object store refused upload");
                Ok(false)
            }
            Err(err) => Err(BlobError::Transport(err.to_string())),
        }
    }

    fn object_url(&self, bucket: &str, object: &str) -> String {
        public_url(&self.public_url, bucket, object)
    }
}

fn content_type(object: &str) -> &'static str {
    match object.rsplit('.').next() {
        Some("zip") => "application/zip",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Blob store selected by configuration
#[derive(Debug, Clone)]
pub enum ConfiguredBlobStore {
    Fs(FsBlobStore),
    Http(HttpBlobStore),
}

impl ConfiguredBlobStore {
    pub fn from_config(config: &StorageConfig) -> Result<Self, BlobError> {
        match config.backend {
            StorageBackend::Fs => {
                let template = config.public_url_template()?;
                Ok(Self::Fs(FsBlobStore::new(&config.root, &template)))
            }
            StorageBackend::Http => {
                let endpoint = config.endpoint.as_deref().ok_or(BlobError::MissingEndpoint)?;
                let template = config.public_url_template()?;
                Ok(Self::Http(HttpBlobStore::new(endpoint, &template)))
            }
        }
    }
}

impl BlobStore for ConfiguredBlobStore {
    fn put(&self, bucket: &str, object: &str, bytes: &[u8]) -> Result<bool, BlobError> {
        match self {
            Self::Fs(store) => store.put(bucket, object, bytes),
            Self::Http(store) => store.put(bucket, object, bytes),
        }
    }

    fn object_url(&self, bucket: &str, object: &str) -> String {
        match self {
            Self::Fs(store) => store.object_url(bucket, object),
            Self::Http(store) => store.object_url(bucket, object),
        }
    }
}
