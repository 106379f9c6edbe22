//! Source archive download

use regex_lite::Regex;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::http_client;

/// Errors downloading a source archive
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Archive not found (HTTP {status})")]
    NotFound { status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Archive exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("No usable filename in Content-Disposition")]
    Naming,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FetchError {
    /// Whether the remote side is at fault, as opposed to the local
    /// filesystem.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Downloads source archives into a job directory
pub trait ArchiveFetcher {
    /// Download `url` into `dest_dir` and return the local path.
    ///
    /// The filename comes from the response's `Content-Disposition`; when it
    /// has none, `fallback_name` is used or [`FetchError::Naming`] returned.
    fn fetch(
        &self,
        url: &str,
        dest_dir: &Path,
        fallback_name: Option<&str>,
    ) -> Result<PathBuf, FetchError>;
}

/// Blocking HTTP fetcher; redirects are followed
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

impl ArchiveFetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        dest_dir: &Path,
        fallback_name: Option<&str>,
    ) -> Result<PathBuf, FetchError> {
        let response = match http_client::agent().get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => return Err(FetchError::NotFound { status }),
            Err(err) => return Err(FetchError::Transport(err.to_string())),
        };

        let filename = response
            .header("Content-Disposition")
            .and_then(filename_from_content_disposition)
            .or_else(|| fallback_name.and_then(sanitize_filename))
            .ok_or(FetchError::Naming)?;

        let path = dest_dir.join(&filename);
        let mut writer = BufWriter::new(File::create(&path)?);
        let copied = http_client::copy_response_to_writer(response, &mut writer, self.max_bytes)
            .and_then(|n| writer.flush().map(|_| n));

        match copied {
            Ok(bytes) => {
                tracing::debug!(file = %filename, bytes, "downloaded source archive");
                Ok(path)
            }
            Err(err) => {
                drop(writer);
                let _ = fs::remove_file(&path);
                if http_client::is_too_large(&err) {
                    Err(FetchError::TooLarge {
                        limit: self.max_bytes,
                    })
                } else {
                    Err(FetchError::Transport(err.to_string()))
                }
            }
        }
    }
}

/// Extract the filename from a `Content-Disposition` header value.
///
/// Quotes and parameters after `;` are stripped and the result reduced to its
/// final path component, so the header cannot name a path outside the
/// download directory.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    static FILENAME: OnceLock<Option<Regex>> = OnceLock::new();
    let re = FILENAME
        .get_or_init(|| Regex::new(r"filename=(.+)").ok())
        .as_ref()?;
    let raw = re.captures(header)?.get(1)?.as_str();
    let raw = raw.split(';').next().unwrap_or(raw).trim().trim_matches('"');
    sanitize_filename(raw)
}

fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}
