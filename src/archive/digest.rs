//! Reproducible archive digests
//!
//! `contents_digest` identifies a package by what it contains, independent of
//! how the zip was produced. `archive_digest` is a literal hash of the file
//! bytes, used for integrity checks of the uploaded artifact.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Read size for streaming hashes (1 MiB).
pub const BLOCK_SIZE: usize = 1024 * 1024;

/// Errors computing digests
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid zip archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Digest pair reported for a canonical archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDigest {
    /// SHA-1 of the raw archive bytes
    pub archive_digest: String,
    /// SHA-1 over the sorted `"<path> <sha1>"` lines of every file entry
    pub contents_digest: String,
}

/// Compute both digests for the zip at `path`.
pub fn digest_archive(path: &Path) -> Result<ContentDigest, DigestError> {
    let io_err = |source: io::Error| DigestError::Io {
        path: path.to_path_buf(),
        source,
    };
    let zip_err = |source: zip::result::ZipError| DigestError::Zip {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut archive = zip::ZipArchive::new(file).map_err(zip_err)?;

    let mut lines = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_err)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let file_digest = stream_sha1(&mut entry).map_err(io_err)?;
        lines.push(format!("{} {}", name, file_digest));
    }

    // Full-line sort; digests are fixed width so this orders by path.
    lines.sort();
    let contents_digest = hex::encode(Sha1::digest(lines.join("\n").as_bytes()));

    let mut raw = File::open(path).map_err(io_err)?;
    let archive_digest = stream_sha1(&mut raw).map_err(io_err)?;

    Ok(ContentDigest {
        archive_digest,
        contents_digest,
    })
}

fn stream_sha1(reader: &mut impl Read) -> io::Result<String> {
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
