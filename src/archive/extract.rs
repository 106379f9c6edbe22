//! Filtered extraction of untrusted source archives

use eco_classifier::PackageFilter;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path};

const MAX_ZIP_ENTRIES: usize = 20_000;
const MAX_ZIP_ENTRY_UNCOMPRESSED_BYTES: u64 = 64 * 1024 * 1024;
const MAX_ZIP_TOTAL_UNCOMPRESSED_BYTES: u64 = 512 * 1024 * 1024;
const MAX_ZIP_COMPRESSION_RATIO: u64 = 200;

/// Errors extracting an archive
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive rejected: {0}")]
    LimitExceeded(String),
}

impl ExtractError {
    /// Whether the archive itself is at fault, as opposed to the local
    /// filesystem.
    pub fn is_bad_archive(&self) -> bool {
        matches!(self, Self::Zip(_) | Self::LimitExceeded(_))
    }
}

/// Safety limits applied while extracting
#[derive(Debug, Clone, Copy)]
pub struct ExtractLimits {
    pub max_entries: usize,
    pub max_entry_uncompressed_bytes: u64,
    pub max_total_uncompressed_bytes: u64,
    pub max_compression_ratio: u64,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_entries: MAX_ZIP_ENTRIES,
            max_entry_uncompressed_bytes: MAX_ZIP_ENTRY_UNCOMPRESSED_BYTES,
            max_total_uncompressed_bytes: MAX_ZIP_TOTAL_UNCOMPRESSED_BYTES,
            max_compression_ratio: MAX_ZIP_COMPRESSION_RATIO,
        }
    }
}

/// Entry names of a zip archive, in archive order.
pub fn list_entries(archive_path: &Path) -> Result<Vec<String>, ExtractError> {
    let archive = zip::ZipArchive::new(File::open(archive_path)?)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// Extract the entries accepted by `filter` into `dest_root`.
///
/// Relative paths are preserved. Returns the extracted entry names in
/// archive order.
pub fn extract_filtered(
    archive_path: &Path,
    dest_root: &Path,
    filter: &PackageFilter,
) -> Result<Vec<String>, ExtractError> {
    extract_filtered_with_limits(archive_path, dest_root, filter, ExtractLimits::default())
}

/// [`extract_filtered`] with explicit safety limits.
pub fn extract_filtered_with_limits(
    archive_path: &Path,
    dest_root: &Path,
    filter: &PackageFilter,
    limits: ExtractLimits,
) -> Result<Vec<String>, ExtractError> {
    let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;
    let entry_count = archive.len();
    if entry_count > limits.max_entries {
        return Err(ExtractError::LimitExceeded(format!(
            "archive has {} entries, limit is {}",
            entry_count, limits.max_entries
        )));
    }

    let mut extracted = Vec::new();
    let mut total_uncompressed: u64 = 0;

    for i in 0..entry_count {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        if !filter.is_package_file(&name) {
            continue;
        }
        let Some(relative) = entry
            .enclosed_name()
            .filter(|p| p.components().all(|c| matches!(c, Component::Normal(_))))
        else {
            tracing::warn!(entry = %name, "skipping entry with unsafe path");
            continue;
        };

        check_entry_size(&name, entry.size(), entry.compressed_size(), &limits)?;
        total_uncompressed = total_uncompressed
            .checked_add(entry.size())
            .ok_or_else(|| ExtractError::LimitExceeded("archive size overflow".to_string()))?;
        if total_uncompressed > limits.max_total_uncompressed_bytes {
            return Err(ExtractError::LimitExceeded(format!(
                "extracted size {} exceeds limit {}",
                total_uncompressed, limits.max_total_uncompressed_bytes
            )));
        }

        let outpath = dest_root.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            let mode = entry.unix_mode();
            write_entry(&mut entry, mode, &outpath)?;
        }
        extracted.push(name);
    }

    Ok(extracted)
}

fn check_entry_size(
    name: &str,
    uncompressed: u64,
    compressed: u64,
    limits: &ExtractLimits,
) -> Result<(), ExtractError> {
    if uncompressed > limits.max_entry_uncompressed_bytes {
        return Err(ExtractError::LimitExceeded(format!(
            "entry '{}' is too large ({} bytes, limit {})",
            name, uncompressed, limits.max_entry_uncompressed_bytes
        )));
    }
    if uncompressed > 0
        && (compressed == 0 || uncompressed > compressed.saturating_mul(limits.max_compression_ratio))
    {
        return Err(ExtractError::LimitExceeded(format!(
            "entry '{}' exceeds compression ratio limit",
            name
        )));
    }
    Ok(())
}

fn write_entry(
    entry: &mut impl Read,
    unix_mode: Option<u32>,
    outpath: &Path,
) -> Result<(), ExtractError> {
    if let Some(parent) = outpath.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut outfile = File::create(outpath)?;
    io::copy(entry, &mut outfile)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if unix_mode.is_some_and(|m| m & 0o111 != 0) {
            0o755
        } else {
            0o644
        };
        fs::set_permissions(outpath, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}
