//! Source archive handling
//!
//! Downloads a package's source zip, extracts only the entries the package
//! filter accepts, rebuilds a canonical zip rooted at `<name>-<version>/`
//! and computes its SHA-1 digests.
//!
//! Canonical archive properties:
//! - Entries sorted by path
//! - Timestamps fixed at 1980-01-01 00:00:00
//! - Permissions normalized (0644 files, 0755 directories)
//! - Deflate compression

mod digest;
mod extract;
mod fetch;
mod repackage;

pub use digest::{digest_archive, ContentDigest, DigestError, BLOCK_SIZE};
pub use extract::{extract_filtered, extract_filtered_with_limits, list_entries, ExtractError, ExtractLimits};
pub use fetch::{filename_from_content_disposition, ArchiveFetcher, FetchError, HttpFetcher};
pub use repackage::{repackage, RepackError};
