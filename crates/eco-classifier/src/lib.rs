//! Deny-by-default classifier for package source archives.
//!
//! Source archives are untrusted input. The classifier decides, from entry
//! paths alone, which entries make up a canonical Elm package so that nothing
//! else is ever written to disk.

mod filter;
mod glob;
mod result;

pub use filter::{is_plain_path, PackageFilter, ANY_ROOT, MANIFEST_FILE};
pub use glob::{escape_literal, glob_match, translate, Glob, GlobError};
pub use result::{Classification, PackageRule};
