//! Package-file filter for untrusted archives.

use crate::glob::{escape_literal, Glob, GlobError};
use crate::result::{Classification, PackageRule};

/// Name of the package manifest file.
pub const MANIFEST_FILE: &str = "elm.json";

/// Root glob for archives wrapped in a single generated folder.
pub const ANY_ROOT: &str = "*";

/// Deny-by-default filter selecting the files of a canonical package.
///
/// Only `README.md`, `LICENSE`, `elm.json` and everything under `src/`
/// directly inside the package root are accepted. Everything else (CI
/// config, tests, hidden files, build metadata) is rejected.
#[derive(Debug, Clone)]
pub struct PackageFilter {
    root: String,
    rules: Vec<(PackageRule, Glob)>,
}

impl PackageFilter {
    /// Filter for archive listings whose single top-level folder can have
    /// any name.
    pub fn new() -> Result<Self, GlobError> {
        Self::with_root_glob(ANY_ROOT)
    }

    /// Filter scoped to a literal root directory such as `elm-foo-1.0.0`.
    ///
    /// The root may span several segments (`author/elm-foo-1.0.0`); glob
    /// metacharacters in it are matched literally.
    pub fn for_root(root: &str) -> Result<Self, GlobError> {
        Self::with_root_glob(&escape_literal(root.trim_end_matches('/')))
    }

    fn with_root_glob(root: &str) -> Result<Self, GlobError> {
        let rules = PackageRule::ALL
            .iter()
            .map(|rule| Ok((*rule, Glob::new(&format!("{}{}", root, rule.suffix()))?)))
            .collect::<Result<Vec<_>, GlobError>>()?;
        Ok(Self {
            root: root.to_string(),
            rules,
        })
    }

    /// The root glob every rule is anchored under.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Classify a single entry path; the first matching rule wins.
    ///
    /// Paths that are not plain relative paths are always rejected.
    pub fn classify(&self, path: &str) -> Classification {
        if !is_plain_path(path) {
            return Classification::Rejected;
        }
        self.rules
            .iter()
            .find(|(_, glob)| glob.is_match(path))
            .map(|(rule, _)| Classification::Accepted(*rule))
            .unwrap_or(Classification::Rejected)
    }

    /// Whether `path` belongs to the package.
    pub fn is_package_file(&self, path: &str) -> bool {
        self.classify(path).is_accepted()
    }

    /// Select the accepted entries, preserving input order.
    pub fn select<I, S>(&self, entries: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        entries
            .into_iter()
            .filter(|entry| self.is_package_file(entry.as_ref()))
            .map(|entry| entry.as_ref().to_string())
            .collect()
    }
}

/// Whether `path` is relative, uses `/` separators and has only normal
/// segments. A single trailing `/` marks a directory entry.
pub fn is_plain_path(path: &str) -> bool {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    !trimmed.is_empty()
        && !trimmed.contains('\\')
        && trimmed
            .split('/')
            .all(|segment| !matches!(segment, "" | "." | ".."))
}
