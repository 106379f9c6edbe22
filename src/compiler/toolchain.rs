//! Compiler selection by manifest version

use crate::config::{CompilerConfig, CompilerVersion};

/// Supported compilers, matched by version prefix
#[derive(Debug, Clone)]
pub struct CompilerTable {
    versions: Vec<CompilerVersion>,
}

impl CompilerTable {
    pub fn new(versions: Vec<CompilerVersion>) -> Self {
        Self { versions }
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::new(config.versions.clone())
    }

    /// Select the compiler for a manifest's `elm-version`.
    ///
    /// Package manifests declare a range such as `0.19.0 <= v < 0.20.0`;
    /// the leading version decides. The longest matching prefix wins.
    pub fn select(&self, elm_version: &str) -> Option<&CompilerVersion> {
        let declared = elm_version.trim();
        self.versions
            .iter()
            .filter(|v| declared.starts_with(v.prefix.as_str()))
            .max_by_key(|v| v.prefix.len())
    }

    pub fn versions(&self) -> &[CompilerVersion] {
        &self.versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CompilerTable {
        CompilerTable::from_config(&CompilerConfig::default())
    }

    #[test]
    fn test_select_by_prefix() {
        let table = table();
        assert_eq!(table.select("0.19.0 <= v < 0.20.0").unwrap().binary, "elm19");
        assert_eq!(table.select("0.19.1").unwrap().binary, "elm");
        assert_eq!(table.select("  0.19.1 <= v < 0.20.0").unwrap().prefix, "0.19.1");
    }

    #[test]
    fn test_unsupported_versions() {
        let table = table();
        assert!(table.select("0.18.0").is_none());
        assert!(table.select("0.18.0 <= v < 0.19.0").is_none());
        assert!(table.select("").is_none());
        assert!(table.select("1.0.0").is_none());
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = CompilerTable::new(vec![
            CompilerVersion {
                prefix: "0.19".to_string(),
                binary: "elm-any".to_string(),
            },
            CompilerVersion {
                prefix: "0.19.1".to_string(),
                binary: "elm".to_string(),
            },
        ]);
        assert_eq!(table.select("0.19.1").unwrap().binary, "elm");
        assert_eq!(table.select("0.19.0").unwrap().binary, "elm-any");
    }
}
