//! Package manifest (`elm.json`)
//!
//! Only `elm-version` is interpreted. The raw JSON object is kept so the
//! `ready` report can carry the manifest verbatim.

use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use eco_classifier::MANIFEST_FILE;

/// Errors loading a manifest; every variant means "not an Elm package"
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} is not a JSON object")]
    NotAnObject { path: PathBuf },

    #[error("{path} has no elm-version")]
    MissingVersion { path: PathBuf },
}

/// A package's `elm.json`
#[derive(Debug, Clone)]
pub struct PackageManifest {
    /// Compiler constraint, e.g. `0.19.0 <= v < 0.20.0`
    pub elm_version: String,
    raw: Value,
}

impl PackageManifest {
    /// Load `<package_root>/elm.json`.
    pub fn load(package_root: &Path) -> Result<Self, ManifestError> {
        let path = package_root.join(MANIFEST_FILE);
        let contents = fs::read_to_string(&path).map_err(|source| ManifestError::Unreadable {
            path: path.clone(),
            source,
        })?;
        Self::parse(&contents, &path)
    }

    /// Parse manifest text; `path` is only used in errors.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ManifestError> {
        let raw: Value = serde_json::from_str(contents).map_err(|source| ManifestError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })?;
        if !raw.is_object() {
            return Err(ManifestError::NotAnObject {
                path: path.to_path_buf(),
            });
        }

        let elm_version = raw
            .get("elm-version")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ManifestError::MissingVersion {
                path: path.to_path_buf(),
            })?
            .to_string();

        Ok(Self { elm_version, raw })
    }

    /// The manifest exactly as read.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Consume the manifest, returning the raw JSON.
    pub fn into_raw(self) -> Value {
        self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const CORE: &str = r#"{
        "type": "package",
        "name": "elm/core",
        "summary": "Elm's standard libraries",
        "license": "BSD-3-Clause",
        "version": "1.0.5",
        "exposed-modules": {"Primitives": ["Basics", "String"]},
        "elm-version": "0.19.0 <= v < 0.20.0",
        "dependencies": {},
        "test-dependencies": {},
        "x-custom": true
    }"#;

    fn parse(text: &str) -> Result<PackageManifest, ManifestError> {
        PackageManifest::parse(text, Path::new("elm.json"))
    }

    #[test]
    fn test_parse_package_manifest() {
        let manifest = parse(CORE).unwrap();
        assert_eq!(manifest.elm_version, "0.19.0 <= v < 0.20.0");
        assert_eq!(manifest.raw()["name"], json!("elm/core"));
        // Unknown fields survive in the raw value
        assert_eq!(manifest.raw()["x-custom"], json!(true));
    }

    #[test]
    fn test_application_manifest_with_nested_dependencies() {
        let manifest = parse(
            r#"{"type":"application","elm-version":"0.19.1",
                "dependencies":{"direct":{"elm/core":"1.0.5"},"indirect":{}}}"#,
        )
        .unwrap();
        assert_eq!(manifest.elm_version, "0.19.1");
        assert_eq!(manifest.raw()["dependencies"]["direct"]["elm/core"], json!("1.0.5"));
    }

    #[test]
    fn test_missing_version() {
        let err = parse(r#"{"type":"package"}"#).unwrap_err();
        assert!(matches!(err, ManifestError::MissingVersion { .. }));
        let err = parse(r#"{"elm-version":"  "}"#).unwrap_err();
        assert!(matches!(err, ManifestError::MissingVersion { .. }));
        let err = parse(r#"{"elm-version":19}"#).unwrap_err();
        assert!(matches!(err, ManifestError::MissingVersion { .. }));
    }

    #[test]
    fn test_mistyped_fields_do_not_reject_manifest() {
        let manifest = parse(r#"{"elm-version":"0.19.1","version":1,"dependencies":[]}"#).unwrap();
        assert_eq!(manifest.elm_version, "0.19.1");
        assert_eq!(manifest.raw()["version"], json!(1));
    }

    #[test]
    fn test_invalid_json_and_non_object() {
        assert!(matches!(parse("{not json"), Err(ManifestError::InvalidJson { .. })));
        assert!(matches!(parse("[1, 2]"), Err(ManifestError::NotAnObject { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = PackageManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Unreadable { .. }));
    }

    #[test]
    fn test_load_from_package_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("elm.json"), CORE).unwrap();
        let manifest = PackageManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.elm_version, "0.19.0 <= v < 0.20.0");
        assert_eq!(manifest.into_raw()["name"], json!("elm/core"));
    }
}
