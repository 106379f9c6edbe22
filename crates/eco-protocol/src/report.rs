//! Terminal job reports posted back to the queue.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason codes for a job that did not produce a package.
///
/// These codes are stable and consumed by the queue service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorReason {
    /// The source archive could not be downloaded.
    NoGithubPackage,
    /// The archive does not contain `<name>-<version>/`.
    PackageRenamed,
    /// No readable `elm.json` with an `elm-version`.
    NotElmPackage,
    /// The declared compiler version is not supported by this worker.
    UnsupportedElmVersion,
    /// The compiler rejected the package.
    CompileFailed,
}

impl ErrorReason {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoGithubPackage => "no-github-package",
            Self::PackageRenamed => "package-renamed",
            Self::NotElmPackage => "not-elm-package",
            Self::UnsupportedElmVersion => "unsupported-elm-version",
            Self::CompileFailed => "compile-failed",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of the compiler's structured failure report.
///
/// Only `path`, `type` and `title` are ever carried; the full report is
/// uploaded separately as an artifact. `error` is set only when the report
/// could not be decoded at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompileReport {
    /// Placeholder for a report stream that is not valid JSON.
    pub fn decode_failure() -> Self {
        Self {
            error: Some("decode failure".to_string()),
            ..Self::default()
        }
    }

    /// Whether this is the decode-failure placeholder.
    pub fn is_decode_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Body of `POST /packages/{seq}/error` for non-compile failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    #[serde(rename = "errorReason")]
    pub error_reason: ErrorReason,
}

impl ErrorReport {
    pub fn new(error_reason: ErrorReason) -> Self {
        Self { error_reason }
    }
}

/// Body of `POST /packages/{seq}/error` for a compile failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileErrorReport {
    /// Always [`ErrorReason::CompileFailed`].
    pub error_reason: ErrorReason,
    /// Compiler version the package was built with, e.g. `0.19.1`.
    pub compiler_version: String,
    /// Whitelisted summary of the compiler report.
    pub report_json: CompileReport,
    /// URL of the human-readable compile log.
    pub compile_log_url: String,
    /// URL of the raw JSON report, when one was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_report_url: Option<String>,
    /// URL of the canonical package archive.
    pub url: String,
    pub sha1_zip_archive: String,
    pub sha1_package_contents: String,
}

/// Body of `POST /packages/{seq}/ready`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyReport {
    /// The package's `elm.json`, verbatim.
    pub elm_json: serde_json::Value,
    /// URL of the canonical package archive.
    pub url: String,
    pub sha1_zip_archive: String,
    pub sha1_package_contents: String,
}
