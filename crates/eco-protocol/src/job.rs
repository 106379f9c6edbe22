//! Build job as handed out by the queue.

use serde::{Deserialize, Serialize};

/// A single package build request.
///
/// Immutable once received; identifies exactly one build attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Server-assigned sequence number, unique per job.
    pub seq: u64,
    /// Where to download the source archive from.
    #[serde(rename = "zipUrl")]
    pub zip_url: String,
    /// Package name (repository name).
    pub name: String,
    /// Package author (repository owner).
    pub author: String,
    /// Package version being published.
    pub version: String,
}

impl Job {
    /// `<name>-<version>`, the package's root directory inside the archive.
    pub fn package_dir(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// `<author>/<name>@<version>` for log lines.
    pub fn coordinates(&self) -> String {
        format!("{}/{}@{}", self.author, self.name, self.version)
    }
}
