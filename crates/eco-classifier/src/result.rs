//! Classification result types.

use serde::{Deserialize, Serialize};

/// The fixed rules that make a file part of a canonical package.
///
/// Rules are evaluated in declaration order; the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageRule {
    /// `<root>/README.md`
    Readme,
    /// `<root>/LICENSE`
    License,
    /// `<root>/elm.json`
    Manifest,
    /// `<root>/src/**`
    Source,
}

impl PackageRule {
    /// All rules in evaluation order.
    pub const ALL: [PackageRule; 4] = [
        PackageRule::Readme,
        PackageRule::License,
        PackageRule::Manifest,
        PackageRule::Source,
    ];

    /// Glob suffix appended to the package root.
    pub fn suffix(&self) -> &'static str {
        match self {
            PackageRule::Readme => "/README.md",
            PackageRule::License => "/LICENSE",
            PackageRule::Manifest => "/elm.json",
            PackageRule::Source => "/src/**",
        }
    }
}

/// Outcome of classifying one archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "rule", rename_all = "lowercase")]
pub enum Classification {
    /// The entry belongs to the package.
    Accepted(PackageRule),
    /// The entry is not part of the package and must not be extracted.
    Rejected,
}

impl Classification {
    /// Whether the entry is accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Classification::Accepted(_))
    }

    /// The rule that accepted the entry, if any.
    pub fn rule(&self) -> Option<PackageRule> {
        match self {
            Classification::Accepted(rule) => Some(*rule),
            Classification::Rejected => None,
        }
    }
}
