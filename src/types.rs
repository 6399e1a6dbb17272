// src/types.rs

//! Closed enums shared by the graph, ledger and scheduler.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical source package name type used throughout the crate.
pub type PackageName = String;

/// Lifecycle status of a single package within one run.
///
/// - `Pending` -> `Building` -> `Success` | `Failed`
/// - `Pending` -> `Skipped` | `Blocked`
///
/// `Failed` only goes back to `Pending` through an explicit resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Pending,
    Building,
    Success,
    Failed,
    Skipped,
    Blocked,
}

impl PackageStatus {
    /// Terminal statuses never change again within a run.
    pub fn is_terminal(self) -> bool {
        !matches!(self, PackageStatus::Pending | PackageStatus::Building)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PackageStatus::Pending => "pending",
            PackageStatus::Building => "building",
            PackageStatus::Success => "success",
            PackageStatus::Failed => "failed",
            PackageStatus::Skipped => "skipped",
            PackageStatus::Blocked => "blocked",
        }
    }

    /// All statuses, in lifecycle order. Used for reporting.
    pub fn all() -> [PackageStatus; 6] {
        [
            PackageStatus::Pending,
            PackageStatus::Building,
            PackageStatus::Success,
            PackageStatus::Failed,
            PackageStatus::Skipped,
            PackageStatus::Blocked,
        ]
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a failed package.
///
/// Serialized as a plain snake_case string. Strings this version does not
/// know about deserialize as [`FailureType::Unknown`] so that ledgers written
/// by other versions still load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FailureType {
    FetchFailed,
    UpstreamFetch,
    MissingDep,
    PatchFailed,
    BuildFailed,
    Cycle,
    PolicyBlocked,
    Unknown,
}

impl FailureType {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureType::FetchFailed => "fetch_failed",
            FailureType::UpstreamFetch => "upstream_fetch",
            FailureType::MissingDep => "missing_dep",
            FailureType::PatchFailed => "patch_failed",
            FailureType::BuildFailed => "build_failed",
            FailureType::Cycle => "cycle",
            FailureType::PolicyBlocked => "policy_blocked",
            FailureType::Unknown => "unknown",
        }
    }

    /// Default mapping from a single-package build command's exit code.
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            3 => FailureType::FetchFailed,
            4 => FailureType::PatchFailed,
            5 => FailureType::MissingDep,
            6 => FailureType::Cycle,
            7 => FailureType::BuildFailed,
            8 => FailureType::PolicyBlocked,
            _ => FailureType::Unknown,
        }
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fetch_failed" => Ok(FailureType::FetchFailed),
            "upstream_fetch" => Ok(FailureType::UpstreamFetch),
            "missing_dep" => Ok(FailureType::MissingDep),
            "patch_failed" => Ok(FailureType::PatchFailed),
            "build_failed" => Ok(FailureType::BuildFailed),
            "cycle" => Ok(FailureType::Cycle),
            "policy_blocked" => Ok(FailureType::PolicyBlocked),
            "unknown" => Ok(FailureType::Unknown),
            other => Err(format!("unknown failure type: {other}")),
        }
    }
}

impl From<String> for FailureType {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(FailureType::Unknown)
    }
}

impl From<FailureType> for String {
    fn from(ft: FailureType) -> Self {
        ft.as_str().to_string()
    }
}

/// Kind of build requested for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    #[default]
    Release,
    Snapshot,
}

impl BuildType {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildType::Release => "release",
            BuildType::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "release" => Ok(BuildType::Release),
            "snapshot" => Ok(BuildType::Snapshot),
            other => Err(format!(
                "invalid build_type: {other} (expected \"release\" or \"snapshot\")"
            )),
        }
    }
}
