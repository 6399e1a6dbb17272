// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{BuildType, FailureType};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [run]
/// target = "caracal"
/// series = "noble"
/// packages = ["nova", "python-oslo.config"]
/// keep_going = true
/// max_failures = 0
/// parallel = 0
///
/// [index]
/// path = "index.toml"
///
/// [build]
/// command = "build-one {package} {version}"
///
/// [build.exit_codes]
/// 42 = "policy_blocked"
///
/// [exclusions.soft]
/// "python-oslo.config" = ["python-oslo.log"]
/// ```
///
/// Only `[build].command` and the run identifiers are mandatory.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub index: IndexSection,

    pub build: RawBuildSection,

    #[serde(default)]
    pub exclusions: ExclusionsSection,
}

/// `[run]` section: identity of the run and failure / concurrency policy.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    #[serde(default)]
    pub target: String,

    #[serde(default)]
    pub series: String,

    #[serde(default)]
    pub build_type: BuildType,

    /// Packages to build when none are given on the command line.
    #[serde(default)]
    pub packages: Vec<String>,

    /// Where run directories (ledger, logs, reports) live.
    #[serde(default = "default_runs_root")]
    pub runs_root: PathBuf,

    #[serde(default = "default_keep_going")]
    pub keep_going: bool,

    /// 0 means unlimited.
    #[serde(default)]
    pub max_failures: usize,

    /// 0 means half the logical CPUs (at least 1).
    #[serde(default)]
    pub parallel: usize,

    /// Whether a SKIPPED dependency satisfies its dependents.
    #[serde(default)]
    pub allow_skipped_deps: bool,
}

fn default_runs_root() -> PathBuf {
    PathBuf::from(".stackbuild/runs")
}

fn default_keep_going() -> bool {
    true
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            target: String::new(),
            series: String::new(),
            build_type: BuildType::default(),
            packages: Vec::new(),
            runs_root: default_runs_root(),
            keep_going: default_keep_going(),
            max_failures: 0,
            parallel: 0,
            allow_skipped_deps: false,
        }
    }
}

/// `[index]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexSection {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("index.toml")
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

/// `[build]` section as written. TOML table keys are strings, so exit codes
/// are parsed during validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBuildSection {
    pub command: String,

    #[serde(default)]
    pub workdir: Option<PathBuf>,

    #[serde(default)]
    pub exit_codes: BTreeMap<String, FailureType>,
}

/// Validated `[build]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSection {
    pub command: String,
    pub workdir: Option<PathBuf>,
    pub exit_codes: BTreeMap<i32, FailureType>,
}

/// `[exclusions]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExclusionsSection {
    /// Use only the entries below, ignoring the built-in table.
    #[serde(default)]
    pub replace_builtin: bool,

    /// `dependent = ["dependency", ...]`
    #[serde(default)]
    pub soft: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub optional_binaries: Vec<String>,
}

/// Validated configuration. Construct through `ConfigFile::try_from`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub run: RunSection,
    pub index: IndexSection,
    pub build: BuildSection,
    pub exclusions: ExclusionsSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        run: RunSection,
        index: IndexSection,
        build: BuildSection,
        exclusions: ExclusionsSection,
    ) -> Self {
        Self {
            run,
            index,
            build,
            exclusions,
        }
    }
}
