// src/errors.rs

//! Crate-wide error type, result alias and process exit codes.

use std::collections::BTreeMap;

use thiserror::Error;

/// Process exit codes reported by the `stackbuild` binary.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const CONFIG_ERROR: i32 = 1;
    pub const MISSING_PACKAGES: i32 = 5;
    pub const CYCLE_DETECTED: i32 = 6;
    pub const GRAPH_ERROR: i32 = 12;
    pub const BUILD_FAILED: i32 = 13;
    pub const RESUME_ERROR: i32 = 14;
}

#[derive(Error, Debug)]
pub enum StackbuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Package index error: {0}")]
    IndexError(String),

    #[error("Dependency cycle detected: {}", format_cycles(.cycles))]
    DependencyCycle { cycles: Vec<Vec<String>> },

    #[error("Missing dependencies: {}", format_missing(.missing, .suggestions))]
    MissingDependencies {
        /// Requesting package -> binaries nothing provides.
        missing: BTreeMap<String, Vec<String>>,
        /// Binary -> suggested remediation.
        suggestions: BTreeMap<String, String>,
    },

    #[error("Graph error: {0}")]
    GraphError(String),

    #[error("Resume error: {0}")]
    ResumeError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StackbuildError {
    /// Exit code the binary uses when this error aborts a run.
    pub fn exit_code(&self) -> i32 {
        match self {
            StackbuildError::ConfigError(_)
            | StackbuildError::TomlError(_)
            | StackbuildError::IndexError(_) => exit_code::CONFIG_ERROR,
            StackbuildError::MissingDependencies { .. } => exit_code::MISSING_PACKAGES,
            StackbuildError::DependencyCycle { .. } => exit_code::CYCLE_DETECTED,
            StackbuildError::GraphError(_) => exit_code::GRAPH_ERROR,
            StackbuildError::ResumeError(_) => exit_code::RESUME_ERROR,
            // Unexpected failures use the same generic code as `main`.
            StackbuildError::IoError(_)
            | StackbuildError::JsonError(_)
            | StackbuildError::Other(_) => exit_code::CONFIG_ERROR,
        }
    }
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|c| c.join(" -> "))
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_missing(
    missing: &BTreeMap<String, Vec<String>>,
    suggestions: &BTreeMap<String, String>,
) -> String {
    let needs = missing
        .iter()
        .map(|(pkg, deps)| format!("{pkg} needs [{}]", deps.join(", ")))
        .collect::<Vec<_>>()
        .join("; ");
    if suggestions.is_empty() {
        return needs;
    }
    let actions = suggestions
        .iter()
        .map(|(binary, action)| format!("{binary}: {action}"))
        .collect::<Vec<_>>()
        .join("; ");
    format!("{needs} (suggested: {actions})")
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StackbuildError>;
