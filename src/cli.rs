// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Flags given here override the matching `[run]` settings of the config
//! file. Boolean pairs (`--keep-going` / `--fail-fast`) are mutually
//! exclusive; leaving both out keeps the config value.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, ValueEnum};

use crate::ledger::FailedPolicy;

/// Command-line arguments for `stackbuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stackbuild",
    version,
    about = "Build a set of source packages in dependency order, with a resumable ledger.",
    long_about = None
)]
#[command(group(ArgGroup::new("failure_mode").args(["keep_going", "fail_fast"])))]
#[command(group(ArgGroup::new("failed_policy").args(["retry_failed", "skip_failed", "keep_failed"])))]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "stackbuild.toml")]
    pub config: PathBuf,

    /// Packages to build, comma separated. Overrides `[run].packages`.
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub packages: Vec<String>,

    /// Read packages from a file: one per line, `#` starts a comment.
    #[arg(long, value_name = "PATH")]
    pub packages_file: Option<PathBuf>,

    /// Keep dispatching after failures (until `--max-failures`).
    #[arg(long)]
    pub keep_going: bool,

    /// Stop dispatching after the first failure.
    #[arg(long)]
    pub fail_fast: bool,

    /// Stop dispatching after this many failures (0 = unlimited).
    #[arg(long, value_name = "N")]
    pub max_failures: Option<usize>,

    /// Concurrent builds (0 = half the logical CPUs).
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Resume the most recent run (or `--resume-run-id`).
    #[arg(long)]
    pub resume: bool,

    /// Resume this specific run. Implies `--resume`.
    #[arg(long, value_name = "RUN_ID")]
    pub resume_run_id: Option<String>,

    /// On resume, build previously failed packages again.
    #[arg(long)]
    pub retry_failed: bool,

    /// On resume, mark previously failed packages skipped (default).
    #[arg(long)]
    pub skip_failed: bool,

    /// On resume, leave previously failed packages failed.
    #[arg(long)]
    pub keep_failed: bool,

    /// Treat SKIPPED dependencies as satisfied.
    #[arg(long)]
    pub allow_skipped_deps: bool,

    /// Proceed despite dependency cycles, ignoring the edges inside them.
    #[arg(long)]
    pub allow_cycles: bool,

    /// Proceed despite unresolvable dependencies.
    #[arg(long)]
    pub allow_missing: bool,

    /// Plan and print the build waves, but don't build or persist anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STACKBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// `Some(true)` / `Some(false)` when a failure-mode flag was given.
    pub fn keep_going_override(&self) -> Option<bool> {
        if self.keep_going {
            Some(true)
        } else if self.fail_fast {
            Some(false)
        } else {
            None
        }
    }

    pub fn failed_policy(&self) -> FailedPolicy {
        if self.retry_failed {
            FailedPolicy::Retry
        } else if self.keep_failed {
            FailedPolicy::Keep
        } else {
            FailedPolicy::Skip
        }
    }

    pub fn resume_requested(&self) -> bool {
        self.resume || self.resume_run_id.is_some()
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
