// src/request.rs

//! The effective request for one invocation: config file values with CLI
//! overrides applied, package lists merged and the worker count resolved.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::errors::{Result, StackbuildError};
use crate::fs::FileSystem;
use crate::ledger::{ResumeRequest, RunHeader, RunPolicy};
use crate::types::{BuildType, PackageName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Requested source packages, de-duplicated, in first-seen order.
    pub packages: Vec<PackageName>,
    pub target: String,
    pub series: String,
    pub build_type: BuildType,
    pub runs_root: PathBuf,
    pub index_path: PathBuf,
    pub policy: RunPolicy,
    pub resume: ResumeRequest,
    pub allow_cycles: bool,
    pub allow_missing: bool,
    pub dry_run: bool,
}

impl BuildRequest {
    /// Merge CLI arguments over a validated config.
    ///
    /// Package sources: `--packages` and `--packages-file` together when
    /// either is given, `[run].packages` otherwise.
    pub fn from_sources(args: &CliArgs, cfg: &ConfigFile, fs: &dyn FileSystem) -> Result<Self> {
        let mut names: Vec<String> = args.packages.clone();
        if let Some(path) = &args.packages_file {
            names.extend(read_packages_file(fs, path)?);
        }
        if names.is_empty() {
            names = cfg.run.packages.clone();
        }

        let packages = dedup_packages(names);
        if packages.is_empty() {
            return Err(StackbuildError::ConfigError(
                "no packages requested (use --packages, --packages-file or [run].packages)"
                    .to_string(),
            ));
        }

        let policy = RunPolicy {
            keep_going: args.keep_going_override().unwrap_or(cfg.run.keep_going),
            max_failures: args.max_failures.unwrap_or(cfg.run.max_failures),
            parallel: resolve_parallel(args.parallel.unwrap_or(cfg.run.parallel)),
            allow_skipped_deps: args.allow_skipped_deps || cfg.run.allow_skipped_deps,
        };

        let resume = ResumeRequest {
            enabled: args.resume_requested(),
            run_id: args.resume_run_id.clone(),
            failed: args.failed_policy(),
        };

        let request = Self {
            packages,
            target: cfg.run.target.clone(),
            series: cfg.run.series.clone(),
            build_type: cfg.run.build_type,
            runs_root: cfg.run.runs_root.clone(),
            index_path: cfg.index.path.clone(),
            policy,
            resume,
            allow_cycles: args.allow_cycles,
            allow_missing: args.allow_missing,
            dry_run: args.dry_run,
        };

        info!(
            packages = request.packages.len(),
            target = %request.target,
            series = %request.series,
            parallel = request.policy.parallel,
            keep_going = request.policy.keep_going,
            max_failures = request.policy.max_failures,
            resume = request.resume.enabled,
            "build request resolved"
        );
        Ok(request)
    }

    pub fn header(&self, run_id: impl Into<String>) -> RunHeader {
        RunHeader {
            run_id: run_id.into(),
            target: self.target.clone(),
            series: self.series.clone(),
            build_type: self.build_type,
        }
    }
}

/// One package per line; blank lines and `#` comments are ignored.
pub fn read_packages_file(fs: &dyn FileSystem, path: &Path) -> Result<Vec<PackageName>> {
    let contents = fs.read_to_string(path).map_err(|err| {
        StackbuildError::ConfigError(format!(
            "cannot read packages file {}: {err:#}",
            path.display()
        ))
    })?;
    let names = parse_package_list(&contents);
    debug!(path = %path.display(), count = names.len(), "read packages file");
    Ok(names)
}

pub fn parse_package_list(contents: &str) -> Vec<PackageName> {
    contents
        .lines()
        .map(|line| match line.split_once('#') {
            Some((before, _)) => before,
            None => line,
        })
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// 0 means half the logical CPUs, at least one.
pub fn resolve_parallel(requested: usize) -> usize {
    if requested == 0 {
        (num_cpus::get() / 2).max(1)
    } else {
        requested
    }
}

fn dedup_packages(names: Vec<String>) -> Vec<PackageName> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.clone()))
        .collect()
}
