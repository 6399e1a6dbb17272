// src/exec/build_step.rs

//! The per-package build collaborator.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::dag::BuildJob;
use crate::engine::BuildReport;
use crate::types::FailureType;

/// Builds one package and classifies the outcome.
///
/// Called on a blocking worker thread; implementations may take minutes.
/// Failures are returned as reports, never as panics or errors.
pub trait BuildStep: Send + Sync {
    fn build(&self, job: &BuildJob) -> BuildReport;
}

/// Runs a shell command template per package.
///
/// Placeholders: `{package}`, `{version}`, `{run_id}`, `{attempt}`. The same
/// values are exported as `STACKBUILD_*` environment variables. Combined
/// stdout/stderr goes to `<logs_dir>/<package>/attempt-<n>.log`.
#[derive(Debug, Clone)]
pub struct CommandBuildStep {
    command: String,
    logs_dir: PathBuf,
    exit_codes: BTreeMap<i32, FailureType>,
    workdir: Option<PathBuf>,
}

impl CommandBuildStep {
    pub fn new(command: impl Into<String>, logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            logs_dir: logs_dir.into(),
            exit_codes: BTreeMap::new(),
            workdir: None,
        }
    }

    /// Override the exit-code classification. Codes not listed fall back to
    /// [`FailureType::from_exit_code`].
    pub fn with_exit_codes(mut self, exit_codes: BTreeMap<i32, FailureType>) -> Self {
        self.exit_codes = exit_codes;
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn render(&self, job: &BuildJob) -> String {
        self.command
            .replace("{package}", &job.package)
            .replace("{version}", &job.version)
            .replace("{run_id}", &job.run_id)
            .replace("{attempt}", &job.attempt.to_string())
    }

    pub fn classify(&self, code: i32) -> FailureType {
        self.exit_codes
            .get(&code)
            .copied()
            .unwrap_or_else(|| FailureType::from_exit_code(code))
    }

    pub fn log_path(&self, job: &BuildJob) -> PathBuf {
        self.logs_dir
            .join(&job.package)
            .join(format!("attempt-{}.log", job.attempt))
    }

    fn run(&self, job: &BuildJob, log_path: &Path) -> Result<BuildReport> {
        let cmdline = self.render(job);

        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating log dir {:?}", parent))?;
        }
        let mut log = File::create(log_path).with_context(|| format!("creating log {:?}", log_path))?;
        writeln!(log, "$ {cmdline}").with_context(|| format!("writing log {:?}", log_path))?;
        let stderr = log
            .try_clone()
            .with_context(|| format!("duplicating log handle {:?}", log_path))?;

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&cmdline);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&cmdline);
            c
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr))
            .env("STACKBUILD_PACKAGE", &job.package)
            .env("STACKBUILD_VERSION", &job.version)
            .env("STACKBUILD_RUN_ID", &job.run_id)
            .env("STACKBUILD_ATTEMPT", job.attempt.to_string());
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        info!(package = %job.package, attempt = job.attempt, cmd = %cmdline, "starting build");

        let status = cmd
            .status()
            .with_context(|| format!("running build for '{}'", job.package))?;
        let log_path = Some(log_path.to_path_buf());

        if status.success() {
            info!(package = %job.package, "build command succeeded");
            return Ok(BuildReport::success(log_path));
        }

        let report = match status.code() {
            Some(code) => {
                let failure_type = self.classify(code);
                BuildReport::failed(
                    failure_type,
                    format!("build command exited with code {code} ({failure_type})"),
                    log_path,
                )
            }
            None => BuildReport::failed(
                FailureType::Unknown,
                "build command terminated by signal",
                log_path,
            ),
        };
        info!(package = %job.package, outcome = ?report.outcome, "build command failed");
        Ok(report)
    }
}

impl BuildStep for CommandBuildStep {
    fn build(&self, job: &BuildJob) -> BuildReport {
        let log_path = self.log_path(job);
        match self.run(job, &log_path) {
            Ok(report) => report,
            Err(err) => {
                error!(package = %job.package, error = %err, "build step error");
                BuildReport::failed(FailureType::Unknown, format!("{err:#}"), Some(log_path))
            }
        }
    }
}
