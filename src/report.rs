// src/report.rs

//! End-of-run summaries written next to the ledger:
//!
//! ```text
//! <run_dir>/reports/summary.json
//! <run_dir>/reports/summary.md
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::ledger::{Ledger, MissingDependency};
use crate::types::{BuildType, PackageName, PackageStatus};

pub const REPORTS_DIR: &str = "reports";
const LONGEST_BUILDS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEntry {
    pub package: PackageName,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildDuration {
    pub package: PackageName,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub target: String,
    pub series: String,
    pub build_type: BuildType,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_packages: usize,
    /// Keyed by lowercase status name; every status is present.
    pub counts: BTreeMap<String, usize>,
    pub total_build_ms: u64,
    /// Keyed by failure type.
    pub failures: BTreeMap<String, Vec<FailureEntry>>,
    pub longest_builds: Vec<BuildDuration>,
    pub missing_deps: Vec<MissingDependency>,
    pub cycles: Vec<Vec<PackageName>>,
    pub build_order: Vec<PackageName>,
}

impl RunSummary {
    pub fn from_ledger(ledger: &Ledger) -> Self {
        let counts = PackageStatus::all()
            .into_iter()
            .map(|s| (s.as_str().to_string(), ledger.count(s)))
            .collect();

        let mut failures: BTreeMap<String, Vec<FailureEntry>> = BTreeMap::new();
        for state in ledger.packages.values() {
            if state.status != PackageStatus::Failed {
                continue;
            }
            let kind = state
                .failure_type
                .map(|ft| ft.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            failures.entry(kind).or_default().push(FailureEntry {
                package: state.name.clone(),
                message: state.failure_message.clone(),
                log_path: state.log_path.clone(),
            });
        }

        let mut durations: Vec<BuildDuration> = ledger
            .packages
            .values()
            .filter(|s| s.duration_ms > 0)
            .map(|s| BuildDuration {
                package: s.name.clone(),
                duration_ms: s.duration_ms,
            })
            .collect();
        let total_build_ms = durations.iter().map(|d| d.duration_ms).sum();
        durations.sort_by(|a, b| {
            b.duration_ms
                .cmp(&a.duration_ms)
                .then_with(|| a.package.cmp(&b.package))
        });
        durations.truncate(LONGEST_BUILDS);

        Self {
            run_id: ledger.run_id.clone(),
            target: ledger.target.clone(),
            series: ledger.series.clone(),
            build_type: ledger.build_type,
            started_at: ledger.started_at,
            completed_at: ledger.completed_at,
            total_packages: ledger.total_packages,
            counts,
            total_build_ms,
            failures,
            longest_builds: durations,
            missing_deps: ledger.missing_deps.values().cloned().collect(),
            cycles: ledger.cycles.clone(),
            build_order: ledger.build_order.clone(),
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_markdown(&mut out);
        out
    }

    fn write_markdown(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "# Build run {}", self.run_id)?;
        writeln!(out)?;
        writeln!(
            out,
            "- target: {} / {} ({})",
            self.target, self.series, self.build_type
        )?;
        writeln!(out, "- started: {}", self.started_at.to_rfc3339())?;
        match self.completed_at {
            Some(t) => writeln!(out, "- completed: {}", t.to_rfc3339())?,
            None => writeln!(out, "- completed: no (resumable)")?,
        }
        writeln!(out, "- packages: {}", self.total_packages)?;
        writeln!(out, "- total build time: {}", format_ms(self.total_build_ms))?;
        writeln!(out)?;

        writeln!(out, "## Status")?;
        writeln!(out)?;
        writeln!(out, "| status | count |")?;
        writeln!(out, "|---|---|")?;
        for (status, count) in &self.counts {
            writeln!(out, "| {status} | {count} |")?;
        }
        writeln!(out)?;

        if !self.failures.is_empty() {
            writeln!(out, "## Failures")?;
            for (kind, entries) in &self.failures {
                writeln!(out)?;
                writeln!(out, "### {kind} ({})", entries.len())?;
                writeln!(out)?;
                for e in entries {
                    match &e.log_path {
                        Some(log) => {
                            writeln!(out, "- `{}`: {} (log: {})", e.package, e.message, log.display())?
                        }
                        None => writeln!(out, "- `{}`: {}", e.package, e.message)?,
                    }
                }
            }
            writeln!(out)?;
        }

        if !self.missing_deps.is_empty() {
            writeln!(out, "## Missing dependencies")?;
            writeln!(out)?;
            for m in &self.missing_deps {
                writeln!(
                    out,
                    "- `{}` required by {}: {}",
                    m.binary_name,
                    m.required_by.join(", "),
                    m.suggested_action
                )?;
            }
            writeln!(out)?;
        }

        if !self.cycles.is_empty() {
            writeln!(out, "## Cycles")?;
            writeln!(out)?;
            for c in &self.cycles {
                writeln!(out, "- {}", c.join(" -> "))?;
            }
            writeln!(out)?;
        }

        if !self.longest_builds.is_empty() {
            writeln!(out, "## Longest builds")?;
            writeln!(out)?;
            for d in &self.longest_builds {
                writeln!(out, "- `{}`: {}", d.package, format_ms(d.duration_ms))?;
            }
            writeln!(out)?;
        }

        writeln!(out, "## Build order")?;
        writeln!(out)?;
        for (i, name) in self.build_order.iter().enumerate() {
            writeln!(out, "{}. {name}", i + 1)?;
        }
        Ok(())
    }
}

fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}.{:03}s", secs, ms % 1000)
    }
}

/// Paths of the written reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

pub fn write_reports(fs: &dyn FileSystem, run_dir: &Path, ledger: &Ledger) -> Result<ReportPaths> {
    let summary = RunSummary::from_ledger(ledger);
    let dir = run_dir.join(REPORTS_DIR);
    fs.create_dir_all(&dir)?;

    let paths = ReportPaths {
        json: dir.join("summary.json"),
        markdown: dir.join("summary.md"),
    };
    fs.write(&paths.json, &serde_json::to_vec_pretty(&summary)?)?;
    fs.write(&paths.markdown, summary.to_markdown().as_bytes())?;

    info!(run_id = %ledger.run_id, dir = %dir.display(), "reports written");
    Ok(paths)
}
