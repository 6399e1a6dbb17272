// src/ledger/store.rs

//! On-disk persistence of ledgers.
//!
//! Layout:
//!
//! ```text
//! <runs_root>/<run_id>/state/ledger.json
//! <runs_root>/<run_id>/logs/...
//! <runs_root>/<run_id>/reports/...
//! ```
//!
//! Saves go through a temporary file and a rename so a crash never leaves a
//! half-written ledger behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::ledger::Ledger;

pub const STATE_DIR: &str = "state";
pub const LEDGER_FILE: &str = "ledger.json";

/// Generate a run id from a timestamp. Ids sort chronologically.
pub fn new_run_id(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

#[derive(Debug, Clone)]
pub struct LedgerStore {
    fs: Arc<dyn FileSystem>,
    runs_root: PathBuf,
}

impl LedgerStore {
    pub fn new(fs: Arc<dyn FileSystem>, runs_root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            runs_root: runs_root.into(),
        }
    }

    pub fn runs_root(&self) -> &Path {
        &self.runs_root
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.runs_root.join(run_id)
    }

    pub fn ledger_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join(STATE_DIR).join(LEDGER_FILE)
    }

    /// Serialize and atomically replace the ledger of `ledger.run_id`.
    pub fn save(&self, ledger: &Ledger) -> Result<()> {
        let path = self.ledger_path(&ledger.run_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(ledger)?;

        if let Some(parent) = path.parent() {
            self.fs.create_dir_all(parent)?;
        }
        self.fs.write(&tmp, &bytes)?;
        self.fs
            .rename(&tmp, &path)
            .with_context(|| format!("replacing ledger {}", path.display()))?;

        debug!(run_id = %ledger.run_id, path = %path.display(), "ledger saved");
        Ok(())
    }

    /// Load the ledger of `run_id`.
    ///
    /// A missing or unreadable ledger means "no prior run" and yields `None`.
    pub fn load(&self, run_id: &str) -> Option<Ledger> {
        let path = self.ledger_path(run_id);
        if !self.fs.is_file(&path) {
            debug!(run_id = %run_id, path = %path.display(), "no ledger on disk");
            return None;
        }

        let contents = match self.fs.read_to_string(&path) {
            Ok(c) => c,
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "cannot read ledger; treating as no prior run");
                return None;
            }
        };

        match serde_json::from_str::<Ledger>(&contents) {
            Ok(ledger) => Some(ledger),
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "corrupt ledger; treating as no prior run");
                None
            }
        }
    }

    /// Most recent run that has a ledger on disk.
    pub fn latest_run_id(&self) -> Option<String> {
        if !self.fs.is_dir(&self.runs_root) {
            return None;
        }

        let entries = match self.fs.read_dir(&self.runs_root) {
            Ok(e) => e,
            Err(err) => {
                warn!(root = %self.runs_root.display(), error = %err, "cannot list runs");
                return None;
            }
        };

        entries
            .into_iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .filter(|id| self.fs.is_file(&self.ledger_path(id)))
            .max()
    }
}
