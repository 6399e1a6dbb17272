// src/exec/executor_loop.rs

//! Main executor loop that owns the build workers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dag::BuildJob;
use crate::engine::{BuildReport, RuntimeEvent};
use crate::exec::build_step::BuildStep;
use crate::types::FailureType;

/// Spawn the background executor loop.
///
/// Each job runs the blocking build step on Tokio's blocking pool. The core
/// never hands out more than `parallel` jobs at once, and **per package
/// there is never more than one build running**: a job for a package that
/// is still building is dropped with a warning.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    step: Arc<dyn BuildStep>,
) -> mpsc::Sender<BuildJob> {
    let (tx, mut rx) = mpsc::channel::<BuildJob>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        let mut active: HashMap<String, JoinHandle<()>> = HashMap::new();

        while let Some(job) = rx.recv().await {
            active.retain(|_, handle| !handle.is_finished());

            if active.contains_key(&job.package) {
                warn!(
                    package = %job.package,
                    attempt = job.attempt,
                    "package already building; ignoring duplicate job"
                );
                continue;
            }

            let name = job.package.clone();
            let handle = tokio::spawn(run_job(job, Arc::clone(&step), runtime_tx.clone()));
            active.insert(name, handle);
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

/// Run one job to completion and report it. A panicking build step is
/// reported as an `unknown` failure.
async fn run_job(job: BuildJob, step: Arc<dyn BuildStep>, runtime_tx: mpsc::Sender<RuntimeEvent>) {
    let package = job.package.clone();
    debug!(package = %package, attempt = job.attempt, "worker starting build");

    let report = match tokio::task::spawn_blocking(move || step.build(&job)).await {
        Ok(report) => report,
        Err(err) => {
            error!(package = %package, error = %err, "build step panicked or was cancelled");
            BuildReport::failed(FailureType::Unknown, format!("build step aborted: {err}"), None)
        }
    };

    if runtime_tx
        .send(RuntimeEvent::BuildFinished {
            package: package.clone(),
            report,
        })
        .await
        .is_err()
    {
        warn!(package = %package, "runtime gone; dropping build result");
    }
}
