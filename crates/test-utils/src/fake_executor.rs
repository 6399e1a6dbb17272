use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use stackbuild::dag::BuildJob;
use stackbuild::engine::{BuildReport, RuntimeEvent};
use stackbuild::errors::Result;
use stackbuild::exec::{BuildStep, ExecutorBackend};
use stackbuild::types::FailureType;

/// A fake executor that:
/// - records which jobs were dispatched
/// - immediately reports `BuildFinished` for each job, with a scripted
///   failure when one is registered and success otherwise.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    dispatched: Arc<Mutex<Vec<BuildJob>>>,
    failures: HashMap<String, FailureType>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        dispatched: Arc<Mutex<Vec<BuildJob>>>,
    ) -> Self {
        Self {
            runtime_tx,
            dispatched,
            failures: HashMap::new(),
        }
    }

    pub fn failing(mut self, package: &str, failure_type: FailureType) -> Self {
        self.failures.insert(package.to_string(), failure_type);
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn dispatch(
        &mut self,
        jobs: Vec<BuildJob>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let dispatched = Arc::clone(&self.dispatched);
        let failures = self.failures.clone();

        Box::pin(async move {
            for job in jobs {
                {
                    let mut guard = dispatched.lock().unwrap();
                    guard.push(job.clone());
                }

                let report = match failures.get(&job.package) {
                    Some(ft) => BuildReport::failed(*ft, "scripted failure", None),
                    None => BuildReport::success(None),
                };

                tx.send(RuntimeEvent::BuildFinished {
                    package: job.package.clone(),
                    report,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}

/// A build step for the real executor loop: sleeps briefly, records calls
/// and tracks the peak number of concurrent builds.
#[derive(Default)]
pub struct ScriptedBuildStep {
    failures: HashMap<String, FailureType>,
    panics: Vec<String>,
    delay: Duration,
    calls: Mutex<Vec<BuildJob>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedBuildStep {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing(mut self, package: &str, failure_type: FailureType) -> Self {
        self.failures.insert(package.to_string(), failure_type);
        self
    }

    pub fn panicking(mut self, package: &str) -> Self {
        self.panics.push(package.to_string());
        self
    }

    pub fn calls(&self) -> Vec<BuildJob> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl BuildStep for ScriptedBuildStep {
    fn build(&self, job: &BuildJob) -> BuildReport {
        self.calls.lock().unwrap().push(job.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        std::thread::sleep(self.delay);
        self.running.fetch_sub(1, Ordering::SeqCst);

        if self.panics.contains(&job.package) {
            panic!("scripted panic for {}", job.package);
        }
        match self.failures.get(&job.package) {
            Some(ft) => BuildReport::failed(*ft, "scripted failure", None),
            None => BuildReport::success(None),
        }
    }
}
