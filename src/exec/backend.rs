// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender,
//! so tests can swap in a fake executor.
//!
//! - `RealExecutorBackend` wraps the [`spawn_executor`] loop and forwards
//!   jobs over an mpsc channel.
//! - Tests can provide their own `ExecutorBackend` that, for example,
//!   records which packages were dispatched and directly emits
//!   `BuildFinished` events.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;

use crate::dag::BuildJob;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::exec::build_step::BuildStep;

use super::executor_loop::spawn_executor;

/// Trait abstracting how dispatched jobs are executed.
pub trait ExecutorBackend: Send {
    /// Dispatch the given jobs for execution.
    ///
    /// The implementation is free to:
    /// - run real builds on worker threads (production)
    /// - simulate completion and emit `RuntimeEvent`s (tests)
    fn dispatch(
        &mut self,
        jobs: Vec<BuildJob>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production.
pub struct RealExecutorBackend {
    tx: mpsc::Sender<BuildJob>,
}

impl RealExecutorBackend {
    /// Create a backend wired to the given runtime event sender.
    ///
    /// This spawns the background executor loop immediately.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, step: Arc<dyn BuildStep>) -> Self {
        let tx = spawn_executor(runtime_tx, step);
        Self { tx }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn dispatch(
        &mut self,
        jobs: Vec<BuildJob>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for job in jobs {
                let package = job.package.clone();
                tx.send(job)
                    .await
                    .with_context(|| format!("sending job for '{package}' to executor"))?;
            }
            Ok(())
        })
    }
}
