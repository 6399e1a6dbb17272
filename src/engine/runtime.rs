// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::BuildJob;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::ledger::{Ledger, LedgerStore};

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, RuntimeEvent};

/// Drives the scheduler in response to `RuntimeEvent`s, persists the ledger
/// and delegates actual builds to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    store: LedgerStore,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        store: LedgerStore,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            store,
        }
    }

    /// Main event loop.
    ///
    /// - Runs the initial dispatch.
    /// - Consumes `RuntimeEvent`s from `event_rx` and feeds them into the core.
    /// - Executes commands returned by the core (persist, dispatch, finish).
    ///
    /// Returns the final ledger.
    pub async fn run(mut self) -> Result<Ledger> {
        info!(run_id = %self.core.ledger().run_id, "stackbuild runtime started");

        let start = self.core.start();
        let mut keep_running = self.execute_step(start).await?;

        while keep_running {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    warn!(
                        in_flight = self.core.in_flight(),
                        "runtime event channel closed; exiting"
                    );
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            keep_running = self.execute_step(step).await?;
        }

        // Final write, so the ledger on disk matches what we return even if
        // the channel closed early.
        self.store.save(self.core.ledger())?;
        info!("runtime exiting");
        Ok(self.core.into_ledger())
    }

    async fn execute_step(&mut self, step: CoreStep) -> Result<bool> {
        for command in step.commands {
            self.execute_command(command).await?;
        }
        if !step.keep_running {
            info!("core requested exit; stopping runtime");
        }
        Ok(step.keep_running)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::PersistLedger => {
                self.store.save(self.core.ledger())?;
            }
            CoreCommand::DispatchBuilds(jobs) => {
                self.dispatch(jobs).await?;
            }
            CoreCommand::Finish => {
                let ledger = self.core.ledger();
                info!(
                    run_id = %ledger.run_id,
                    succeeded = ledger.succeeded().len(),
                    failed = ledger.failed().len(),
                    blocked = ledger.blocked().len(),
                    pending = ledger.pending().len(),
                    "run finished"
                );
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, jobs: Vec<BuildJob>) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = jobs.iter().map(|j| j.package.as_str()).collect();
        debug!(?names, "dispatching ready packages");

        self.executor.dispatch(jobs).await
    }
}
