// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated scheduler / ledger state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - persisting the ledger
//! - sending `BuildJob`s to the executor
//!
//! The core is intended to be unit tested without any Tokio, channels,
//! filesystem, or processes.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    handle_build_finished, handle_shutdown, handle_start, CoreStep, DispatchState,
};
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::ledger::Ledger;

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    state: DispatchState,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: RuntimeOptions) -> Self {
        Self {
            scheduler,
            state: DispatchState::new(),
            options: RuntimeOptions {
                parallel: options.parallel.max(1),
            },
        }
    }

    pub fn ledger(&self) -> &Ledger {
        self.scheduler.ledger()
    }

    pub fn into_ledger(self) -> Ledger {
        self.scheduler.into_ledger()
    }

    /// Number of packages currently building.
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.len()
    }

    /// Build completions handled so far, ignoring unknown packages.
    pub fn completed_builds(&self) -> usize {
        self.state.completed
    }

    pub fn is_accepting(&self) -> bool {
        self.state.accepting
    }

    /// Initial dispatch. Must be called once before feeding events.
    pub fn start(&mut self) -> CoreStep {
        handle_start(&mut self.scheduler, &mut self.state, &self.options)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::BuildFinished { package, report } => handle_build_finished(
                &mut self.scheduler,
                &mut self.state,
                &self.options,
                package,
                report,
            ),
            RuntimeEvent::ShutdownRequested => {
                handle_shutdown(&mut self.scheduler, &mut self.state, &self.options)
            }
        }
    }
}
