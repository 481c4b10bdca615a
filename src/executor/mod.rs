//! Runs snippets: validate, transpile, then execute on a worker thread.
//!
//! Only one run may be in flight per executor. The run slot is the single
//! piece of state shared with [`StopHandle`], which may fire from another
//! thread (e.g. a Ctrl-C handler). Stopping frees the slot at once and raises
//! the run's cancellation flag; the interpreter notices the flag at its next
//! step.

mod report;

#[cfg(test)]
mod tests;

pub use report::{RunErrorKind, RunOutcome, RunPhase, RunReport};

use crate::runtime::{self, Console, Limits, ScriptFailure};
use crate::security::CodeValidator;
use crate::transpiler::TranspilerRegistry;
use chrono::Utc;
use crossbeam_channel::RecvTimeoutError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Interpreter recursion is deep; give workers room
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Wall-clock budget per run; 0 disables the timeout
    pub timeout_ms: u64,
    pub limits: Limits,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            limits: Limits::default(),
        }
    }
}

struct ActiveRun {
    id: Uuid,
    cancel: Arc<AtomicBool>,
    phase: RunPhase,
}

type RunSlot = Arc<Mutex<Option<ActiveRun>>>;

fn lock_slot(slot: &RunSlot) -> MutexGuard<'_, Option<ActiveRun>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancels whatever run is in flight; cheap to clone and `Send`
#[derive(Clone)]
pub struct StopHandle {
    slot: RunSlot,
}

impl StopHandle {
    /// Returns whether a run was in flight
    pub fn stop(&self) -> bool {
        match lock_slot(&self.slot).take() {
            Some(run) => {
                run.cancel.store(true, Ordering::SeqCst);
                tracing::info!(run = %run.id, phase = ?run.phase, "run stopped");
                true
            }
            None => false,
        }
    }
}

pub struct Executor {
    validator: CodeValidator,
    transpilers: TranspilerRegistry,
    console: Console,
    config: ExecutorConfig,
    slot: RunSlot,
}

impl Executor {
    pub fn new(console: Console, config: ExecutorConfig) -> Self {
        Self {
            validator: CodeValidator::new(),
            transpilers: TranspilerRegistry::standard(),
            console,
            config,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_validator(mut self, validator: CodeValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_transpilers(mut self, transpilers: TranspilerRegistry) -> Self {
        self.transpilers = transpilers;
        self
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        lock_slot(&self.slot).is_some()
    }

    pub fn phase(&self) -> RunPhase {
        lock_slot(&self.slot)
            .as_ref()
            .map_or(RunPhase::Idle, |run| run.phase)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Cancel the in-flight run, if any
    pub fn stop(&self) -> bool {
        self.stop_handle().stop()
    }

    /// Run `source`, choosing the transpiler by `extension`.
    ///
    /// Returns `None` without doing anything when a run is already in flight.
    pub fn run(&self, source: &str, extension: &str) -> Option<RunReport> {
        let id = Uuid::new_v4();
        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut slot = lock_slot(&self.slot);
            if let Some(active) = slot.as_ref() {
                tracing::debug!(active = %active.id, "run ignored while another is in flight");
                return None;
            }
            *slot = Some(ActiveRun {
                id,
                cancel: Arc::clone(&cancel),
                phase: RunPhase::Validating,
            });
        }

        let started_at = Utc::now();
        let clock = Instant::now();
        tracing::debug!(run = %id, extension, "run started");

        let outcome = self.attempt(id, source, extension, &cancel);
        let report = RunReport {
            id,
            started_at,
            elapsed_ms: clock.elapsed().as_millis() as u64,
            outcome,
        };
        self.advance(id, report.final_phase());
        self.finish(id);

        match &report.outcome {
            RunOutcome::Completed { output } => {
                tracing::info!(run = %id, elapsed_ms = report.elapsed_ms, lines = output.len(), "run completed")
            }
            RunOutcome::Failed { kind, message } => {
                tracing::info!(run = %id, elapsed_ms = report.elapsed_ms, ?kind, %message, "run failed")
            }
        }
        Some(report)
    }

    fn attempt(
        &self,
        id: Uuid,
        source: &str,
        extension: &str,
        cancel: &Arc<AtomicBool>,
    ) -> RunOutcome {
        if let Err(violation) = self.validator.check(source) {
            return RunOutcome::failed(RunErrorKind::ContentPolicy, violation.to_string());
        }

        if !self.advance(id, RunPhase::Transpiling) {
            return RunOutcome::stopped();
        }
        let adapter = self.transpilers.select(extension);
        let plain = match adapter.transpile(source) {
            Ok(plain) => plain,
            Err(e) => return RunOutcome::failed(RunErrorKind::Transpilation, e.to_string()),
        };
        tracing::trace!(run = %id, adapter = adapter.name(), "transpiled");

        if !self.advance(id, RunPhase::Executing) {
            return RunOutcome::stopped();
        }
        self.execute(id, plain, cancel)
    }

    fn execute(&self, id: Uuid, plain: String, cancel: &Arc<AtomicBool>) -> RunOutcome {
        let limits = self.config.limits;
        // restored on every path out of this function, including worker panics
        let redirect = self.console.redirect(id, limits.max_output_lines);
        let channel = redirect.channel();
        let worker_cancel = Arc::clone(cancel);
        let (tx, rx) = crossbeam_channel::bounded(1);

        let spawned = thread::Builder::new()
            .name(format!("run-{}", id.simple()))
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                let result = runtime::execute(&plain, channel, limits, worker_cancel);
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            return RunOutcome::failed(
                RunErrorKind::Execution,
                format!("failed to start worker: {}", e),
            );
        }

        let received = match self.config.timeout_ms {
            0 => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            ms => rx.recv_timeout(Duration::from_millis(ms)),
        };

        match received {
            Ok(_) if cancel.load(Ordering::SeqCst) => RunOutcome::stopped(),
            Ok(Ok(())) => RunOutcome::Completed {
                output: redirect.release(),
            },
            Ok(Err(ScriptFailure::Interrupted)) => RunOutcome::stopped(),
            Ok(Err(ScriptFailure::Error(message))) => {
                RunOutcome::failed(RunErrorKind::Execution, message)
            }
            Err(RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::SeqCst);
                RunOutcome::failed(
                    RunErrorKind::Timeout,
                    format!("execution timed out after {} ms", self.config.timeout_ms),
                )
            }
            Err(RecvTimeoutError::Disconnected) => RunOutcome::failed(
                RunErrorKind::Execution,
                "worker terminated unexpectedly",
            ),
        }
    }

    /// Move run `id` to `phase`; false when the run no longer owns the slot
    fn advance(&self, id: Uuid, phase: RunPhase) -> bool {
        let mut slot = lock_slot(&self.slot);
        match slot.as_mut() {
            Some(run) if run.id == id => {
                tracing::debug!(run = %id, from = ?run.phase, to = ?phase, "phase");
                run.phase = phase;
                true
            }
            _ => false,
        }
    }

    /// Release the slot if it still belongs to run `id`
    fn finish(&self, id: Uuid) {
        let mut slot = lock_slot(&self.slot);
        if slot.as_ref().is_some_and(|run| run.id == id) {
            *slot = None;
        }
    }
}
