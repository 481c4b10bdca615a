//! The shared output console and its per-run redirection.
//!
//! A run captures console output by installing a [`Redirect`]. While it is
//! installed, every line logged through the console lands in the run's
//! capture buffer instead of the original sink. Dropping or releasing the
//! guard restores the sink, but only if the capture still belongs to that run:
//! a guard left behind by a stopped run can never undo a newer redirect.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use uuid::Uuid;

/// Destination for console lines when no run is capturing them
pub trait LogSink: Send {
    fn write_line(&mut self, line: &str);
}

/// Writes lines to the process stdout
#[derive(Debug, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&mut self, line: &str) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        let _ = writeln!(handle, "{}", line);
    }
}

/// Collects lines in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for MemorySink {
    fn write_line(&mut self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("output exceeded the limit of {limit} lines")]
pub struct OutputLimitExceeded {
    pub limit: usize,
}

struct Capture {
    owner: Uuid,
    lines: Vec<String>,
    limit: usize,
}

struct ConsoleState {
    original: Box<dyn LogSink>,
    capture: Option<Capture>,
    redirects: u64,
}

/// Process-wide console shared by the host and running snippets
#[derive(Clone)]
pub struct Console {
    state: Arc<Mutex<ConsoleState>>,
}

impl Console {
    pub fn new(sink: impl LogSink + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConsoleState {
                original: Box::new(sink),
                capture: None,
                redirects: 0,
            })),
        }
    }

    pub fn stdout() -> Self {
        Self::new(StdoutSink)
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log a line from the host. Goes to the active capture if any.
    pub fn log(&self, line: &str) {
        let mut state = self.lock();
        match state.capture.as_mut() {
            Some(capture) if capture.lines.len() < capture.limit => {
                capture.lines.push(line.to_string())
            }
            Some(_) => {}
            None => state.original.write_line(line),
        }
    }

    pub fn is_redirected(&self) -> bool {
        self.lock().capture.is_some()
    }

    /// How many redirects have ever been installed
    pub fn redirect_count(&self) -> u64 {
        self.lock().redirects
    }

    /// Route console output into a fresh capture owned by `owner`.
    ///
    /// Replaces any capture still installed by an earlier run.
    pub fn redirect(&self, owner: Uuid, limit: usize) -> Redirect {
        let mut state = self.lock();
        if let Some(previous) = state.capture.as_ref() {
            tracing::debug!(previous = %previous.owner, %owner, "replacing stale console capture");
        }
        state.capture = Some(Capture {
            owner,
            lines: Vec::new(),
            limit,
        });
        state.redirects += 1;
        drop(state);

        Redirect {
            console: self.clone(),
            owner,
            released: false,
        }
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Console")
            .field("redirected", &state.capture.is_some())
            .field("redirects", &state.redirects)
            .finish()
    }
}

/// Guard for an installed capture; restores the original sink when released or dropped
#[must_use = "dropping the redirect restores the console immediately"]
pub struct Redirect {
    console: Console,
    owner: Uuid,
    released: bool,
}

impl Redirect {
    /// Writer handle for the snippet side of the capture
    pub fn channel(&self) -> Channel {
        Channel {
            console: self.console.clone(),
            owner: self.owner,
        }
    }

    /// Restore the console and return the captured lines
    pub fn release(mut self) -> Vec<String> {
        self.restore()
    }

    fn restore(&mut self) -> Vec<String> {
        if self.released {
            return Vec::new();
        }
        self.released = true;

        let mut state = self.console.lock();
        match state.capture.take() {
            Some(capture) if capture.owner == self.owner => capture.lines,
            other => {
                // someone else owns the console now; leave their capture alone
                state.capture = other;
                Vec::new()
            }
        }
    }
}

impl Drop for Redirect {
    fn drop(&mut self) {
        self.restore();
    }
}

/// A run's view of the console. Lines are kept only while the run owns the capture.
#[derive(Clone)]
pub struct Channel {
    console: Console,
    owner: Uuid,
}

impl Channel {
    pub fn emit(&self, line: String) -> Result<(), OutputLimitExceeded> {
        let mut state = self.console.lock();
        match state.capture.as_mut() {
            Some(capture) if capture.owner == self.owner => {
                if capture.lines.len() >= capture.limit {
                    return Err(OutputLimitExceeded {
                        limit: capture.limit,
                    });
                }
                capture.lines.push(line);
                Ok(())
            }
            // run was stopped or superseded; its output goes nowhere
            _ => Ok(()),
        }
    }
}
