//! Capability-scoped interpreter for plain script.
//!
//! A run sees `console` and a handful of pure globals (`Math`, `JSON`,
//! `Object`, ...) and nothing else: no module loader, no `require`, no
//! `exports`, no I/O. Evaluation is bounded by [`Limits`] and can be
//! interrupted from another thread through a shared flag.

pub mod console;

mod builtins;
mod error;
mod interpreter;
mod value;

#[cfg(test)]
mod tests;

pub use console::{Channel, Console, LogSink, MemorySink, Redirect, StdoutSink};
pub use error::RuntimeError;
pub use interpreter::Interpreter;
pub use value::Value;

use crate::script::{self, Dialect};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;

/// Resource bounds for a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Statements, loop iterations and calls combined
    pub max_steps: u64,
    pub max_call_depth: usize,
    pub max_output_lines: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 10_000_000,
            max_call_depth: 256,
            max_output_lines: 10_000,
        }
    }
}

/// How a run ended abnormally, detached from interpreter values so it can
/// cross threads
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptFailure {
    #[error("{0}")]
    Error(String),

    #[error("execution was interrupted")]
    Interrupted,
}

impl From<RuntimeError> for ScriptFailure {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Interrupted => ScriptFailure::Interrupted,
            other => ScriptFailure::Error(other.to_string()),
        }
    }
}

/// Parse and run plain script, sending console output to `channel`
pub fn execute(
    source: &str,
    channel: Channel,
    limits: Limits,
    cancel: Arc<AtomicBool>,
) -> Result<(), ScriptFailure> {
    let program = script::parse(source, Dialect::Plain)
        .map_err(|e| ScriptFailure::Error(format!("SyntaxError: {}", e)))?;
    let mut interpreter = Interpreter::new(channel, limits, cancel);
    let result = interpreter.run(&program);
    tracing::trace!(steps = interpreter.steps(), "script finished");
    result.map_err(ScriptFailure::from)
}
