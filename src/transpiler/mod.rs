//! Source-to-source conversion from snippet files to runnable plain script.

mod registry;

#[cfg(test)]
mod tests;

pub use registry::TranspilerRegistry;

use crate::script::{self, Dialect, SyntaxError};
use thiserror::Error;

/// Core trait every transpiler adapter implements
pub trait Transpile: Send + Sync {
    /// Short adapter name for logs
    fn name(&self) -> &'static str;

    /// Convert `source` into plain script
    ///
    /// Output uses CommonJS conventions: imports become `require` calls and
    /// exports become assignments on `exports`.
    fn transpile(&self, source: &str) -> Result<String, TranspileError>;
}

/// Syntax error in the snippet, with a 1-based position
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({line}:{column})")]
pub struct TranspileError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl From<SyntaxError> for TranspileError {
    fn from(err: SyntaxError) -> Self {
        Self {
            message: err.message,
            line: err.line,
            column: err.column,
        }
    }
}

/// Typed script → plain script by erasing type syntax
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeStripper;

impl Transpile for TypeStripper {
    fn name(&self) -> &'static str {
        "type-stripper"
    }

    fn transpile(&self, source: &str) -> Result<String, TranspileError> {
        let program = script::parse(source, Dialect::Typed)?;
        Ok(script::print_program(&program))
    }
}

/// Plain script passes through unchanged once it parses
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainScript;

impl Transpile for PlainScript {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn transpile(&self, source: &str) -> Result<String, TranspileError> {
        script::parse(source, Dialect::Plain)?;
        Ok(source.to_string())
    }
}

/// Transpile typed script with the default adapter
pub fn transpile(source: &str) -> Result<String, TranspileError> {
    TypeStripper.transpile(source)
}
