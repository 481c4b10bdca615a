//! An in-memory code playground.
//!
//! Snippets live in a [`FileStore`]; one is loaded into the editor at a time
//! and run through the [`Executor`]: denylist check, type stripping, then a
//! bounded interpreter on a worker thread with its console captured.

pub mod buffer;
pub mod cli;
pub mod config;
pub mod executor;
pub mod logging;
pub mod playground;
pub mod presenter;
pub mod runtime;
pub mod script;
pub mod security;
pub mod store;
pub mod transpiler;

pub use buffer::{ActiveBuffer, Editor, TextBuffer};
pub use config::{ConfigError, PlaygroundConfig};
pub use executor::{Executor, ExecutorConfig, RunErrorKind, RunOutcome, RunPhase, RunReport, StopHandle};
pub use playground::{Dialogs, Playground};
pub use presenter::{Presenter, Surface, View};
pub use runtime::{Console, Limits};
pub use security::{CodeValidator, NameRules, PolicyViolation};
pub use store::{FileEntry, FileStore, StoreError, StoreLimits, UploadOutcome};
pub use transpiler::{Transpile, TranspileError, TranspilerRegistry};
