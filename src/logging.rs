//! Diagnostic logging for the shell.
//!
//! Logs go to stderr so they never mix with snippet output on stdout.
//! `RUST_LOG` overrides the default filter.

use std::io::stderr;
use std::sync::Once;
use tracing_subscriber::{fmt::layer, prelude::*, EnvFilter};

static INIT: Once = Once::new();

fn default_filter(debug: bool) -> &'static str {
    if debug {
        "info,scratchpad=debug"
    } else {
        "warn"
    }
}

/// Install the global subscriber; later calls do nothing
pub fn init_logging(debug: bool, ansi: bool) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer().with_writer(stderr).with_ansi(ansi).with_target(false))
            .init();
    });
}
