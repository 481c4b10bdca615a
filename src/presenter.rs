//! Turns run state into the single block of text shown to the user.
//!
//! Every render replaces what was displayed before; there is no history.

use crate::executor::{RunErrorKind, RunOutcome, RunReport};
use std::io::{self, Write};

pub const RUNNING_NOTICE: &str = "Running code...";
pub const NO_OUTPUT: &str = "No output.";
pub const STOPPED_NOTICE: &str = "Execution stopped.";
pub const POLICY_NOTICE: &str = "Error: code contains disallowed commands!";

const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// What the display should show next
#[derive(Debug, Clone, Copy)]
pub enum View<'a> {
    Running,
    Report(&'a RunReport),
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Normal,
    Error,
}

/// One complete display state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub text: String,
    pub tone: Tone,
}

impl Frame {
    fn normal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: Tone::Normal,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: Tone::Error,
        }
    }

    pub fn for_view(view: View<'_>) -> Self {
        match view {
            View::Running => Frame::normal(RUNNING_NOTICE),
            View::Stopped => Frame::normal(STOPPED_NOTICE),
            View::Report(report) => Frame::for_outcome(&report.outcome),
        }
    }

    fn for_outcome(outcome: &RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed { output } if output.is_empty() => Frame::normal(NO_OUTPUT),
            RunOutcome::Completed { output } => Frame::normal(output.join("\n")),
            RunOutcome::Failed { kind, message } => match kind {
                RunErrorKind::ContentPolicy => Frame::error(POLICY_NOTICE),
                RunErrorKind::Transpilation => {
                    Frame::error(format!("Transpilation error: {}", message))
                }
                RunErrorKind::Execution | RunErrorKind::Timeout => {
                    Frame::error(format!("Execution error: {}", message))
                }
                RunErrorKind::Stopped => Frame::normal(STOPPED_NOTICE),
            },
        }
    }
}

/// Where frames end up
pub trait Surface {
    fn show(&mut self, frame: &Frame) -> io::Result<()>;
    fn clear(&mut self) -> io::Result<()>;
}

/// Writes frames to a terminal stream, errors in red when color is on
pub struct TerminalSurface<W: Write> {
    out: W,
    color: bool,
}

impl TerminalSurface<io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Surface for TerminalSurface<W> {
    fn show(&mut self, frame: &Frame) -> io::Result<()> {
        if self.color && frame.tone == Tone::Error {
            writeln!(self.out, "{}{}{}", RED, frame.text, RESET)?;
        } else {
            writeln!(self.out, "{}", frame.text)?;
        }
        self.out.flush()
    }

    // A terminal keeps its scrollback; clearing just ends the previous block
    fn clear(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps every frame shown, for tests and embedding
#[derive(Debug, Default)]
pub struct MemorySurface {
    frames: Vec<Frame>,
    clears: usize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl Surface for MemorySurface {
    fn show(&mut self, frame: &Frame) -> io::Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.clears += 1;
        Ok(())
    }
}

pub struct Presenter<S: Surface> {
    surface: S,
    current: Option<Frame>,
}

impl<S: Surface> Presenter<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            current: None,
        }
    }

    /// Replace the display with `view`
    pub fn render(&mut self, view: View<'_>) {
        let frame = Frame::for_view(view);
        if let Err(e) = self.surface.show(&frame) {
            tracing::warn!(error = %e, "failed to write output");
        }
        self.current = Some(frame);
    }

    pub fn clear(&mut self) {
        if let Err(e) = self.surface.clear() {
            tracing::warn!(error = %e, "failed to clear output");
        }
        self.current = None;
    }

    /// Text currently on display, empty after a clear
    pub fn displayed(&self) -> &str {
        self.current.as_ref().map_or("", |f| f.text.as_str())
    }

    pub fn current(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

/// Pretty JSON for a run report
pub fn report_json(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
