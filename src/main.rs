use anyhow::{bail, Context, Result};
use clap::Parser;
use scratchpad::buffer::{TextBuffer, INITIAL_TEXT};
use scratchpad::cli::{Cli, Command, ShellCommand, HELP};
use scratchpad::config::PlaygroundConfig;
use scratchpad::logging::init_logging;
use scratchpad::playground::{Dialogs, Playground};
use scratchpad::presenter::{report_json, TerminalSurface};
use scratchpad::runtime::Console;
use scratchpad::store::UploadOutcome;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

type Shell = Playground<TextBuffer, TerminalDialogs, TerminalSurface<Box<dyn Write>>>;

/// Dialogs answered on stdin
struct TerminalDialogs;

impl TerminalDialogs {
    fn ask(&self, message: &str) -> Option<String> {
        print!("{} ", message);
        let _ = io::stdout().flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

impl Dialogs for TerminalDialogs {
    fn confirm(&mut self, message: &str) -> bool {
        self.ask(&format!("{} [y/N]", message))
            .is_some_and(|answer| matches!(answer.trim(), "y" | "Y" | "yes"))
    }

    fn prompt(&mut self, message: &str) -> Option<String> {
        self.ask(message)
    }

    fn alert(&mut self, message: &str) {
        println!("! {}", message);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, io::stderr().is_terminal());

    let mut config = match &cli.config {
        Some(path) => PlaygroundConfig::load(path)?,
        None => PlaygroundConfig::default(),
    };
    cli.apply(&mut config);

    // JSON mode prints reports instead of rendered frames
    let out: Box<dyn Write> = if cli.json {
        Box::new(io::sink())
    } else {
        Box::new(io::stdout())
    };
    let color = config.color && !cli.json && io::stdout().is_terminal();
    let mut shell: Shell = Playground::new(
        &config,
        Console::stdout(),
        TextBuffer::new(INITIAL_TEXT),
        TerminalDialogs,
        TerminalSurface::new(out, color),
    )?;

    let stop = shell.stop_handle();
    ctrlc::set_handler(move || {
        if stop.stop() {
            eprintln!("^C run stopped");
        } else {
            eprintln!("^C (type `quit` to leave)");
        }
    })
    .context("Failed to install Ctrl-C handler")?;

    if let Some(dir) = &cli.load {
        let outcomes = shell
            .load_dir(dir)
            .with_context(|| format!("Failed to load {}", dir.display()))?;
        tracing::info!(files = outcomes.len(), dir = %dir.display(), "directory loaded");
    }

    match &cli.command {
        Some(Command::Run { file }) => run_file(&mut shell, file, cli.json),
        None => interactive(&mut shell, cli.json),
    }
}

/// Run one file non-interactively; fails when the run fails
fn run_file(shell: &mut Shell, file: &Path, json: bool) -> Result<()> {
    let source =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    shell.buffer_mut().set_text(&source);

    let Some(report) = run_and_print(shell, json)? else {
        bail!("a run is already in progress");
    };
    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_and_print(shell: &mut Shell, json: bool) -> Result<Option<scratchpad::RunReport>> {
    let report = shell.run();
    if json {
        if let Some(report) = &report {
            println!("{}", report_json(report)?);
        }
    }
    Ok(report)
}

fn interactive(shell: &mut Shell, json: bool) -> Result<()> {
    println!("scratchpad {} (type `help` for commands)", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let command = match ShellCommand::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }
        // No error ends the session
        if let Err(e) = dispatch(shell, command, json) {
            println!("Error: {:#}", e);
        }
    }
    Ok(())
}

fn dispatch(shell: &mut Shell, command: ShellCommand, json: bool) -> Result<()> {
    match command {
        ShellCommand::Help => println!("{}", HELP),
        ShellCommand::List => {
            let selected = shell
                .buffer()
                .selection(shell.store())
                .map(str::to_string);
            for (name, display) in shell.store().list().into_iter().zip(shell.listing()) {
                let marker = if selected.as_deref() == Some(name) { "*" } else { " " };
                println!("{} {}", marker, display);
            }
        }
        ShellCommand::New => {
            if let Some(name) = shell.new_file() {
                println!("✓ Created {}", name);
            }
        }
        ShellCommand::Delete(name) => {
            if shell.delete_file(&name) {
                println!("✓ Deleted {}", name);
            }
        }
        ShellCommand::Move { source, target } => {
            shell.move_file(&source, &target)?;
            println!("✓ Moved {} → {}", source, target);
        }
        ShellCommand::Select(name) => {
            if !shell.select(&name) {
                println!("No file named \"{}\"", name);
            }
        }
        ShellCommand::Show => println!("{}", shell.buffer().text()),
        ShellCommand::Edit => {
            let text = read_until_dot()?;
            shell.buffer_mut().set_text(&text);
        }
        ShellCommand::Run => {
            if run_and_print(shell, json)?.is_none() {
                println!("A run is already in progress");
            }
        }
        ShellCommand::Stop => {
            shell.stop();
        }
        ShellCommand::Upload(path) => {
            let outcome = shell
                .upload(&path)
                .with_context(|| format!("Failed to upload {}", path.display()))?;
            if outcome != UploadOutcome::Declined {
                println!("✓ Uploaded {}", path.display());
            }
        }
        ShellCommand::Download(dir) => {
            let dir = dir.unwrap_or_else(|| ".".into());
            if let Some(path) = shell.download(&dir)? {
                println!("✓ Saved {}", path.display());
            }
        }
        ShellCommand::Export(path) => {
            shell
                .export_archive(&path)
                .with_context(|| format!("Failed to export {}", path.display()))?;
            println!("✓ Exported {} files to {}", shell.store().len(), path.display());
        }
        ShellCommand::Import(path) => {
            let outcomes = shell
                .import_archive(&path)
                .with_context(|| format!("Failed to import {}", path.display()))?;
            print_outcomes(&outcomes);
        }
        ShellCommand::Load(dir) => {
            let outcomes = shell
                .load_dir(&dir)
                .with_context(|| format!("Failed to load {}", dir.display()))?;
            print_outcomes(&outcomes);
        }
        ShellCommand::Quit | ShellCommand::Empty => {}
    }
    Ok(())
}

fn print_outcomes(outcomes: &[(String, UploadOutcome)]) {
    let added = outcomes
        .iter()
        .filter(|(_, outcome)| *outcome != UploadOutcome::Declined)
        .count();
    println!("✓ Added {} of {} files", added, outcomes.len());
}

fn read_until_dot() -> Result<String> {
    let mut lines = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line == "." {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}
