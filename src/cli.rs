//! Command-line arguments and the interactive shell's command grammar.

use crate::config::PlaygroundConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

/// In-memory typed-script playground
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print run reports as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable colored error output
    #[arg(long)]
    pub no_color: bool,

    /// Wall-clock budget per run in milliseconds (0 disables it)
    #[arg(long, value_name = "N")]
    pub timeout_ms: Option<u64>,

    /// Load every file in a directory into the session at startup
    #[arg(long, value_name = "DIR")]
    pub load: Option<PathBuf>,

    /// Verbose diagnostics on stderr
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run one file and exit
    Run { file: PathBuf },
}

impl Cli {
    /// Let flags override values from the config file
    pub fn apply(&self, config: &mut PlaygroundConfig) {
        if self.no_color {
            config.color = false;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.executor.timeout_ms = timeout_ms;
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0} (try `help`)")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// One line typed at the shell prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    List,
    New,
    Delete(String),
    Move { source: String, target: String },
    Select(String),
    Show,
    /// Replace the editor text with lines read until a lone `.`
    Edit,
    Run,
    Stop,
    Upload(PathBuf),
    Download(Option<PathBuf>),
    Export(PathBuf),
    Import(PathBuf),
    Load(PathBuf),
    Quit,
    Empty,
}

pub const HELP: &str = "\
Commands:
  ls                  list files
  new                 create an empty file
  rm NAME             delete a file
  mv SOURCE TARGET    move a file's content to another name
  open NAME           load a file into the editor
  show                print the editor text
  edit                type new editor text, end with a line containing only '.'
  run                 run the editor text
  stop                stop the current run and clear the output
  upload PATH         add a file from disk
  download [DIR]      save the editor text (default: current directory)
  export PATH         write all files to a zip archive
  import PATH         add all files from a zip archive
  load DIR            add all files below a directory
  quit                leave the shell";

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(ShellCommand::Empty);
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb, args.as_slice()) {
            ("help" | "?", []) => ShellCommand::Help,
            ("ls" | "list", []) => ShellCommand::List,
            ("new", []) => ShellCommand::New,
            ("rm" | "delete", [name]) => ShellCommand::Delete(name.to_string()),
            ("rm" | "delete", _) => return Err(CommandError::Usage("rm NAME")),
            ("mv" | "move", [source, target]) => ShellCommand::Move {
                source: source.to_string(),
                target: target.to_string(),
            },
            ("mv" | "move", _) => return Err(CommandError::Usage("mv SOURCE TARGET")),
            ("open" | "select", [name]) => ShellCommand::Select(name.to_string()),
            ("open" | "select", _) => return Err(CommandError::Usage("open NAME")),
            ("show", []) => ShellCommand::Show,
            ("edit", []) => ShellCommand::Edit,
            ("run", []) => ShellCommand::Run,
            ("stop", []) => ShellCommand::Stop,
            ("upload", [path]) => ShellCommand::Upload(PathBuf::from(path)),
            ("upload", _) => return Err(CommandError::Usage("upload PATH")),
            ("download", []) => ShellCommand::Download(None),
            ("download", [dir]) => ShellCommand::Download(Some(PathBuf::from(dir))),
            ("download", _) => return Err(CommandError::Usage("download [DIR]")),
            ("export", [path]) => ShellCommand::Export(PathBuf::from(path)),
            ("export", _) => return Err(CommandError::Usage("export PATH")),
            ("import", [path]) => ShellCommand::Import(PathBuf::from(path)),
            ("import", _) => return Err(CommandError::Usage("import PATH")),
            ("load", [dir]) => ShellCommand::Load(PathBuf::from(dir)),
            ("load", _) => return Err(CommandError::Usage("load DIR")),
            ("quit" | "exit" | "q", []) => ShellCommand::Quit,
            _ => return Err(CommandError::Unknown(line.trim().to_string())),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", ShellCommand::Empty)]
    #[case("   ls ", ShellCommand::List)]
    #[case("rm demo", ShellCommand::Delete("demo".to_string()))]
    #[case("mv a b", ShellCommand::Move { source: "a".to_string(), target: "b".to_string() })]
    #[case("open a", ShellCommand::Select("a".to_string()))]
    #[case("download", ShellCommand::Download(None))]
    #[case("download out", ShellCommand::Download(Some(PathBuf::from("out"))))]
    #[case("run", ShellCommand::Run)]
    #[case("exit", ShellCommand::Quit)]
    fn test_parse(#[case] line: &str, #[case] expected: ShellCommand) {
        assert_eq!(ShellCommand::parse(line), Ok(expected));
    }

    #[rstest]
    #[case("rm", CommandError::Usage("rm NAME"))]
    #[case("mv a", CommandError::Usage("mv SOURCE TARGET"))]
    #[case("load a b", CommandError::Usage("load DIR"))]
    #[case("frobnicate now", CommandError::Unknown("frobnicate now".to_string()))]
    #[case("run twice", CommandError::Unknown("run twice".to_string()))]
    fn test_parse_errors(#[case] line: &str, #[case] expected: CommandError) {
        assert_eq!(ShellCommand::parse(line), Err(expected));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from(["scratchpad", "--no-color", "--timeout-ms", "0", "run", "a.ts"]);
        let mut config = PlaygroundConfig::default();
        cli.apply(&mut config);
        assert!(!config.color);
        assert_eq!(config.executor.timeout_ms, 0);
        assert_eq!(
            cli.command,
            Some(Command::Run {
                file: PathBuf::from("a.ts")
            })
        );
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::parse_from(["scratchpad"]);
        let mut config = PlaygroundConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, PlaygroundConfig::default());
        assert!(cli.command.is_none());
    }
}
