//! Command-line front end

use crate::config::{RecordingConfig, DEFAULT_FILENAME};
use crate::recorder::Recorder;
use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use std::io;
use std::path::PathBuf;
use termcord_pty::ExitOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "termcord",
    version,
    about = "termcord is a terminal session recorder.",
    disable_help_flag = true
)]
pub struct Args {
    /// Prints this message
    #[arg(short = 'h', long)]
    pub help: bool,

    /// Quiet mode - suppresses the recording start and end prompts
    #[arg(short, long)]
    pub quiet: bool,

    /// Appends to file instead of overwriting it
    #[arg(short, long)]
    pub append: bool,

    /// Log key strokes to file as well
    #[arg(short = 'k', long = "log-keys")]
    pub log_keys: bool,

    /// Run command as interactive. Essential when passing a shell executable as the command argument
    #[arg(short, long)]
    pub interactive: bool,

    /// Sets recording filename
    #[arg(short, long, default_value = DEFAULT_FILENAME)]
    pub file: PathBuf,

    /// Log level
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Command to record, followed by its arguments. Defaults to $SHELL
    #[arg(trailing_var_arg = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Args {
    /// Build the recording configuration, falling back to `shell` when no command was given
    pub fn into_config(self, shell: Option<String>) -> Result<RecordingConfig> {
        if self.help {
            return Ok(RecordingConfig::help());
        }

        let mut command = self.command.into_iter();
        let (program, interactive) = match command.next() {
            Some(program) => (program, self.interactive),
            None => match shell {
                // A bare shell is always interactive
                Some(shell) if !shell.is_empty() => (shell, true),
                _ => bail!("shell empty or not set"),
            },
        };

        Ok(RecordingConfig::new(program)
            .args(command)
            .filename(self.file)
            .interactive(interactive)
            .quiet(self.quiet)
            .append(self.append)
            .log_input(self.log_keys))
    }
}

/// Usage text rendered from the argument definitions
pub fn usage() -> String {
    Args::command().render_help().to_string()
}

/// Install the stderr log subscriber
pub fn init_logging(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(level))
        .with_writer(io::stderr)
        .init();
}

/// Record according to already parsed arguments
pub async fn execute(args: Args, shell: Option<String>) -> Result<ExitOutcome> {
    let config = args
        .into_config(shell)
        .context("failed to parse command line arguments")?;

    Recorder::new(config)
        .start()
        .await
        .context("failed to start recording")
}

/// Parse the process arguments, record, and return the exit code to use
pub async fn run() -> Result<i32> {
    let args = Args::parse();
    init_logging(args.log_level);

    let outcome = execute(args, std::env::var("SHELL").ok()).await?;
    Ok(outcome.code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("termcord").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn test_setting_flags() {
        let config = parse(&["-q", "-k", "-a", "-f", "foo.txt", "bar", "baz"])
            .into_config(None)
            .unwrap();

        let want = RecordingConfig::new("bar")
            .args(["baz"])
            .filename("foo.txt")
            .quiet(true)
            .append(true)
            .log_input(true);
        assert_eq!(config, want);
    }

    #[test_case(&["ls", "-la", "/tmp"], "ls", &["-la", "/tmp"] ; "hyphenated arguments after the command")]
    #[test_case(&["-q", "echo", "-q"], "echo", &["-q"] ; "flags after the command belong to it")]
    #[test_case(&["echo"], "echo", &[] ; "command without arguments")]
    fn test_command_splitting(args: &[&str], program: &str, rest: &[&str]) {
        let config = parse(args).into_config(None).unwrap();
        assert_eq!(config.command, program);
        assert_eq!(config.args, rest);
        assert!(!config.interactive);
    }

    #[test]
    fn test_default_to_shell() {
        let config = parse(&[]).into_config(Some("/foo/bar".to_string())).unwrap();
        assert_eq!(config.command, "/foo/bar");
        assert!(config.interactive, "A bare shell is recorded interactively");
        assert_eq!(config.filename, PathBuf::from(DEFAULT_FILENAME));
    }

    #[test_case(None ; "unset")]
    #[test_case(Some(String::new()) ; "empty")]
    fn test_error_without_shell_and_command(shell: Option<String>) {
        let err = parse(&[]).into_config(shell).unwrap_err();
        assert!(err.to_string().contains("shell empty or not set"));
    }

    #[test]
    fn test_help_short_circuits() {
        let config = parse(&["-h"]).into_config(None).unwrap();
        assert!(config.help);
    }

    #[test]
    fn test_usage_text() {
        let text = usage();
        assert!(text.contains("termcord is"));
        assert!(text.contains("Usage:"));
        assert!(text.contains("Options:"));
        assert!(text.contains("--log-keys"));
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse(&["--log-level", "debug", "true"]).log_level, LogLevel::Debug);
        assert_eq!(parse(&["true"]).log_level, LogLevel::Warn);
    }
}
