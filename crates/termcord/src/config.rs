//! Recording session configuration

use std::path::PathBuf;

/// Default name of the recording file
pub const DEFAULT_FILENAME: &str = "termcording";

/// Environment variable exported to the recorded command
pub const ENV_VAR: &str = "TERMCORDING";

/// Immutable description of one recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingConfig {
    /// Program to run
    pub command: String,

    /// Arguments passed to the program
    pub args: Vec<String>,

    /// Recording file used when no explicit sink is supplied
    pub filename: PathBuf,

    /// Put the controlling terminal in raw mode and forward resizes
    pub interactive: bool,

    /// Suppress the start and end prompts
    pub quiet: bool,

    /// Append to the recording file instead of truncating it
    pub append: bool,

    /// Record keystrokes as well as output
    pub log_input: bool,

    /// Only print usage
    pub help: bool,
}

impl RecordingConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            filename: PathBuf::from(DEFAULT_FILENAME),
            interactive: false,
            quiet: false,
            append: false,
            log_input: false,
            help: false,
        }
    }

    /// A configuration that only asks for usage text
    pub fn help() -> Self {
        Self {
            help: true,
            ..Self::new("")
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn log_input(mut self, log_input: bool) -> Self {
        self.log_input = log_input;
        self
    }

    /// The command line as exported in [`ENV_VAR`]
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
