//! Terminal session recorder
//!
//! Runs a command on a pseudo-terminal, relays its terminal I/O unchanged and
//! keeps a raw copy of the output (and optionally the keystrokes) in one or
//! more sinks.

pub mod cli;
pub mod config;
pub mod error;
pub mod recorder;
pub mod resize;
pub mod sink;
pub mod terminal;

pub use config::RecordingConfig;
pub use error::RecordError;
pub use recorder::Recorder;
pub use termcord_pty::{ExitOutcome, WindowSize};
