//! Error types for recording sessions

use std::path::PathBuf;
use termcord_pty::PtyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("failed to create a pty from command: {0}")]
    Pty(#[from] PtyError),

    #[error("failed to switch terminal mode: {0}")]
    TerminalMode(#[source] nix::Error),

    #[error("failed to open recording file {}: {source}", path.display())]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("recording stream failed: {0}")]
    Stream(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

