//! PTY (Pseudo-Terminal) handling for termcord
//!
//! Allocates a pseudo-terminal pair, attaches a child process to the slave
//! side and exposes the master side as an async byte channel.

pub mod pty;
pub mod session;

pub use pty::{PtyMaster, PtyReader, PtyResizer, PtyWriter};
pub use session::{PtySession, SessionBuilder};

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to allocate PTY: {0}")]
    AllocationFailed(String),

    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("PTY master has already been closed")]
    Closed,

    #[error("PTY I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub rows: u16,
    pub cols: u16,
}

impl WindowSize {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl From<WindowSize> for nix::pty::Winsize {
    fn from(size: WindowSize) -> Self {
        nix::pty::Winsize {
            ws_row: size.rows,
            ws_col: size.cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        }
    }
}

impl From<nix::pty::Winsize> for WindowSize {
    fn from(ws: nix::pty::Winsize) -> Self {
        Self {
            rows: ws.ws_row,
            cols: ws.ws_col,
        }
    }
}

/// How the child process finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exited with status zero
    Success,

    /// Exited with a non-zero status
    Code(i32),

    /// Terminated by a signal
    Signal(i32),
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Success)
    }

    /// Shell-style exit code (`128 + signal` for signal terminations)
    pub fn code(&self) -> i32 {
        match self {
            ExitOutcome::Success => 0,
            ExitOutcome::Code(code) => *code,
            ExitOutcome::Signal(signal) => 128 + signal,
        }
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(0), _) => ExitOutcome::Success,
            (Some(code), _) => ExitOutcome::Code(code),
            (None, Some(signal)) => ExitOutcome::Signal(signal),
            (None, None) => ExitOutcome::Code(-1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_outcome_codes() {
        assert_eq!(ExitOutcome::Success.code(), 0);
        assert_eq!(ExitOutcome::Code(3).code(), 3);
        assert_eq!(ExitOutcome::Signal(9).code(), 137);
        assert!(!ExitOutcome::Code(1).success());
    }

    #[test]
    fn test_exit_outcome_from_status() {
        // Raw wait statuses: exit code lives in the high byte, signal in the low bits
        assert_eq!(ExitOutcome::from(ExitStatus::from_raw(0)), ExitOutcome::Success);
        assert_eq!(
            ExitOutcome::from(ExitStatus::from_raw(2 << 8)),
            ExitOutcome::Code(2)
        );
        assert_eq!(
            ExitOutcome::from(ExitStatus::from_raw(libc::SIGKILL)),
            ExitOutcome::Signal(libc::SIGKILL)
        );
    }

    #[test]
    fn test_window_size_winsize_conversion() {
        let ws: nix::pty::Winsize = WindowSize::new(30, 100).into();
        assert_eq!(ws.ws_row, 30);
        assert_eq!(ws.ws_col, 100);
        assert_eq!(WindowSize::from(ws), WindowSize::new(30, 100));
    }
}
