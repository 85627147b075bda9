//! RAII guard for the controlling terminal during a recording

use crate::error::RecordError;
use nix::sys::termios::{cfmakeraw, tcgetattr, tcsetattr, SetArg, Termios};
use std::io;
use std::os::unix::io::{AsFd, OwnedFd};
use termcord_pty::{pty::get_window_size, WindowSize};
use tracing::debug;

/// Owns a descriptor of the controlling terminal and, once raw mode has been
/// entered, the snapshot of the mode it replaced.
///
/// The snapshot is applied back exactly once, either by [`restore`] or on drop.
///
/// [`restore`]: TerminalGuard::restore
pub struct TerminalGuard {
    fd: OwnedFd,
    saved: Option<Termios>,
}

impl TerminalGuard {
    /// Take over `fd` without changing its mode
    pub fn acquire(fd: OwnedFd) -> Self {
        Self { fd, saved: None }
    }

    /// Guard a duplicate of the process's standard input
    pub fn stdin() -> io::Result<Self> {
        let fd = io::stdin().as_fd().try_clone_to_owned()?;
        Ok(Self::acquire(fd))
    }

    /// Snapshot the current mode and switch the terminal to raw mode.
    pub fn enable_raw_mode(&mut self) -> Result<(), RecordError> {
        if self.saved.is_some() {
            return Ok(());
        }

        let saved = tcgetattr(self.fd.as_fd()).map_err(RecordError::TerminalMode)?;
        let mut raw = saved.clone();
        cfmakeraw(&mut raw);
        tcsetattr(self.fd.as_fd(), SetArg::TCSANOW, &raw).map_err(RecordError::TerminalMode)?;

        self.saved = Some(saved);
        debug!("Terminal switched to raw mode");
        Ok(())
    }

    /// Put back the mode captured by [`enable_raw_mode`](Self::enable_raw_mode).
    /// No-op when no snapshot was taken.
    pub fn restore(&mut self) -> Result<(), RecordError> {
        if let Some(saved) = self.saved.take() {
            tcsetattr(self.fd.as_fd(), SetArg::TCSANOW, &saved)
                .map_err(RecordError::TerminalMode)?;
            debug!("Terminal mode restored");
        }
        Ok(())
    }

    /// Check if raw mode is currently enabled
    pub fn is_raw_mode(&self) -> bool {
        self.saved.is_some()
    }

    /// Current dimensions of the terminal
    pub fn window_size(&self) -> io::Result<WindowSize> {
        get_window_size(self.fd.as_fd())
    }

    /// Independent descriptor for the same terminal
    pub fn try_clone_fd(&self) -> io::Result<OwnedFd> {
        self.fd.try_clone()
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Always try to restore terminal state
        let _ = self.restore();
    }
}
