//! High-level PTY session management
//!
//! A [`PtySession`] owns one PTY pair for the lifetime of one child process.

use crate::{
    pty::{Pty, PtyMaster, PtyReader, PtyResizer, PtyWriter},
    ExitOutcome, PtyError, WindowSize,
};
use std::ffi::{OsStr, OsString};
use std::sync::Arc;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// A child process attached to a PTY
pub struct PtySession {
    /// Shared master endpoint, `None` once closed
    master: Option<Arc<PtyMaster>>,

    /// The child process
    child: Child,
}

impl PtySession {
    /// Allocate a PTY, size it if requested and start `command` on it.
    ///
    /// On failure every descriptor acquired so far has been released.
    pub fn spawn(command: Command, size: Option<WindowSize>) -> Result<Self, PtyError> {
        let pty = Pty::open(size)?;
        let (master, child) = pty.spawn(command)?;

        Ok(Self {
            master: Some(Arc::new(master)),
            child,
        })
    }

    /// Process ID of the child, if it has not been reaped yet
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn master(&self) -> Result<&Arc<PtyMaster>, PtyError> {
        self.master.as_ref().ok_or(PtyError::Closed)
    }

    /// Reader for everything the child writes to its terminal
    pub fn reader(&self) -> Result<PtyReader, PtyError> {
        Ok(PtyReader::new(self.master()?.clone()))
    }

    /// Writer for the child's terminal input
    pub fn writer(&self) -> Result<PtyWriter, PtyError> {
        Ok(PtyWriter::new(self.master()?.clone()))
    }

    /// Resize handle usable from another task
    pub fn resizer(&self) -> PtyResizer {
        match &self.master {
            Some(master) => PtyResizer::new(master),
            None => PtyResizer::detached(),
        }
    }

    /// Resize the terminal
    pub fn resize(&self, size: WindowSize) -> Result<(), PtyError> {
        self.master()?.resize(size)
    }

    /// Current terminal size
    pub fn size(&self) -> Result<WindowSize, PtyError> {
        self.master()?.size()
    }

    /// Signal end of input to a line-oriented child
    pub async fn send_eof(&self) -> Result<bool, PtyError> {
        self.master()?.send_eof().await
    }

    /// Wait for the process to exit
    pub async fn wait(&mut self) -> Result<ExitOutcome, PtyError> {
        let status = self.child.wait().await?;
        let outcome = ExitOutcome::from(status);
        debug!(?outcome, "Child exited");
        Ok(outcome)
    }

    /// Kill the process
    pub fn kill(&mut self) -> Result<(), PtyError> {
        self.child.start_kill()?;
        Ok(())
    }

    /// Kill the process and reap it, logging anything that goes wrong
    pub async fn terminate(&mut self) {
        if let Err(e) = self.kill() {
            debug!("Kill failed, child probably already gone: {}", e);
        }
        if let Err(e) = self.wait().await {
            warn!("Failed to reap child: {}", e);
        }
    }

    /// Release the master side. Idempotent.
    ///
    /// Outstanding readers and writers keep the device open until they drop.
    pub fn close(&mut self) {
        if self.master.take().is_some() {
            debug!("PTY master released");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.master.is_none()
    }
}

/// Builder for creating PTY sessions
pub struct SessionBuilder {
    program: OsString,
    args: Vec<OsString>,
    size: Option<WindowSize>,
    env_vars: Vec<(OsString, OsString)>,
}

impl SessionBuilder {
    /// Create a new session builder for `program`
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            size: None,
            env_vars: Vec::new(),
        }
    }

    /// Append arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set the size applied before the child starts
    pub fn size(mut self, size: Option<WindowSize>) -> Self {
        self.size = size;
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env_vars
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Build the command and start the session
    pub fn spawn(self) -> Result<PtySession, PtyError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);

        for (key, value) in self.env_vars {
            command.env(key, value);
        }

        PtySession::spawn(command, self.size)
    }
}
