//! Forwarding of controlling-terminal resizes into the PTY

use std::os::unix::io::{AsFd, BorrowedFd, OwnedFd};
use termcord_pty::{pty::get_window_size, PtyError, PtyResizer};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Background listener copying the terminal size into the PTY on every SIGWINCH
pub struct ResizeForwarder {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ResizeForwarder {
    /// Apply the current size once, then keep forwarding until stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(terminal: OwnedFd, resizer: PtyResizer) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        // Register before the initial resize so no notification slips between them
        let winch = match signal(SignalKind::window_change()) {
            Ok(winch) => Some(winch),
            Err(e) => {
                warn!("Cannot listen for terminal resizes: {}", e);
                None
            }
        };

        forward_size(terminal.as_fd(), &resizer);

        let handle = winch.map(|mut winch| {
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        received = winch.recv() => {
                            if received.is_none() {
                                break;
                            }
                            forward_size(terminal.as_fd(), &resizer);
                        }
                        _ = shutdown_rx.changed() => {
                            debug!("Resize forwarding stopped");
                            break;
                        }
                    }
                }
            })
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stop listening and wait for the listener to finish
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ResizeForwarder {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Copy the terminal's size into the PTY. Failures are logged, never returned.
pub fn forward_size(terminal: BorrowedFd<'_>, resizer: &PtyResizer) -> bool {
    let size = match get_window_size(terminal) {
        Ok(size) => size,
        Err(e) => {
            warn!("Failed to read terminal size: {}", e);
            return false;
        }
    };

    match resizer.resize(size) {
        Ok(()) => {
            debug!(rows = size.rows, cols = size.cols, "PTY resized");
            true
        }
        Err(PtyError::Closed) => {
            // Teardown won the race; nothing left to resize
            debug!("PTY already closed, resize skipped");
            false
        }
        Err(e) => {
            warn!("Error resizing pty: {}", e);
            false
        }
    }
}
