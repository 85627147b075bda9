//! Common test utilities for termcord integration tests

#![allow(dead_code)]

use nix::pty::{openpty, OpenptyResult, Winsize};
use nix::sys::termios::Termios;
use std::os::unix::io::{AsFd, OwnedFd};
use std::sync::Once;
use termcord_pty::pty::set_window_size;
use termcord_pty::WindowSize;
use tokio::io::DuplexStream;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("termcord=debug,termcord_pty=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A PTY pair standing in for the user's terminal: (master, slave)
pub fn fake_terminal(size: WindowSize) -> (OwnedFd, OwnedFd) {
    let OpenptyResult { master, slave } =
        openpty(None::<&Winsize>, None::<&Termios>).expect("Failed to open terminal pair");
    set_window_size(slave.as_fd(), size).expect("Failed to size terminal pair");
    (master, slave)
}

/// Input that never produces data nor reaches end-of-stream.
///
/// Keep the second half alive for as long as the input must stay open.
pub fn pending_input() -> (DuplexStream, DuplexStream) {
    tokio::io::duplex(64)
}
