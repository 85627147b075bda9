//! Low-level PTY allocation and management
//!
//! Provides the device pair, window-size ioctls and the async halves of the
//! master endpoint for Unix-like systems

use crate::{PtyError, WindowSize};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::pty::{openpty, OpenptyResult, Winsize};
use nix::sys::termios::{tcgetattr, LocalFlags, SpecialCharacterIndices, Termios};
use nix::unistd;
use std::future::poll_fn;
use std::io;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, Weak};
use std::task::{ready, Context, Poll};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, Command};
use tracing::debug;

/// A pseudo-terminal pair
pub struct Pty {
    /// Master side, registered with the reactor
    master: PtyMaster,

    /// Slave side, handed to the child on spawn
    slave: OwnedFd,
}

/// Master side of a PTY
pub struct PtyMaster {
    fd: AsyncFd<OwnedFd>,
}

impl Pty {
    /// Allocate a new PTY pair, optionally sized before anything attaches to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(size: Option<WindowSize>) -> Result<Self, PtyError> {
        let winsize = size.map(Winsize::from);

        let OpenptyResult { master, slave } = openpty(winsize.as_ref(), None::<&Termios>)
            .map_err(|e| PtyError::AllocationFailed(format!("openpty failed: {}", e)))?;

        // Neither end may leak into the child beyond its stdio
        set_cloexec(&master)?;
        set_cloexec(&slave)?;
        set_nonblocking(&master)?;

        let master = PtyMaster::new(master)?;
        debug!(master_fd = master.as_raw_fd(), "Allocated PTY pair");

        Ok(Self { master, slave })
    }

    /// Resize the PTY
    pub fn resize(&self, size: WindowSize) -> Result<(), PtyError> {
        self.master.resize(size)
    }

    /// Get the master side of the PTY
    pub fn master(&self) -> &PtyMaster {
        &self.master
    }

    /// Spawn a process with the slave as its controlling terminal.
    ///
    /// The parent's slave descriptors are released before this returns,
    /// whether or not the spawn succeeded.
    pub fn spawn(self, mut command: Command) -> Result<(PtyMaster, Child), PtyError> {
        let Pty { master, slave } = self;
        let program = command
            .as_std()
            .get_program()
            .to_string_lossy()
            .into_owned();

        command
            .stdin(Stdio::from(slave.try_clone()?))
            .stdout(Stdio::from(slave.try_clone()?))
            .stderr(Stdio::from(slave));

        // Runs in the child after stdio has been dup'ed onto 0/1/2
        unsafe {
            command.pre_exec(|| {
                if libc::setsid() < 0 {
                    return Err(io::Error::last_os_error());
                }
                if libc::ioctl(0, libc::TIOCSCTTY, 0) < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let spawned = command.spawn();
        // The command still owns the slave copies until dropped
        drop(command);

        let child = spawned.map_err(|source| PtyError::SpawnFailed {
            command: program,
            source,
        })?;
        debug!(pid = ?child.id(), "Spawned child on PTY");

        Ok((master, child))
    }
}

impl PtyMaster {
    fn new(fd: OwnedFd) -> Result<Self, PtyError> {
        Ok(Self {
            fd: AsyncFd::new(fd)?,
        })
    }

    /// Apply a window size to the pair
    pub fn resize(&self, size: WindowSize) -> Result<(), PtyError> {
        set_window_size(self.fd.get_ref().as_fd(), size)?;
        Ok(())
    }

    /// Current window size of the pair
    pub fn size(&self) -> Result<WindowSize, PtyError> {
        Ok(get_window_size(self.fd.get_ref().as_fd())?)
    }

    /// Line-discipline settings of the pair
    pub fn termios(&self) -> Result<Termios, PtyError> {
        tcgetattr(self.fd.get_ref().as_fd()).map_err(|e| PtyError::Io(e.into()))
    }

    /// Write the VEOF character if the pair is in canonical mode.
    ///
    /// Returns whether anything was sent.
    pub async fn send_eof(&self) -> Result<bool, PtyError> {
        let attrs = self.termios()?;
        if !attrs.local_flags.contains(LocalFlags::ICANON) {
            return Ok(false);
        }
        let eof = [attrs.control_chars[SpecialCharacterIndices::VEOF as usize]];
        poll_fn(|cx| self.poll_write(cx, &eof)).await?;
        Ok(true)
    }

    pub fn poll_read(&self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.fd.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| read_fd(inner.get_ref(), unfilled)) {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                // Linux reports EIO once every slave descriptor is gone
                Ok(Err(e)) if e.raw_os_error() == Some(Errno::EIO as i32) => {
                    return Poll::Ready(Ok(()))
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }

    pub fn poll_write(&self, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = ready!(self.fd.poll_write_ready(cx))?;
            match guard.try_io(|inner| write_fd(inner.get_ref(), buf)) {
                Ok(Ok(n)) => return Poll::Ready(Ok(n)),
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsRawFd for PtyMaster {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.get_ref().as_raw_fd()
    }
}

/// Read half of a shared PTY master
pub struct PtyReader {
    master: Arc<PtyMaster>,
}

/// Write half of a shared PTY master
pub struct PtyWriter {
    master: Arc<PtyMaster>,
}

/// Resize handle that does not keep the master alive
#[derive(Clone)]
pub struct PtyResizer {
    master: Weak<PtyMaster>,
}

impl PtyReader {
    pub fn new(master: Arc<PtyMaster>) -> Self {
        Self { master }
    }
}

impl PtyWriter {
    pub fn new(master: Arc<PtyMaster>) -> Self {
        Self { master }
    }
}

impl PtyResizer {
    pub fn new(master: &Arc<PtyMaster>) -> Self {
        Self {
            master: Arc::downgrade(master),
        }
    }

    /// A resizer whose master is already gone
    pub fn detached() -> Self {
        Self {
            master: Weak::new(),
        }
    }

    pub fn resize(&self, size: WindowSize) -> Result<(), PtyError> {
        let master = self.master.upgrade().ok_or(PtyError::Closed)?;
        master.resize(size)
    }
}

impl AsyncRead for PtyReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.master.poll_read(cx, buf)
    }
}

impl AsyncWrite for PtyWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.master.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // Writes go straight to the device
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Query the window size of a terminal descriptor
pub fn get_window_size(fd: BorrowedFd<'_>) -> io::Result<WindowSize> {
    let mut winsize = Winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    unsafe {
        let ret = libc::ioctl(fd.as_raw_fd(), libc::TIOCGWINSZ, &mut winsize as *mut Winsize);
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(winsize.into())
}

/// Apply a window size to a terminal descriptor
pub fn set_window_size(fd: BorrowedFd<'_>, size: WindowSize) -> io::Result<()> {
    let winsize = Winsize::from(size);

    unsafe {
        let ret = libc::ioctl(fd.as_raw_fd(), libc::TIOCSWINSZ, &winsize as *const Winsize);
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}

fn set_cloexec(fd: &OwnedFd) -> Result<(), PtyError> {
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
        .map_err(|e| PtyError::AllocationFailed(format!("Failed to set close-on-exec: {}", e)))?;
    Ok(())
}

fn set_nonblocking(fd: &OwnedFd) -> Result<(), PtyError> {
    let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFL)
        .map_err(|e| PtyError::AllocationFailed(format!("Failed to read flags: {}", e)))?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(flags))
        .map_err(|e| PtyError::AllocationFailed(format!("Failed to set non-blocking: {}", e)))?;
    Ok(())
}

fn read_fd(fd: &OwnedFd, buf: &mut [u8]) -> io::Result<usize> {
    Ok(unistd::read(fd.as_raw_fd(), buf)?)
}

fn write_fd(fd: &OwnedFd, buf: &[u8]) -> io::Result<usize> {
    Ok(unistd::write(fd, buf)?)
}
