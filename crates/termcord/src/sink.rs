//! Recording destinations and the copy loop feeding them

use crate::error::RecordError;
use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Size of the buffer used by [`copy_into`]
pub const COPY_BUFFER_SIZE: usize = 4096;

/// Weekday, day, month, year, time and zone, as in `Mon, 02 Jan 2006 15:04:05 UTC`
const TIMESTAMP_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %Z";

/// Any byte-stream destination
pub type Sink<'a> = Box<dyn AsyncWrite + Send + Unpin + 'a>;

/// Any byte-stream source
pub type Source<'a> = Box<dyn AsyncRead + Send + Unpin + 'a>;

/// A destination written from more than one stream
pub type SharedSink<'a> = Arc<Mutex<Sink<'a>>>;

pub enum Destination<'a> {
    Owned(Sink<'a>),
    Shared(SharedSink<'a>),
}

impl<'a> Destination<'a> {
    pub fn owned(sink: impl AsyncWrite + Send + Unpin + 'a) -> Self {
        Destination::Owned(Box::new(sink))
    }

    async fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Destination::Owned(sink) => {
                sink.write_all(buf).await?;
                sink.flush().await
            }
            Destination::Shared(sink) => {
                let mut sink = sink.lock().await;
                sink.write_all(buf).await?;
                sink.flush().await
            }
        }
    }
}

struct Slot<'a> {
    destination: Destination<'a>,
    failed: bool,
}

/// One logical writer replicating every chunk to an ordered list of destinations.
///
/// A destination that fails is dropped from further writes while the others
/// keep receiving data; the first error is kept for [`finish`](FanOut::finish).
pub struct FanOut<'a> {
    slots: Vec<Slot<'a>>,
    first_error: Option<io::Error>,
}

impl<'a> FanOut<'a> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            first_error: None,
        }
    }

    pub fn push(&mut self, destination: Destination<'a>) {
        self.slots.push(Slot {
            destination,
            failed: false,
        });
    }

    pub fn with(mut self, destination: Destination<'a>) -> Self {
        self.push(destination);
        self
    }

    /// Destinations that have not failed yet
    pub fn healthy(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.failed).count()
    }

    /// Write `buf` to every healthy destination, in order.
    pub async fn write_chunk(&mut self, buf: &[u8]) -> usize {
        let mut delivered = 0;

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.failed {
                continue;
            }
            match slot.destination.write_chunk(buf).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(destination = index, "Sink write failed, dropping it: {}", e);
                    slot.failed = true;
                    self.first_error.get_or_insert(e);
                }
            }
        }

        delivered
    }

    /// The first write error seen, if any
    pub fn finish(self) -> io::Result<()> {
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for FanOut<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy `reader` into `fanout` until end-of-stream.
///
/// Only read errors end the copy early; write errors stay inside the fan-out.
pub async fn copy_into<R>(reader: &mut R, fanout: &mut FanOut<'_>) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        fanout.write_chunk(&buffer[..n]).await;
        total += n as u64;
    }

    Ok(total)
}

/// The recording file opened by the recorder itself
pub struct RecordingFile<'a> {
    sink: SharedSink<'a>,
}

impl<'a> RecordingFile<'a> {
    /// Create or open `path`, truncating unless `append`, and write the header line
    pub async fn open(path: &Path, append: bool) -> Result<RecordingFile<'a>, RecordError> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).mode(0o644);
        if append {
            options.append(true);
        } else {
            options.truncate(true);
        }

        let mut file = options
            .open(path)
            .await
            .map_err(|source| RecordError::SinkOpen {
                path: path.to_path_buf(),
                source,
            })?;

        let header = format!("Recording started on {}\n", format_timestamp(&Local::now()));
        file.write_all(header.as_bytes()).await?;
        debug!(path = %path.display(), append, "Recording file opened");

        let sink: Sink<'a> = Box::new(file);
        Ok(Self {
            sink: Arc::new(Mutex::new(sink)),
        })
    }

    /// A destination writing into this file
    pub fn destination(&self) -> Destination<'a> {
        Destination::Shared(self.sink.clone())
    }

    /// Write the footer line and flush everything to disk
    pub async fn close(self) -> io::Result<()> {
        let mut sink = self.sink.lock().await;
        let footer = format!("Recording ended on {}\n", format_timestamp(&Local::now()));
        sink.write_all(footer.as_bytes()).await?;
        sink.flush().await?;
        sink.shutdown().await
    }
}

fn format_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}
