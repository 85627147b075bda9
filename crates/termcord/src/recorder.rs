//! End-to-end recording of one command
//!
//! A [`Recorder`] runs the command on a fresh PTY, relays the controlling
//! terminal's input to it and copies everything it prints to the configured
//! sinks until the child exits.

use crate::cli;
use crate::config::{RecordingConfig, ENV_VAR};
use crate::error::RecordError;
use crate::resize::ResizeForwarder;
use crate::sink::{copy_into, Destination, FanOut, RecordingFile, SharedSink, Sink, Source};
use crate::terminal::TerminalGuard;
use std::io;
use std::os::unix::io::OwnedFd;
use std::sync::Arc;
use termcord_pty::{ExitOutcome, PtyReader, PtySession, SessionBuilder};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const START_PROMPT: &str = "Starting recording session. CTRL-D to end.\n";

/// Lifecycle of a recording. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum SessionState {
    Configured,
    PtyAllocated,
    ModeAndSignalsArmed,
    Streaming,
    Draining,
    Completed,
    Failed,
}

/// One recording session and the collaborators it talks to.
///
/// Without explicit sinks the recorder opens the configured recording file and
/// mirrors output to it and to the terminal output (standard output unless
/// overridden). Explicit sinks replace that default and are only borrowed.
pub struct Recorder<'a> {
    config: RecordingConfig,
    sinks: Vec<Sink<'a>>,
    input_sinks: Vec<Sink<'a>>,
    terminal_output: Option<Sink<'a>>,
    input: Option<Source<'a>>,
    terminal: Option<OwnedFd>,
}

impl<'a> Recorder<'a> {
    pub fn new(config: RecordingConfig) -> Self {
        Self {
            config,
            sinks: Vec::new(),
            input_sinks: Vec::new(),
            terminal_output: None,
            input: None,
            terminal: None,
        }
    }

    /// Add an output sink. Any explicit sink disables the default recording file.
    pub fn sink(mut self, sink: impl AsyncWrite + Send + Unpin + 'a) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Add a keystroke sink, used when input logging is enabled
    pub fn input_sink(mut self, sink: impl AsyncWrite + Send + Unpin + 'a) -> Self {
        self.input_sinks.push(Box::new(sink));
        self
    }

    /// Replace standard output as the terminal side of the default destination
    pub fn terminal_output(mut self, output: impl AsyncWrite + Send + Unpin + 'a) -> Self {
        self.terminal_output = Some(Box::new(output));
        self
    }

    /// Replace standard input as the source of keystrokes
    pub fn input(mut self, input: impl AsyncRead + Send + Unpin + 'a) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    /// Terminal whose mode and size an interactive session controls
    pub fn terminal(mut self, terminal: OwnedFd) -> Self {
        self.terminal = Some(terminal);
        self
    }

    /// Run the recording to completion and report how the child exited.
    pub async fn start(self) -> Result<ExitOutcome, RecordError> {
        let Recorder {
            config,
            sinks,
            input_sinks,
            terminal_output,
            input,
            terminal,
        } = self;

        let terminal_output: SharedSink<'a> = Arc::new(Mutex::new(
            terminal_output.unwrap_or_else(|| Box::new(tokio::io::stdout())),
        ));

        if config.help {
            let primary = match sinks.into_iter().next() {
                Some(sink) => Arc::new(Mutex::new(sink)),
                None => terminal_output,
            };
            write_to(&primary, cli::usage().as_bytes()).await?;
            return Ok(ExitOutcome::Success);
        }

        // Terminal control only applies to the real standard input or an explicit terminal
        let terminal = match (config.interactive, terminal) {
            (false, _) => None,
            (true, Some(fd)) => Some(TerminalGuard::acquire(fd)),
            (true, None) if input.is_some() => {
                debug!("Input overridden without a terminal, skipping mode and resize handling");
                None
            }
            (true, None) => Some(TerminalGuard::stdin()?),
        };

        let owns_file = sinks.is_empty();
        if owns_file && !config.quiet {
            write_to(&terminal_output, START_PROMPT.as_bytes()).await?;
        }

        let initial_size = terminal.as_ref().and_then(|t| match t.window_size() {
            Ok(size) => Some(size),
            Err(e) => {
                warn!("Failed to get terminal size: {}", e);
                None
            }
        });

        let pty = SessionBuilder::new(&config.command)
            .args(&config.args)
            .env(ENV_VAR, config.command_line())
            .size(initial_size)
            .spawn()?;
        info!(command = %config.command_line(), pid = ?pty.pid(), "Recording session started");

        let mut session = ActiveSession {
            pty,
            terminal,
            resize: None,
            recording: None,
            state: SessionState::Configured,
        };
        session.advance(SessionState::PtyAllocated);

        let streams = Streams {
            sinks,
            input_sinks,
            terminal_output: terminal_output.clone(),
            input: input.unwrap_or_else(|| Box::new(tokio::io::stdin())),
        };
        let result = session.run(&config, streams).await;
        let result = session.teardown(result).await;

        if owns_file && !config.quiet {
            let prompt = format!(
                "\nRecording session ended. Session saved to {}\n",
                config.filename.display()
            );
            if let Err(e) = write_to(&terminal_output, prompt.as_bytes()).await {
                warn!("Failed to write end prompt: {}", e);
            }
        }

        match &result {
            Ok(outcome) => info!(?outcome, "Recording session finished"),
            Err(e) => warn!("Recording session failed: {}", e),
        }
        result
    }
}

/// Caller-supplied streams handed to the running session
struct Streams<'a> {
    sinks: Vec<Sink<'a>>,
    input_sinks: Vec<Sink<'a>>,
    terminal_output: SharedSink<'a>,
    input: Source<'a>,
}

/// Resources held between PTY allocation and teardown
struct ActiveSession<'a> {
    pty: PtySession,
    terminal: Option<TerminalGuard>,
    resize: Option<ResizeForwarder>,
    recording: Option<RecordingFile<'a>>,
    state: SessionState,
}

impl<'a> ActiveSession<'a> {
    fn advance(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "Session state");
        self.state = next;
    }

    async fn run(
        &mut self,
        config: &RecordingConfig,
        streams: Streams<'a>,
    ) -> Result<ExitOutcome, RecordError> {
        let Streams {
            sinks,
            input_sinks,
            terminal_output,
            mut input,
        } = streams;

        if let Some(terminal) = self.terminal.as_mut() {
            terminal.enable_raw_mode()?;
            let fd = terminal.try_clone_fd()?;
            self.resize = Some(ResizeForwarder::spawn(fd, self.pty.resizer()));
            self.advance(SessionState::ModeAndSignalsArmed);
        }

        // The PTY always comes first among the input destinations
        let mut input_fanout = FanOut::new().with(Destination::owned(self.pty.writer()?));
        let mut output = FanOut::new();

        if sinks.is_empty() {
            let file = RecordingFile::open(&config.filename, config.append).await?;
            output.push(Destination::Shared(terminal_output));
            output.push(file.destination());
            if config.log_input {
                input_fanout.push(file.destination());
            }
            self.recording = Some(file);
        } else {
            for sink in sinks {
                output.push(Destination::Owned(sink));
            }
            if config.log_input {
                for sink in input_sinks {
                    input_fanout.push(Destination::Owned(sink));
                }
            }
        }

        self.advance(SessionState::Streaming);
        let mut reader = self.pty.reader()?;
        let copied = stream(
            &self.pty,
            &mut reader,
            &mut output,
            &mut input,
            &mut input_fanout,
        )
        .await
        .map_err(RecordError::Stream)?;
        debug!(bytes = copied, "Output reached end-of-stream");
        drop(reader);

        self.advance(SessionState::Draining);
        let outcome = self.pty.wait().await?;

        output.finish().map_err(RecordError::Stream)?;
        input_fanout.finish().map_err(RecordError::Stream)?;
        Ok(outcome)
    }

    /// Release everything acquired so far. Runs on every path out of a session.
    async fn teardown(
        &mut self,
        result: Result<ExitOutcome, RecordError>,
    ) -> Result<ExitOutcome, RecordError> {
        if let Some(forwarder) = self.resize.take() {
            forwarder.stop().await;
        }

        if let Some(mut terminal) = self.terminal.take() {
            if let Err(e) = terminal.restore() {
                warn!("Failed to restore terminal mode: {}", e);
            }
        }

        // Still running means setup or streaming broke off early
        if self.pty.pid().is_some() {
            debug!("Terminating child after failed session");
            self.pty.terminate().await;
        }
        self.pty.close();

        let mut result = result;
        if let Some(file) = self.recording.take() {
            if let Err(e) = file.close().await {
                warn!("Failed to close recording file: {}", e);
                result = result.and(Err(RecordError::Io(e)));
            }
        }

        self.advance(match result {
            Ok(_) => SessionState::Completed,
            Err(_) => SessionState::Failed,
        });
        result
    }
}

/// Copy PTY output to `output` while relaying `input` to `input_fanout`.
///
/// Returns once the PTY reaches end-of-stream; an unfinished input copy is
/// dropped at that point.
async fn stream(
    pty: &PtySession,
    reader: &mut PtyReader,
    output: &mut FanOut<'_>,
    input: &mut Source<'_>,
    input_fanout: &mut FanOut<'_>,
) -> io::Result<u64> {
    let output_copy = copy_into(reader, output);
    tokio::pin!(output_copy);

    let input_copy = async {
        let copied = copy_into(input, input_fanout).await;
        if copied.is_ok() {
            match pty.send_eof().await {
                Ok(sent) => debug!(sent, "Input reached end-of-stream"),
                Err(e) => debug!("Could not forward end of input: {}", e),
            }
        }
        copied
    };
    tokio::pin!(input_copy);

    let mut input_open = true;
    loop {
        tokio::select! {
            copied = &mut output_copy => return copied,
            copied = &mut input_copy, if input_open => {
                input_open = false;
                if let Err(e) = copied {
                    warn!("Input copy stopped: {}", e);
                }
            }
        }
    }
}

async fn write_to(sink: &SharedSink<'_>, buf: &[u8]) -> io::Result<()> {
    let mut sink = sink.lock().await;
    sink.write_all(buf).await?;
    sink.flush().await
}
