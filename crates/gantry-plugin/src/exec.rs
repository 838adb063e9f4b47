//! Exec session plumbing over a sub-stream.
//!
//! An exec session is too stateful for one round trip: stdin bytes flow
//! from host to plugin while output and the final exit code flow back. The
//! input side is a three-way multiplex — raw stdin data, window-resize
//! notifications, and an input-closed sentinel. Resize events ride a
//! bounded buffer of capacity two; when the plugin lags, older sizes are
//! dropped on the floor rather than blocking the pump, because only the
//! latest size matters.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::{mpsc, Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PluginError;
use crate::wire::{Connection, StreamEvent};

/// Tracing target for exec forwarding.
const EXEC_TARGET: &str = "gantry_plugin::exec";

/// Window-resize buffer depth; only the latest sizes are interesting.
const WINDOW_BUFFER: usize = 2;

/// Terminal window dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    /// Columns.
    pub width: u32,
    /// Rows.
    pub height: u32,
}

/// Host-to-plugin input frames: the three-way multiplex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum ExecInput {
    /// Raw stdin bytes.
    Data {
        /// The bytes.
        bytes: Vec<u8>,
    },
    /// The user's terminal was resized.
    WindowSize(WindowSize),
    /// Stdin reached end of file; no more data frames follow.
    InputClosed,
}

/// Plugin-to-host output frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "output", rename_all = "snake_case")]
pub enum ExecOutput {
    /// Bytes for the user's stdout.
    Stdout {
        /// The bytes.
        bytes: Vec<u8>,
    },
    /// Bytes for the user's stderr.
    Stderr {
        /// The bytes.
        bytes: Vec<u8>,
    },
    /// The session finished with this exit code.
    Exit {
        /// Process exit code.
        code: i32,
    },
}

/// Reader over the forwarded stdin byte stream.
///
/// Yields chunks until the input-closed sentinel arrives, after which
/// reads return end of file.
pub struct InputReader {
    rx: Mutex<Receiver<Vec<u8>>>,
    buffer: Mutex<VecDeque<u8>>,
}

impl InputReader {
    /// Pulls the next raw chunk, or `None` once input is closed.
    #[must_use]
    pub fn read_chunk(&self) -> Option<Vec<u8>> {
        self.rx.lock().expect("input lock poisoned").recv().ok()
    }
}

impl Read for &InputReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut buffered = self.buffer.lock().expect("buffer lock poisoned");
        if buffered.is_empty() {
            let rx = self.rx.lock().expect("input lock poisoned");
            match rx.recv() {
                Ok(chunk) => buffered.extend(chunk),
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(buffered.len());
        for slot in buf.iter_mut().take(n) {
            *slot = buffered.pop_front().expect("buffered byte present");
        }
        Ok(n)
    }
}

/// Latest-wins window-size events.
#[derive(Clone)]
pub struct WindowEvents {
    queue: Arc<Mutex<VecDeque<WindowSize>>>,
}

impl WindowEvents {
    fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::with_capacity(WINDOW_BUFFER))),
        }
    }

    fn push(&self, size: WindowSize) {
        let mut queue = self.queue.lock().expect("window queue lock poisoned");
        if queue.len() == WINDOW_BUFFER {
            queue.pop_front();
        }
        queue.push_back(size);
    }

    /// Pops the oldest buffered resize, if any.
    #[must_use]
    pub fn try_next(&self) -> Option<WindowSize> {
        self.queue
            .lock()
            .expect("window queue lock poisoned")
            .pop_front()
    }
}

/// Everything a plugin's exec function needs to run a session.
pub struct ExecSessionInfo {
    /// Command and arguments to run.
    pub args: Vec<String>,
    /// Whether the session runs under a pty.
    pub is_pty: bool,
    /// Window size at session start.
    pub initial_window: WindowSize,
    /// Forwarded stdin.
    pub input: InputReader,
    /// Buffered window-resize notifications.
    pub window_events: WindowEvents,
    writer: OutputWriter,
}

impl ExecSessionInfo {
    /// Returns the writer for session output and the final exit code.
    #[must_use]
    pub fn output(&self) -> &OutputWriter {
        &self.writer
    }
}

/// Sends session output frames back to the host.
#[derive(Clone)]
pub struct OutputWriter {
    conn: Arc<Connection>,
    stream_id: u64,
}

impl OutputWriter {
    fn send(&self, output: &ExecOutput) {
        if let Err(err) = self.conn.send_stream(self.stream_id, output) {
            debug!(
                target: EXEC_TARGET,
                stream_id = self.stream_id,
                error = %err,
                "dropping exec output frame"
            );
        }
    }

    /// Forwards stdout bytes.
    pub fn stdout(&self, bytes: &[u8]) {
        self.send(&ExecOutput::Stdout {
            bytes: bytes.to_vec(),
        });
    }

    /// Forwards stderr bytes.
    pub fn stderr(&self, bytes: &[u8]) {
        self.send(&ExecOutput::Stderr {
            bytes: bytes.to_vec(),
        });
    }

    /// Reports the session's exit code and closes the stream.
    pub fn exit(&self, code: i32) {
        self.send(&ExecOutput::Exit { code });
        self.conn.close_stream(self.stream_id);
    }
}

/// Plugin-side session assembly: routes incoming stream frames into the
/// session's input reader and window buffer.
///
/// Spawns one router thread; it exits when the stream closes or the input
/// sentinel arrives and the channel drains.
#[must_use]
pub fn exec_session(
    conn: Arc<Connection>,
    stream_id: u64,
    args: Vec<String>,
    is_pty: bool,
    initial_window: WindowSize,
) -> ExecSessionInfo {
    let events = conn.open_stream(stream_id);
    let (data_tx, data_rx) = mpsc::sync_channel::<Vec<u8>>(64);
    let windows = WindowEvents::new();

    let router_windows = windows.clone();
    std::thread::spawn(move || route_input(&events, &data_tx, &router_windows));

    ExecSessionInfo {
        args,
        is_pty,
        initial_window,
        input: InputReader {
            rx: Mutex::new(data_rx),
            buffer: Mutex::new(VecDeque::new()),
        },
        window_events: windows,
        writer: OutputWriter { conn, stream_id },
    }
}

fn route_input(
    events: &Receiver<StreamEvent>,
    data_tx: &SyncSender<Vec<u8>>,
    windows: &WindowEvents,
) {
    loop {
        let event = match events.recv() {
            Ok(event) => event,
            Err(_) => return,
        };
        match event {
            StreamEvent::Data(body) => match serde_json::from_value::<ExecInput>(body) {
                Ok(ExecInput::Data { bytes }) => match data_tx.try_send(bytes) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => return,
                },
                Ok(ExecInput::WindowSize(size)) => windows.push(size),
                Ok(ExecInput::InputClosed) => {
                    // Dropping the sender is the EOF the reader observes.
                    return;
                }
                Err(err) => {
                    debug!(target: EXEC_TARGET, error = %err, "invalid exec input frame");
                }
            },
            StreamEvent::Closed => return,
        }
    }
}

/// Host-side driver: pumps stdin and resize events to the plugin and
/// collects output until the exit frame.
///
/// Returns the session's exit code.
///
/// # Errors
///
/// Returns [`PluginError::ConnectionClosed`] when the stream dies before
/// an exit frame arrives.
pub fn drive_exec(
    conn: &Connection,
    stream_id: u64,
    events: &Receiver<StreamEvent>,
    mut stdin: impl Read,
    mut on_stdout: impl FnMut(&[u8]),
    mut on_stderr: impl FnMut(&[u8]),
) -> Result<i32, PluginError> {
    // Forward stdin in the foreground: exec sessions are interactive and
    // the caller owns the thread.
    let mut buf = [0_u8; 4096];
    loop {
        match stdin.read(&mut buf) {
            Ok(0) => {
                conn.send_stream(stream_id, &ExecInput::InputClosed)?;
                break;
            }
            Ok(n) => {
                conn.send_stream(
                    stream_id,
                    &ExecInput::Data {
                        bytes: buf[..n].to_vec(),
                    },
                )?;
            }
            Err(err) => {
                debug!(target: EXEC_TARGET, error = %err, "stdin read failed, closing input");
                conn.send_stream(stream_id, &ExecInput::InputClosed)?;
                break;
            }
        }
    }

    loop {
        match events.recv() {
            Ok(StreamEvent::Data(body)) => {
                match serde_json::from_value::<ExecOutput>(body) {
                    Ok(ExecOutput::Stdout { bytes }) => on_stdout(&bytes),
                    Ok(ExecOutput::Stderr { bytes }) => on_stderr(&bytes),
                    Ok(ExecOutput::Exit { code }) => return Ok(code),
                    Err(err) => {
                        debug!(target: EXEC_TARGET, error = %err, "invalid exec output frame");
                    }
                }
            }
            Ok(StreamEvent::Closed) | Err(_) => return Err(PluginError::ConnectionClosed),
        }
    }
}
