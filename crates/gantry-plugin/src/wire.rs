//! The duplex frame protocol between host and plugin.
//!
//! Every frame is one serde-serialized message; the out-of-process
//! transport writes one JSON frame per line over the child's stdio, the
//! in-process transport moves frames over bounded channels. A
//! [`Connection`] multiplexes request/response calls, per-call
//! cancellation, and broker-allocated sub-streams over a single transport,
//! with a background pump thread routing incoming frames.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, warn};

use gantry_proto::Handshake;

use crate::args::CancelToken;
use crate::broker::Broker;
use crate::error::PluginError;

/// Tracing target for wire-level activity.
const WIRE_TARGET: &str = "gantry_plugin::wire";

/// Bound for per-call response and sub-stream channels.
const CHANNEL_CAPACITY: usize = 64;

/// Category carried by a wire error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    /// The method or capability does not exist on this plugin.
    Unimplemented,
    /// The call body was malformed.
    InvalidArgument,
    /// A precondition (such as a registered type) was missing.
    FailedPrecondition,
    /// The call was cancelled.
    Cancelled,
    /// Any other failure.
    Internal,
}

/// Error envelope carried in a response frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    /// Error category for programmatic handling.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// One protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    /// Connection handshake, exchanged once per side before anything else.
    Hello(Handshake),
    /// A call from one side to a service on the other.
    Request {
        /// Caller-allocated call id, unique per connection side.
        id: u64,
        /// Target service (one per component kind, plus "mapper").
        service: String,
        /// Method on the service.
        method: String,
        /// Method-specific body.
        body: serde_json::Value,
    },
    /// Successful response to a request.
    Response {
        /// Call id this responds to.
        id: u64,
        /// Method-specific body.
        body: serde_json::Value,
    },
    /// Failed response to a request.
    Error {
        /// Call id this responds to.
        id: u64,
        /// The failure.
        error: WireError,
    },
    /// Cooperative cancellation of an in-flight request.
    Cancel {
        /// Call id to cancel.
        id: u64,
    },
    /// Payload on a broker-allocated sub-stream.
    StreamData {
        /// Broker stream id.
        stream_id: u64,
        /// Stream-specific payload.
        body: serde_json::Value,
    },
    /// Clean close of a sub-stream.
    StreamClose {
        /// Broker stream id.
        stream_id: u64,
    },
}

/// A byte-level frame carrier.
pub trait Transport: Send + Sync {
    /// Sends one frame.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::ConnectionClosed`] when the peer is gone.
    fn send(&self, frame: &Frame) -> Result<(), PluginError>;

    /// Receives the next frame; `None` means the peer closed cleanly.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Io`] for transport failures.
    fn recv(&self) -> Result<Option<Frame>, PluginError>;
}

/// In-process transport: a pair of bounded frame channels.
///
/// Used for same-process plugin hosting and throughout the test suites.
pub struct PipeTransport {
    tx: SyncSender<Frame>,
    rx: Mutex<Receiver<Frame>>,
}

impl PipeTransport {
    /// Creates a connected transport pair.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::sync_channel(CHANNEL_CAPACITY);
        let (tx_b, rx_b) = mpsc::sync_channel(CHANNEL_CAPACITY);
        (
            Self {
                tx: tx_a,
                rx: Mutex::new(rx_b),
            },
            Self {
                tx: tx_b,
                rx: Mutex::new(rx_a),
            },
        )
    }
}

impl Transport for PipeTransport {
    fn send(&self, frame: &Frame) -> Result<(), PluginError> {
        self.tx
            .send(frame.clone())
            .map_err(|_| PluginError::ConnectionClosed)
    }

    fn recv(&self) -> Result<Option<Frame>, PluginError> {
        let rx = self.rx.lock().expect("pipe receiver lock poisoned");
        match rx.recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(_) => Ok(None),
        }
    }
}

/// Out-of-process transport: one JSON frame per line over a reader/writer
/// pair, typically a child process's stdio.
pub struct JsonlTransport<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,
}

impl<R: BufRead + Send, W: Write + Send> JsonlTransport<R, W> {
    /// Wraps a reader/writer pair.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> Transport for JsonlTransport<R, W> {
    fn send(&self, frame: &Frame) -> Result<(), PluginError> {
        let json = serde_json::to_string(frame).map_err(|err| PluginError::Serialization {
            message: err.to_string(),
        })?;
        let mut writer = self.writer.lock().expect("writer lock poisoned");
        writer
            .write_all(json.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush())
            .map_err(|err| PluginError::Io(Arc::new(err)))
    }

    fn recv(&self) -> Result<Option<Frame>, PluginError> {
        let mut line = String::new();
        let bytes = {
            let mut reader = self.reader.lock().expect("reader lock poisoned");
            reader
                .read_line(&mut line)
                .map_err(|err| PluginError::Io(Arc::new(err)))?
        };
        if bytes == 0 {
            return Ok(None);
        }
        let frame =
            serde_json::from_str(line.trim()).map_err(|err| PluginError::Serialization {
                message: err.to_string(),
            })?;
        Ok(Some(frame))
    }
}

/// A service reachable over a connection.
pub trait Service: Send + Sync {
    /// Handles one method call.
    ///
    /// # Errors
    ///
    /// Any [`PluginError`]; it is rendered into a wire error envelope for
    /// the caller.
    fn handle(
        &self,
        method: &str,
        body: serde_json::Value,
        ctx: &CallContext,
    ) -> Result<serde_json::Value, PluginError>;
}

/// Per-call context handed to service handlers.
pub struct CallContext {
    /// Cancellation handle fired by a `Cancel` frame for this call.
    pub cancel: CancelToken,
    /// The connection the call arrived on, for sub-stream work.
    pub conn: Arc<Connection>,
}

type PendingMap = Mutex<HashMap<u64, SyncSender<Result<serde_json::Value, WireError>>>>;

/// A duplex connection multiplexing calls and sub-streams.
pub struct Connection {
    transport: Arc<dyn Transport>,
    services: Mutex<HashMap<String, Arc<dyn Service>>>,
    pending: PendingMap,
    streams: Mutex<HashMap<u64, SyncSender<StreamEvent>>>,
    cancels: Mutex<HashMap<u64, CancelToken>>,
    next_call_id: AtomicU64,
    broker: Broker,
    shutdown: CancelToken,
}

/// An event observed on a sub-stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A payload frame.
    Data(serde_json::Value),
    /// The peer closed the stream.
    Closed,
}

impl Connection {
    /// Creates a connection over a transport. Call
    /// [`Connection::handshake`] and then [`Connection::start`] before
    /// using it.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            services: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            streams: Mutex::new(HashMap::new()),
            cancels: Mutex::new(HashMap::new()),
            next_call_id: AtomicU64::new(1),
            broker: Broker::new(),
            shutdown: CancelToken::new(),
        })
    }

    /// Returns the broker allocating sub-stream ids for this connection.
    #[must_use]
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Registers a service for incoming requests.
    pub fn register_service(&self, name: impl Into<String>, service: Arc<dyn Service>) {
        self.services
            .lock()
            .expect("services lock poisoned")
            .insert(name.into(), service);
    }

    /// Exchanges and validates handshakes with the peer.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Handshake`] on a magic-cookie or protocol
    /// version mismatch, and transport errors when the peer is gone.
    pub fn handshake(&self) -> Result<(), PluginError> {
        self.transport.send(&Frame::Hello(Handshake::current()))?;
        match self.transport.recv()? {
            Some(Frame::Hello(theirs)) => {
                if Handshake::current().matches(&theirs) {
                    Ok(())
                } else {
                    Err(PluginError::Handshake {
                        message: format!(
                            "peer speaks protocol {} with a different cookie",
                            theirs.protocol_version
                        ),
                    })
                }
            }
            Some(other) => Err(PluginError::Handshake {
                message: format!("expected hello frame, got {other:?}"),
            }),
            None => Err(PluginError::ConnectionClosed),
        }
    }

    /// Starts the background pump routing incoming frames. Returns the
    /// pump's join handle; the pump exits when the transport closes or the
    /// connection is shut down.
    pub fn start(self: &Arc<Self>) -> std::thread::JoinHandle<()> {
        let conn = Arc::clone(self);
        std::thread::spawn(move || conn.pump())
    }

    fn pump(self: &Arc<Self>) {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            let frame = match self.transport.recv() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!(target: WIRE_TARGET, "transport closed, pump exiting");
                    break;
                }
                Err(err) => {
                    warn!(target: WIRE_TARGET, error = %err, "transport error, pump exiting");
                    break;
                }
            };
            self.route(frame);
        }
        self.fail_pending();
    }

    fn route(self: &Arc<Self>, frame: Frame) {
        if self.shutdown.is_cancelled() {
            if let Frame::Request { id, .. } = frame {
                self.respond_err(id, &PluginError::ConnectionClosed);
            }
            return;
        }
        match frame {
            Frame::Hello(_) => {
                warn!(target: WIRE_TARGET, "unexpected hello after handshake, ignoring");
            }
            Frame::Request {
                id,
                service,
                method,
                body,
            } => self.handle_request(id, &service, &method, body),
            Frame::Response { id, body } => self.complete(id, Ok(body)),
            Frame::Error { id, error } => self.complete(id, Err(error)),
            Frame::Cancel { id } => {
                if let Some(token) = self.cancels.lock().expect("cancels lock poisoned").get(&id)
                {
                    token.cancel();
                }
            }
            Frame::StreamData { stream_id, body } => {
                self.stream_event(stream_id, StreamEvent::Data(body));
            }
            Frame::StreamClose { stream_id } => {
                self.stream_event(stream_id, StreamEvent::Closed);
                self.streams
                    .lock()
                    .expect("streams lock poisoned")
                    .remove(&stream_id);
            }
        }
    }

    fn handle_request(
        self: &Arc<Self>,
        id: u64,
        service_name: &str,
        method: &str,
        body: serde_json::Value,
    ) {
        let service = self
            .services
            .lock()
            .expect("services lock poisoned")
            .get(service_name)
            .cloned();

        let Some(service) = service else {
            let err = PluginError::Unimplemented {
                message: format!("service '{service_name}' is not served here"),
            };
            self.respond_err(id, &err);
            return;
        };

        let cancel = CancelToken::new();
        self.cancels
            .lock()
            .expect("cancels lock poisoned")
            .insert(id, cancel.clone());

        let conn = Arc::clone(self);
        let method = method.to_owned();
        // One worker per in-flight request: requests stay logically
        // single-tasked while stream frames keep flowing through the pump.
        std::thread::spawn(move || {
            let ctx = CallContext {
                cancel,
                conn: Arc::clone(&conn),
            };
            let result = service.handle(&method, body, &ctx);
            conn.cancels
                .lock()
                .expect("cancels lock poisoned")
                .remove(&id);
            match result {
                Ok(body) => {
                    if let Err(err) = conn.transport.send(&Frame::Response { id, body }) {
                        warn!(target: WIRE_TARGET, error = %err, "failed to send response");
                    }
                }
                Err(err) => conn.respond_err(id, &err),
            }
        });
    }

    fn respond_err(&self, id: u64, err: &PluginError) {
        let frame = Frame::Error {
            id,
            error: err.to_wire(),
        };
        if let Err(send_err) = self.transport.send(&frame) {
            warn!(target: WIRE_TARGET, error = %send_err, "failed to send error response");
        }
    }

    fn complete(&self, id: u64, result: Result<serde_json::Value, WireError>) {
        let sender = self
            .pending
            .lock()
            .expect("pending lock poisoned")
            .remove(&id);
        if let Some(sender) = sender {
            drop(sender.try_send(result));
        } else {
            debug!(target: WIRE_TARGET, id, "response for unknown call, dropping");
        }
    }

    fn stream_event(&self, stream_id: u64, event: StreamEvent) {
        let sender = self
            .streams
            .lock()
            .expect("streams lock poisoned")
            .get(&stream_id)
            .cloned();
        let Some(sender) = sender else {
            debug!(target: WIRE_TARGET, stream_id, "frame for unknown stream, dropping");
            return;
        };
        // Bounded channel: drop rather than block the pump when the
        // consumer is hopelessly behind.
        if let Err(TrySendError::Full(_)) = sender.try_send(event) {
            warn!(target: WIRE_TARGET, stream_id, "stream consumer lagging, dropping frame");
        }
    }

    fn fail_pending(&self) {
        let mut pending = self.pending.lock().expect("pending lock poisoned");
        for (_, sender) in pending.drain() {
            drop(sender.try_send(Err(WireError {
                code: ErrorCode::Internal,
                message: String::from("connection closed"),
            })));
        }
        let mut streams = self.streams.lock().expect("streams lock poisoned");
        for (_, sender) in streams.drain() {
            drop(sender.try_send(StreamEvent::Closed));
        }
    }

    /// Performs a blocking call against a service on the peer.
    ///
    /// # Errors
    ///
    /// [`PluginError::ConnectionClosed`] when the peer goes away,
    /// [`PluginError::Cancelled`] when `cancel` fires first, or the peer's
    /// error mapped through [`PluginError::from_wire`].
    pub fn call(
        &self,
        service: &str,
        method: &str,
        body: serde_json::Value,
        cancel: &CancelToken,
    ) -> Result<serde_json::Value, PluginError> {
        let id = self.next_call_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::sync_channel(1);
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .insert(id, tx);

        self.transport.send(&Frame::Request {
            id,
            service: service.to_owned(),
            method: method.to_owned(),
            body,
        })?;

        loop {
            match rx.recv_timeout(Duration::from_millis(50)) {
                Ok(Ok(body)) => return Ok(body),
                Ok(Err(wire_err)) => return Err(PluginError::from_wire(wire_err)),
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled() {
                        drop(self.transport.send(&Frame::Cancel { id }));
                        self.pending
                            .lock()
                            .expect("pending lock poisoned")
                            .remove(&id);
                        return Err(PluginError::Cancelled);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(PluginError::ConnectionClosed),
            }
        }
    }

    /// Registers a receiver for a sub-stream id and returns its event
    /// channel.
    #[must_use]
    pub fn open_stream(&self, stream_id: u64) -> Receiver<StreamEvent> {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
        self.streams
            .lock()
            .expect("streams lock poisoned")
            .insert(stream_id, tx);
        rx
    }

    /// Sends a payload on a sub-stream.
    ///
    /// # Errors
    ///
    /// Serialization failures and [`PluginError::ConnectionClosed`].
    pub fn send_stream<T: Serialize>(&self, stream_id: u64, payload: &T) -> Result<(), PluginError> {
        let body = serde_json::to_value(payload).map_err(|err| PluginError::Serialization {
            message: err.to_string(),
        })?;
        self.transport.send(&Frame::StreamData { stream_id, body })
    }

    /// Closes a sub-stream cleanly.
    pub fn close_stream(&self, stream_id: u64) {
        self.streams
            .lock()
            .expect("streams lock poisoned")
            .remove(&stream_id);
        drop(self.transport.send(&Frame::StreamClose { stream_id }));
    }

    /// Shuts the connection down; in-flight calls fail with a closed
    /// error.
    pub fn close(&self) {
        self.shutdown.cancel();
        self.fail_pending();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("pending", &self.pending.lock().expect("pending lock").len())
            .field("streams", &self.streams.lock().expect("streams lock").len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
