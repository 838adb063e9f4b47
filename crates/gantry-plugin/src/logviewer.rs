//! Log-viewer plumbing over a sub-stream.
//!
//! A log platform streams batches of log events back to the host for as
//! long as the viewer is open. The plugin side pushes batches through a
//! [`LogBatchWriter`]; the host side pulls them with [`LogViewerClient`].

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use gantry_funcspec::derived_value;

use crate::error::PluginError;
use crate::wire::{Connection, StreamEvent};

/// Tracing target for log forwarding.
const LOGS_TARGET: &str = "gantry_plugin::logviewer";

/// One application log event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Source partition (instance id, pod name).
    pub partition: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_millis: u64,
    /// The log line.
    pub message: String,
}

/// A batch of log events crossing the sub-stream together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBatch {
    /// Events in arrival order.
    pub events: Vec<LogEvent>,
}

/// Plugin-side writer pushing batches to the host.
///
/// Derived, not ambient: the standard converters build it from the
/// advertised log stream id.
#[derive(Clone)]
pub struct LogBatchWriter {
    conn: Arc<Connection>,
    stream_id: u64,
}

impl std::fmt::Debug for LogBatchWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBatchWriter")
            .field("stream_id", &self.stream_id)
            .finish_non_exhaustive()
    }
}

derived_value!(LogBatchWriter);

impl LogBatchWriter {
    /// Creates a writer on an allocated stream id.
    #[must_use]
    pub fn new(conn: Arc<Connection>, stream_id: u64) -> Self {
        Self { conn, stream_id }
    }

    /// Returns the stream id the host must dial back on.
    #[must_use]
    pub const fn stream_id(&self) -> u64 {
        self.stream_id
    }

    /// Sends one batch. Best-effort: failures are logged, not fatal to the
    /// producing operation.
    pub fn send(&self, batch: &LogBatch) {
        if let Err(err) = self.conn.send_stream(self.stream_id, batch) {
            debug!(
                target: LOGS_TARGET,
                stream_id = self.stream_id,
                error = %err,
                "dropping log batch"
            );
        }
    }

    /// Closes the stream, ending the viewer session.
    pub fn close(&self) {
        self.conn.close_stream(self.stream_id);
    }
}

/// Host-side consumer of a log sub-stream.
pub struct LogViewerClient {
    events: Receiver<StreamEvent>,
}

impl LogViewerClient {
    /// Wraps an opened stream receiver.
    #[must_use]
    pub fn new(events: Receiver<StreamEvent>) -> Self {
        Self { events }
    }

    /// Blocks for the next batch; `None` when the plugin closed the
    /// stream.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Serialization`] when a frame is not a log
    /// batch.
    pub fn next_batch(&self) -> Result<Option<LogBatch>, PluginError> {
        match self.events.recv() {
            Ok(StreamEvent::Data(body)) => {
                let batch: LogBatch =
                    serde_json::from_value(body).map_err(|err| PluginError::Serialization {
                        message: err.to_string(),
                    })?;
                Ok(Some(batch))
            }
            Ok(StreamEvent::Closed) | Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests;
