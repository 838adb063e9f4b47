//! Terminal UI forwarding over a sub-stream.
//!
//! A plugin's operation writes user-facing output through a [`TerminalUi`]
//! handle. When the operation runs on the plugin side of a connection, the
//! adapter allocates a sub-stream id, hands the plugin a
//! [`RemoteTerminal`] that forwards every event over the stream, and the
//! host drains the stream into its real terminal implementation.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

use serde::{Deserialize, Serialize};
use tracing::debug;

use gantry_funcspec::derived_value;

use crate::error::PluginError;
use crate::wire::{Connection, StreamEvent};

/// Tracing target for terminal forwarding.
const TERMINAL_TARGET: &str = "gantry_plugin::terminal";

/// One terminal event crossing the sub-stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TerminalEvent {
    /// A plain output line.
    Line {
        /// The text, without a trailing newline.
        text: String,
    },
    /// A step marker within a long operation.
    Step {
        /// Step description.
        message: String,
    },
    /// A table of name/value pairs.
    NamedValues {
        /// The pairs, in display order.
        values: Vec<(String, String)>,
    },
}

/// User-facing terminal output.
pub trait TerminalUi: Send + Sync {
    /// Writes a plain output line.
    fn output(&self, line: &str);

    /// Marks a step within a long operation.
    fn step(&self, message: &str);

    /// Renders a table of name/value pairs.
    fn named_values(&self, values: &[(String, String)]);
}

/// Shareable terminal handle a plugin operation takes as a parameter.
///
/// Derived, not ambient: the standard converters build it from the
/// advertised terminal stream id, so operations that want a terminal
/// surface that requirement in their funcspec.
#[derive(Clone)]
pub struct UiHandle(pub Arc<dyn TerminalUi>);

impl std::fmt::Debug for UiHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UiHandle")
    }
}

derived_value!(UiHandle);

/// Plugin-side terminal that forwards each event over a sub-stream.
pub struct RemoteTerminal {
    conn: Arc<Connection>,
    stream_id: u64,
}

impl RemoteTerminal {
    /// Creates a forwarding terminal on an allocated stream id.
    #[must_use]
    pub fn new(conn: Arc<Connection>, stream_id: u64) -> Self {
        Self { conn, stream_id }
    }

    /// Returns the stream id the host must dial back on.
    #[must_use]
    pub const fn stream_id(&self) -> u64 {
        self.stream_id
    }

    fn forward(&self, event: &TerminalEvent) {
        // Terminal output is best-effort: a lost line must not fail the
        // operation that produced it.
        if let Err(err) = self.conn.send_stream(self.stream_id, event) {
            debug!(
                target: TERMINAL_TARGET,
                stream_id = self.stream_id,
                error = %err,
                "dropping terminal event"
            );
        }
    }
}

impl TerminalUi for RemoteTerminal {
    fn output(&self, line: &str) {
        self.forward(&TerminalEvent::Line {
            text: line.to_owned(),
        });
    }

    fn step(&self, message: &str) {
        self.forward(&TerminalEvent::Step {
            message: message.to_owned(),
        });
    }

    fn named_values(&self, values: &[(String, String)]) {
        self.forward(&TerminalEvent::NamedValues {
            values: values.to_vec(),
        });
    }
}

/// Host-side pump: drains a terminal sub-stream into a local
/// implementation until the stream closes.
///
/// Returns when the peer closes the stream or the connection drops.
///
/// # Errors
///
/// Returns [`PluginError::Serialization`] when a frame is not a terminal
/// event.
pub fn serve_terminal(
    events: &Receiver<StreamEvent>,
    ui: &dyn TerminalUi,
) -> Result<(), PluginError> {
    loop {
        match events.recv() {
            Ok(StreamEvent::Data(body)) => {
                let event: TerminalEvent =
                    serde_json::from_value(body).map_err(|err| PluginError::Serialization {
                        message: err.to_string(),
                    })?;
                match event {
                    TerminalEvent::Line { text } => ui.output(&text),
                    TerminalEvent::Step { message } => ui.step(&message),
                    TerminalEvent::NamedValues { values } => ui.named_values(&values),
                }
            }
            Ok(StreamEvent::Closed) | Err(_) => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests;
