//! Errors raised by the plugin adapters and the wire layer.

use std::sync::Arc;

use thiserror::Error;

use gantry_funcspec::FuncError;
use gantry_proto::EnvelopeError;

use crate::wire::{ErrorCode, WireError};

/// Errors arising from plugin connections and component calls.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The peer's handshake did not match ours.
    #[error("handshake mismatch: {message}")]
    Handshake {
        /// Why the handshake was rejected.
        message: String,
    },

    /// The connection closed while a call was outstanding.
    #[error("connection closed")]
    ConnectionClosed,

    /// A frame could not be serialized or parsed.
    #[error("wire serialization failed: {message}")]
    Serialization {
        /// Description of the malformed frame.
        message: String,
    },

    /// An I/O error on the underlying transport.
    #[error("transport I/O error")]
    Io(#[source] Arc<std::io::Error>),

    /// The probed service or capability is not provided by this plugin.
    ///
    /// Probe calls treat this as a `false` answer, never as a failure, so
    /// plugins built against older revisions keep interoperating.
    #[error("not implemented: {message}")]
    Unimplemented {
        /// Which service, method, or capability was missing.
        message: String,
    },

    /// The remote side reported an error for a call.
    #[error("remote error ({code}): {message}")]
    Remote {
        /// Remote error category.
        code: ErrorCode,
        /// Human-readable message from the remote side.
        message: String,
    },

    /// The call was cancelled before it completed.
    #[error("call cancelled")]
    Cancelled,

    /// The funcspec engine rejected the call.
    #[error(transparent)]
    Func(#[from] FuncError),

    /// A value could not be encoded into or decoded from an envelope.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// A request or response body had an unexpected shape.
    #[error("invalid call body for {method}: {message}")]
    InvalidBody {
        /// The method whose body was malformed.
        method: String,
        /// Description of the problem.
        message: String,
    },
}

impl PluginError {
    /// Renders this error as a wire error envelope.
    #[must_use]
    pub fn to_wire(&self) -> WireError {
        let code = match self {
            Self::Unimplemented { .. } => ErrorCode::Unimplemented,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::InvalidBody { .. } | Self::Serialization { .. } => ErrorCode::InvalidArgument,
            Self::Func(FuncError::UnknownType { .. }) => ErrorCode::FailedPrecondition,
            Self::Remote { code, .. } => *code,
            _ => ErrorCode::Internal,
        };
        WireError {
            code,
            message: self.to_string(),
        }
    }

    /// Reconstructs an error from a wire error envelope.
    #[must_use]
    pub fn from_wire(err: WireError) -> Self {
        match err.code {
            ErrorCode::Unimplemented => Self::Unimplemented {
                message: err.message,
            },
            ErrorCode::Cancelled => Self::Cancelled,
            code => Self::Remote {
                code,
                message: err.message,
            },
        }
    }

    /// True when this error is the absent-capability signal.
    #[must_use]
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, Self::Unimplemented { .. })
    }
}
