//! Errors raised by the funcspec engine and the mapper solver.

use gantry_proto::{EnvelopeError, PrimitiveKind};
use thiserror::Error;

/// Errors from spec derivation, argument solving, and dynamic invocation.
#[derive(Debug, Error)]
pub enum FuncError {
    /// The solver could not cover a required parameter slot.
    #[error("no value available for required argument {slot}")]
    Unsatisfied {
        /// Description of the uncovered slot.
        slot: String,
    },

    /// A spec could not be derived for the function.
    #[error("cannot derive a spec for '{func}': {reason}")]
    UnsatisfiedSpec {
        /// Name of the function being advertised.
        func: String,
        /// Why derivation failed.
        reason: String,
    },

    /// Converter resolution entered a cycle.
    #[error("conversion cycle detected involving converter '{converter}'")]
    CyclicConversion {
        /// Name of a converter on the cycle.
        converter: String,
    },

    /// A converter in an otherwise valid plan returned an error.
    #[error("converter '{converter}' failed: {source}")]
    ConversionFailed {
        /// Name of the failing converter.
        converter: String,
        /// The converter's error.
        #[source]
        source: Box<FuncError>,
    },

    /// A message argument's type URL has no registration on this side.
    #[error("unknown message type '{type_url}'")]
    UnknownType {
        /// The unregistered type URL.
        type_url: String,
    },

    /// An argument's advertised subtype disagrees with the declared
    /// parameter type.
    #[error("argument '{name}' type mismatch: expected '{expected}', got '{actual}'")]
    TypeMismatch {
        /// Slot name, or empty for type-matched slots.
        name: String,
        /// Subtype the function declares.
        expected: String,
        /// Subtype the argument carries.
        actual: String,
    },

    /// An integer argument was supplied at a different width than the
    /// parameter requires.
    #[error("argument '{name}' carries a {actual} value where {expected} is required")]
    PrimitiveWidthMismatch {
        /// Slot name, or empty for type-matched slots.
        name: String,
        /// Width the function declares.
        expected: PrimitiveKind,
        /// Width the argument carries.
        actual: PrimitiveKind,
    },

    /// A stored value could not be downcast to the requested type.
    #[error("value for {slot} is not a {expected}")]
    ValueMismatch {
        /// Description of the slot being extracted.
        slot: String,
        /// Rust type name that was requested.
        expected: &'static str,
    },

    /// The user callback returned an error.
    #[error("callback failed: {0}")]
    Callback(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An envelope operation failed while decoding or encoding a message.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// The call's cancellation handle fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The wire argument payload was malformed.
    #[error("invalid argument payload: {message}")]
    InvalidArgs {
        /// What was wrong with the payload.
        message: String,
    },
}

impl FuncError {
    /// Wraps an arbitrary user error as a callback failure.
    #[must_use]
    pub fn callback<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Callback(Box::new(err))
    }
}
