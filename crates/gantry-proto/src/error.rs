//! Serialization errors for the opaque envelope and the type registry.

use thiserror::Error;

/// Errors arising from envelope serialization and type registration.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The message could not be serialized into envelope bytes.
    #[error("failed to encode message '{type_url}'")]
    EncodeFailed {
        /// Type URL of the message being encoded.
        type_url: String,
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// The envelope bytes could not be parsed as the expected type.
    #[error("failed to decode envelope as '{type_url}'")]
    DecodeFailed {
        /// Type URL the bytes were decoded as.
        type_url: String,
        /// Underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// The envelope carries a different type than the caller expected.
    #[error("envelope type mismatch: expected '{expected}', got '{actual}'")]
    TypeMismatch {
        /// Type URL the caller asked for.
        expected: String,
        /// Type URL the envelope actually carries.
        actual: String,
    },

    /// The envelope's type URL is not registered in this process.
    #[error("unknown message type '{type_url}': not registered")]
    UnknownType {
        /// The unregistered type URL.
        type_url: String,
    },

    /// A type URL was registered twice with two different Rust types.
    #[error("type URL '{type_url}' already registered as {existing}, refusing {incoming}")]
    RegistrationConflict {
        /// The contested type URL.
        type_url: String,
        /// Rust type name of the existing registration.
        existing: &'static str,
        /// Rust type name of the rejected registration.
        incoming: &'static str,
    },

    /// A value handed to an erased registry hook was not the registered type.
    #[error("value for '{type_url}' is not the registered type {expected}")]
    ErasedTypeMismatch {
        /// Type URL of the registration.
        type_url: String,
        /// Rust type name the registration expects.
        expected: &'static str,
    },

    /// No registration exists for the given Rust type.
    #[error("type {type_name} has no registered type URL")]
    UnregisteredType {
        /// Rust type name that was looked up.
        type_name: &'static str,
    },
}
