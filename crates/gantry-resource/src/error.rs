//! Errors raised by resources and the resource manager.

use gantry_funcspec::FuncError;
use gantry_proto::EnvelopeError;
use thiserror::Error;

/// Errors arising from resource lifecycle operations.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A resource is misconfigured: missing name, missing create callback,
    /// or inconsistent state declaration.
    #[error("resource validation failed: {message}")]
    Validation {
        /// What is wrong with the declaration.
        message: String,
    },

    /// A create callback (or the solve leading to it) failed.
    #[error("failed to create resource set: {source}")]
    Create {
        /// Underlying engine or callback failure.
        #[source]
        source: FuncError,
    },

    /// Cleanup after a failed create also failed.
    #[error("rollback failed after create error ({original}): {rollback}")]
    Rollback {
        /// The create failure that triggered the rollback.
        original: Box<ResourceError>,
        /// The failure encountered during rollback.
        rollback: Box<ResourceError>,
    },

    /// A destroy callback (or the solve leading to it) failed.
    #[error("failed to destroy resource set: {source}")]
    Destroy {
        /// Underlying engine or callback failure.
        #[source]
        source: FuncError,
    },

    /// A status callback failed.
    #[error("status callback for resource '{name}' failed: {source}")]
    Status {
        /// Resource whose status callback failed.
        name: String,
        /// Underlying engine or callback failure.
        #[source]
        source: FuncError,
    },

    /// Persisted state references a resource this manager does not declare.
    #[error("persisted state references unknown resource '{name}'")]
    UnknownResource {
        /// The unknown resource name.
        name: String,
    },

    /// Persisted state could not be loaded into a resource.
    #[error("failed to load state for resource '{name}'")]
    LoadState {
        /// Resource whose state failed to load.
        name: String,
        /// Underlying serialization failure.
        #[source]
        source: EnvelopeError,
    },

    /// Resource state could not be serialized.
    #[error("failed to serialize state for resource '{name}'")]
    State {
        /// Resource whose state failed to serialize.
        name: String,
        /// Underlying serialization failure.
        #[source]
        source: EnvelopeError,
    },

    /// A status report was requested with no status responses recorded.
    #[error("cannot summarise health: no resources reported status")]
    EmptyStatus,
}
