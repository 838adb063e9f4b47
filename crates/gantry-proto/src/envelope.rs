//! The opaque envelope carrying plugin messages across the boundary.
//!
//! An [`Envelope`] is a self-describing `{type_url, bytes}` pair. The host
//! can store and forward envelopes it cannot decode; only a process that
//! registered the payload type (see [`crate::registry`]) can open one. This
//! keeps plugin-private message layouts out of the host entirely.

use std::any::Any;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

/// A message that can cross the plugin boundary inside an [`Envelope`].
///
/// Implementors pick a stable, fully qualified type URL; the URL is the wire
/// identity of the type and must never change once plugins are deployed.
/// Messages must also be registered at program start via
/// [`crate::registry::register`] before the receiving side can decode them.
///
/// # Example
///
/// ```
/// use gantry_proto::{Envelope, Message};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct DockerImage {
///     image: String,
///     tag: String,
/// }
///
/// impl Message for DockerImage {
///     const TYPE_URL: &'static str = "example.docker.Image";
/// }
///
/// let msg = DockerImage { image: "web".into(), tag: "latest".into() };
/// let env = Envelope::encode(&msg).expect("encode");
/// assert_eq!(env.type_url(), "example.docker.Image");
/// assert_eq!(env.decode::<DockerImage>().expect("decode"), msg);
/// ```
pub trait Message:
    Serialize + DeserializeOwned + std::fmt::Debug + Any + Send + Sync + 'static
{
    /// Stable wire identifier for this message type.
    const TYPE_URL: &'static str;

    /// Values exposed to the host's templating engine when this message is
    /// an operation result.
    ///
    /// The default returns `None`, in which case the adapter auto-derives a
    /// map from the message's exported scalar fields.
    fn template_data(&self) -> Option<std::collections::BTreeMap<String, serde_json::Value>> {
        None
    }

    /// Labels attached to this message when it is an operation result.
    fn labels(&self) -> std::collections::BTreeMap<String, String> {
        std::collections::BTreeMap::new()
    }
}

/// Self-describing container for a serialized plugin message.
///
/// Equality is structural over both the type URL and the payload bytes, so
/// an envelope round-trips byte-for-byte through host storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    type_url: String,
    value: Vec<u8>,
}

impl Envelope {
    /// Wraps already-serialized bytes under the given type URL.
    ///
    /// Used by transports that relay envelopes without understanding them.
    #[must_use]
    pub fn from_parts(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }

    /// Serializes a message into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::EncodeFailed`] when the message cannot be
    /// serialized.
    pub fn encode<M: Message>(msg: &M) -> Result<Self, EnvelopeError> {
        let value = serde_json::to_vec(msg).map_err(|source| EnvelopeError::EncodeFailed {
            type_url: M::TYPE_URL.to_owned(),
            source,
        })?;
        Ok(Self {
            type_url: M::TYPE_URL.to_owned(),
            value,
        })
    }

    /// Decodes the payload as a concrete message type.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::TypeMismatch`] when the envelope carries a
    /// different type URL than `M`, or [`EnvelopeError::DecodeFailed`] when
    /// the bytes do not parse.
    pub fn decode<M: Message>(&self) -> Result<M, EnvelopeError> {
        if self.type_url != M::TYPE_URL {
            return Err(EnvelopeError::TypeMismatch {
                expected: M::TYPE_URL.to_owned(),
                actual: self.type_url.clone(),
            });
        }
        serde_json::from_slice(&self.value).map_err(|source| EnvelopeError::DecodeFailed {
            type_url: self.type_url.clone(),
            source,
        })
    }

    /// Returns the wire identifier of the payload.
    #[must_use]
    pub fn type_url(&self) -> &str {
        &self.type_url
    }

    /// Returns the serialized payload bytes.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

/// The empty message, used as the result type of functions that produce no
/// meaningful payload.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

impl Message for Empty {
    const TYPE_URL: &'static str = "gantry.Empty";
}
