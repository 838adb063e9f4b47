//! Process-wide registry mapping type URLs to concrete message types.
//!
//! Plugins call [`register`] for every message type they expect to receive,
//! typically from their `main` before serving. Registration stores a set of
//! monomorphised hooks so later code can decode, encode, and JSON-render
//! values whose concrete type is only known at runtime (as an erased
//! `Arc<dyn Any>`).
//!
//! The registry is read-mostly after startup; concurrent registration is
//! serialised by an internal lock.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::envelope::{Envelope, Message};
use crate::error::EnvelopeError;

/// A decoded message whose concrete type is erased.
///
/// Produced by [`decode_dyn`]; downcast with `value.downcast::<M>()` when
/// the concrete type is statically known.
pub type ErasedValue = Arc<dyn Any + Send + Sync>;

type TemplateData = std::collections::BTreeMap<String, serde_json::Value>;
type Labels = std::collections::BTreeMap<String, String>;

struct TypeEntry {
    type_id: TypeId,
    type_name: &'static str,
    decode: fn(&[u8]) -> Result<ErasedValue, EnvelopeError>,
    encode: fn(&(dyn Any + Send + Sync)) -> Result<Envelope, EnvelopeError>,
    render_json: fn(&(dyn Any + Send + Sync)) -> Result<String, EnvelopeError>,
    template: fn(&(dyn Any + Send + Sync)) -> Option<TemplateData>,
    labels: fn(&(dyn Any + Send + Sync)) -> Labels,
}

#[derive(Default)]
struct Registry {
    by_url: HashMap<&'static str, TypeEntry>,
    by_type: HashMap<TypeId, &'static str>,
}

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::default()));

fn decode_hook<M: Message>(bytes: &[u8]) -> Result<ErasedValue, EnvelopeError> {
    let msg: M =
        serde_json::from_slice(bytes).map_err(|source| EnvelopeError::DecodeFailed {
            type_url: M::TYPE_URL.to_owned(),
            source,
        })?;
    Ok(Arc::new(msg))
}

fn encode_hook<M: Message>(value: &(dyn Any + Send + Sync)) -> Result<Envelope, EnvelopeError> {
    let msg = value
        .downcast_ref::<M>()
        .ok_or(EnvelopeError::ErasedTypeMismatch {
            type_url: M::TYPE_URL.to_owned(),
            expected: std::any::type_name::<M>(),
        })?;
    Envelope::encode(msg)
}

fn render_json_hook<M: Message>(
    value: &(dyn Any + Send + Sync),
) -> Result<String, EnvelopeError> {
    let msg = value
        .downcast_ref::<M>()
        .ok_or(EnvelopeError::ErasedTypeMismatch {
            type_url: M::TYPE_URL.to_owned(),
            expected: std::any::type_name::<M>(),
        })?;
    serde_json::to_string(msg).map_err(|source| EnvelopeError::EncodeFailed {
        type_url: M::TYPE_URL.to_owned(),
        source,
    })
}

/// Registers a message type under its [`Message::TYPE_URL`].
///
/// Registration is idempotent: registering the same Rust type twice is a
/// no-op.
///
/// # Errors
///
/// Returns [`EnvelopeError::RegistrationConflict`] when the type URL is
/// already claimed by a different Rust type. That is a configuration error
/// in the plugin: two message types must never share a wire identity.
pub fn register<M: Message>() -> Result<(), EnvelopeError> {
    let mut registry = REGISTRY.write().expect("registry lock poisoned");
    if let Some(existing) = registry.by_url.get(M::TYPE_URL) {
        if existing.type_id == TypeId::of::<M>() {
            return Ok(());
        }
        return Err(EnvelopeError::RegistrationConflict {
            type_url: M::TYPE_URL.to_owned(),
            existing: existing.type_name,
            incoming: std::any::type_name::<M>(),
        });
    }

    registry.by_url.insert(
        M::TYPE_URL,
        TypeEntry {
            type_id: TypeId::of::<M>(),
            type_name: std::any::type_name::<M>(),
            decode: decode_hook::<M>,
            encode: encode_hook::<M>,
            render_json: render_json_hook::<M>,
            template: |value| value.downcast_ref::<M>().and_then(Message::template_data),
            labels: |value| value.downcast_ref::<M>().map(Message::labels).unwrap_or_default(),
        },
    );
    registry.by_type.insert(TypeId::of::<M>(), M::TYPE_URL);
    Ok(())
}

/// Returns `true` when a type URL has a registration in this process.
#[must_use]
pub fn is_registered(type_url: &str) -> bool {
    REGISTRY
        .read()
        .expect("registry lock poisoned")
        .by_url
        .contains_key(type_url)
}

/// Returns the templating values of an erased operation result, when its
/// message type provides them.
#[must_use]
pub fn template_data_dyn(value: &(dyn Any + Send + Sync)) -> Option<TemplateData> {
    let registry = REGISTRY.read().expect("registry lock poisoned");
    let entry = entry_for(&registry, value).ok()?;
    (entry.template)(value)
}

/// Returns the labels of an erased operation result. Empty for unregistered
/// values and for messages without labels.
#[must_use]
pub fn labels_dyn(value: &(dyn Any + Send + Sync)) -> Labels {
    let registry = REGISTRY.read().expect("registry lock poisoned");
    entry_for(&registry, value)
        .map(|entry| (entry.labels)(value))
        .unwrap_or_default()
}

/// Returns the Rust type id registered for a type URL, if any.
#[must_use]
pub fn type_id_for_url(type_url: &str) -> Option<TypeId> {
    REGISTRY
        .read()
        .expect("registry lock poisoned")
        .by_url
        .get(type_url)
        .map(|entry| entry.type_id)
}

/// Returns the Rust type name registered for a type URL, if any.
#[must_use]
pub fn type_name_for_url(type_url: &str) -> Option<&'static str> {
    REGISTRY
        .read()
        .expect("registry lock poisoned")
        .by_url
        .get(type_url)
        .map(|entry| entry.type_name)
}

/// Returns the type URL registered for a Rust type, if any.
#[must_use]
pub fn type_url_for(type_id: TypeId) -> Option<&'static str> {
    REGISTRY
        .read()
        .expect("registry lock poisoned")
        .by_type
        .get(&type_id)
        .copied()
}

/// Decodes an envelope into a freshly allocated value of the registered
/// concrete type.
///
/// # Errors
///
/// Returns [`EnvelopeError::UnknownType`] when the envelope's type URL has
/// no registration, or [`EnvelopeError::DecodeFailed`] when the payload does
/// not parse.
pub fn decode_dyn(envelope: &Envelope) -> Result<ErasedValue, EnvelopeError> {
    let registry = REGISTRY.read().expect("registry lock poisoned");
    let entry =
        registry
            .by_url
            .get(envelope.type_url())
            .ok_or_else(|| EnvelopeError::UnknownType {
                type_url: envelope.type_url().to_owned(),
            })?;
    (entry.decode)(envelope.value())
}

/// Encodes an erased value into an envelope using its registration.
///
/// # Errors
///
/// Returns [`EnvelopeError::UnregisteredType`] when the value's concrete
/// type was never registered.
pub fn encode_dyn(value: &(dyn Any + Send + Sync)) -> Result<Envelope, EnvelopeError> {
    let registry = REGISTRY.read().expect("registry lock poisoned");
    let entry = entry_for(&registry, value)?;
    (entry.encode)(value)
}

/// Renders an erased value as a JSON string using its registration.
///
/// # Errors
///
/// Returns [`EnvelopeError::UnregisteredType`] when the value's concrete
/// type was never registered.
pub fn render_json_dyn(value: &(dyn Any + Send + Sync)) -> Result<String, EnvelopeError> {
    let registry = REGISTRY.read().expect("registry lock poisoned");
    let entry = entry_for(&registry, value)?;
    (entry.render_json)(value)
}

fn entry_for<'r>(
    registry: &'r Registry,
    value: &(dyn Any + Send + Sync),
) -> Result<&'r TypeEntry, EnvelopeError> {
    let url = registry.by_type.get(&value.type_id()).ok_or(
        EnvelopeError::UnregisteredType {
            type_name: "<unregistered>",
        },
    )?;
    registry
        .by_url
        .get(url)
        .ok_or(EnvelopeError::UnregisteredType {
            type_name: "<unregistered>",
        })
}

#[cfg(test)]
mod tests;
