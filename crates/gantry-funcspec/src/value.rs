//! Typed runtime values and their lookup keys.

use std::any::{Any, TypeId};
use std::sync::Arc;

/// A runtime value with its concrete type erased.
pub type ErasedValue = Arc<dyn Any + Send + Sync>;

/// Identity of a value slot: the Rust type plus an optional name and an
/// optional subtype.
///
/// Messages carry their wire type URL as the subtype; resource markers carry
/// the resource name. Two slots with the same type but different subtypes
/// never match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ValueKey {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<String>,
    subtype: Option<String>,
}

impl ValueKey {
    /// Creates the key for a plain Rust type.
    #[must_use]
    pub fn typed<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: None,
            subtype: None,
        }
    }

    /// Creates a key from raw parts, for values whose concrete type is only
    /// known at runtime.
    #[must_use]
    pub fn from_parts(
        type_id: TypeId,
        type_name: &'static str,
        name: Option<String>,
        subtype: Option<String>,
    ) -> Self {
        Self {
            type_id,
            type_name,
            name,
            subtype,
        }
    }

    /// Attaches a slot name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a subtype tag.
    #[must_use]
    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    /// Returns the Rust type id.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the Rust type name, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the slot name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the subtype tag, if any.
    #[must_use]
    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    /// Returns `true` when a value with this key can fill the given slot.
    ///
    /// Types and subtypes must match exactly; an unnamed value can fill a
    /// named slot, but a named value only fills slots with the same name or
    /// no name at all.
    #[must_use]
    pub fn satisfies(&self, slot: &Self) -> bool {
        if self.type_id != slot.type_id || self.subtype != slot.subtype {
            return false;
        }
        match (&slot.name, &self.name) {
            (None, _) | (Some(_), None) => true,
            (Some(want), Some(have)) => want == have,
        }
    }
}

impl std::fmt::Display for ValueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)?;
        if let Some(subtype) = &self.subtype {
            write!(f, "<{subtype}>")?;
        }
        if let Some(name) = &self.name {
            write!(f, " (named '{name}')")?;
        }
        Ok(())
    }
}

/// A runtime value paired with its slot identity.
#[derive(Clone)]
pub struct TypedValue {
    key: ValueKey,
    value: ErasedValue,
}

impl TypedValue {
    /// Wraps a concrete value under its plain type key.
    #[must_use]
    pub fn of<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            key: ValueKey::typed::<T>(),
            value: Arc::new(value),
        }
    }

    /// Wraps a concrete value under an explicit key.
    ///
    /// The key's type id must describe `T`; engine code that violates this
    /// produces values no slot will ever extract.
    #[must_use]
    pub fn with_key<T: Send + Sync + 'static>(key: ValueKey, value: T) -> Self {
        Self {
            key,
            value: Arc::new(value),
        }
    }

    /// Wraps an already-erased value under an explicit key.
    #[must_use]
    pub fn from_erased(key: ValueKey, value: ErasedValue) -> Self {
        Self { key, value }
    }

    /// Returns the slot identity.
    #[must_use]
    pub fn key(&self) -> &ValueKey {
        &self.key
    }

    /// Returns the erased value.
    #[must_use]
    pub fn value(&self) -> &ErasedValue {
        &self.value
    }

    /// Returns a clone of the erased value.
    #[must_use]
    pub fn value_arc(&self) -> ErasedValue {
        Arc::clone(&self.value)
    }
}

impl std::fmt::Debug for TypedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedValue").field("key", &self.key).finish_non_exhaustive()
    }
}
