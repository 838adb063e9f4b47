//! Ordered collections of typed values.

use std::sync::Arc;

use crate::error::FuncError;
use crate::value::{TypedValue, ValueKey};

/// An ordered set of typed values available to a call.
///
/// Lookup prefers an exact slot match (type, name, subtype); among
/// candidates that satisfy a slot, an exact-named value wins over an
/// unnamed fallback, and earlier insertions win over later ones. Inserting
/// a value whose key equals an existing key replaces it.
#[derive(Clone, Debug, Default)]
pub struct ValueSet {
    values: Vec<TypedValue>,
}

impl ValueSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of a plain typed value.
    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.insert(TypedValue::of(value));
        self
    }

    /// Builder-style insertion of a named typed value.
    #[must_use]
    pub fn with_named<T: Send + Sync + 'static>(
        mut self,
        name: impl Into<String>,
        value: T,
    ) -> Self {
        self.insert(TypedValue::with_key(
            ValueKey::typed::<T>().with_name(name),
            value,
        ));
        self
    }

    /// Inserts a value, replacing any existing value with the same key.
    pub fn insert(&mut self, value: TypedValue) {
        if let Some(existing) = self.values.iter_mut().find(|v| v.key() == value.key()) {
            *existing = value;
        } else {
            self.values.push(value);
        }
    }

    /// Inserts every value of another set into this one.
    pub fn extend(&mut self, other: &ValueSet) {
        for value in &other.values {
            self.insert(value.clone());
        }
    }

    /// Finds the best value for a slot, or `None` when nothing satisfies it.
    #[must_use]
    pub fn get(&self, slot: &ValueKey) -> Option<&TypedValue> {
        let mut fallback = None;
        for value in &self.values {
            if !value.key().satisfies(slot) {
                continue;
            }
            if value.key().name() == slot.name() {
                return Some(value);
            }
            if fallback.is_none() {
                fallback = Some(value);
            }
        }
        fallback
    }

    /// Returns `true` when some value satisfies the slot.
    #[must_use]
    pub fn contains(&self, slot: &ValueKey) -> bool {
        self.get(slot).is_some()
    }

    /// Returns the values in insertion order.
    #[must_use]
    pub fn values(&self) -> &[TypedValue] {
        &self.values
    }

    /// Extracts a clone of a plain typed value.
    ///
    /// # Errors
    ///
    /// Returns [`FuncError::Unsatisfied`] when no value fills the slot, or
    /// [`FuncError::ValueMismatch`] when the stored value is not a `T`
    /// (which indicates a key constructed against the wrong type).
    pub fn extract_cloned<T: Clone + Send + Sync + 'static>(
        &self,
        slot: &ValueKey,
    ) -> Result<T, FuncError> {
        let value = self.get(slot).ok_or_else(|| FuncError::Unsatisfied {
            slot: slot.to_string(),
        })?;
        value
            .value()
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| FuncError::ValueMismatch {
                slot: slot.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Extracts a shared handle to a stored value.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ValueSet::extract_cloned`].
    pub fn extract_arc<T: Send + Sync + 'static>(
        &self,
        slot: &ValueKey,
    ) -> Result<Arc<T>, FuncError> {
        let value = self.get(slot).ok_or_else(|| FuncError::Unsatisfied {
            slot: slot.to_string(),
        })?;
        value
            .value_arc()
            .downcast::<T>()
            .map_err(|_| FuncError::ValueMismatch {
                slot: slot.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}

impl FromIterator<TypedValue> for ValueSet {
    fn from_iter<I: IntoIterator<Item = TypedValue>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}
