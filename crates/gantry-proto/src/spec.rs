//! Funcspec wire descriptors.
//!
//! A [`FuncSpec`] is the wire-serializable description of a dynamic
//! function: which argument kinds it needs from the host and which message
//! results it produces. The host assembles [`WireValue`]s matching the
//! advertised [`ArgSpec`]s and sends them back as [`FuncArgs`] when invoking
//! the operation.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::envelope::Envelope;

/// Primitive categories and bit widths supported across the boundary.
///
/// `Int` and `Uint` are the native-width tags; everything else names an
/// explicit width. The tag travels with the value so the receiving side can
/// reconstruct the exact parameter type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PrimitiveKind {
    /// Boolean.
    Bool,
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// Native-width signed integer.
    Int,
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// Native-width unsigned integer.
    Uint,
    /// UTF-8 string.
    Str,
}

impl PrimitiveKind {
    /// Returns `true` for the signed integer tags.
    #[must_use]
    pub const fn is_signed_int(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::Int)
    }

    /// Returns `true` for the unsigned integer tags.
    #[must_use]
    pub const fn is_unsigned_int(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32 | Self::U64 | Self::Uint)
    }
}

/// The kind of a single advertised argument or result slot.
///
/// Exactly one of the two shapes applies: a message slot carries the payload
/// type URL, a primitive slot carries the width tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    /// An enveloped message with the given wire identity.
    Message {
        /// Type URL of the expected payload.
        type_url: String,
    },
    /// A primitive value with the given width tag.
    Primitive {
        /// Category and bit width of the value.
        primitive: PrimitiveKind,
    },
}

/// One advertised argument or result slot of a [`FuncSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    /// Slot name; empty for purely type-matched slots.
    #[serde(default)]
    pub name: String,
    /// Message or primitive shape of the slot.
    pub kind: ArgKind,
}

impl ArgSpec {
    /// Creates a message slot for the given type URL.
    #[must_use]
    pub fn message(name: impl Into<String>, type_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ArgKind::Message {
                type_url: type_url.into(),
            },
        }
    }

    /// Creates a primitive slot with the given width tag.
    #[must_use]
    pub fn primitive(name: impl Into<String>, primitive: PrimitiveKind) -> Self {
        Self {
            name: name.into(),
            kind: ArgKind::Primitive { primitive },
        }
    }
}

/// Wire-serializable description of a dynamic function.
///
/// An empty `result` list denotes a direct-call function; a non-empty list
/// denotes a mapper converting between message types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncSpec {
    /// Function name, for diagnostics and mapper listings.
    pub name: String,
    /// Argument slots the host must supply.
    pub args: Vec<ArgSpec>,
    /// Message results the function produces.
    #[serde(default)]
    pub result: Vec<ArgSpec>,
}

impl FuncSpec {
    /// Returns `true` when this spec describes a mapper.
    #[must_use]
    pub fn is_mapper(&self) -> bool {
        !self.result.is_empty()
    }
}

/// The payload of a single argument value, mirroring the wire oneof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WirePayload {
    /// An enveloped message.
    Envelope(Envelope),
    /// A boolean.
    Bool(bool),
    /// A signed integer, carried at full width with its tag.
    Int {
        /// Declared width of the parameter slot.
        primitive: PrimitiveKind,
        /// The value, widened to 64 bits for carriage.
        value: i64,
    },
    /// An unsigned integer, carried at full width with its tag.
    Uint {
        /// Declared width of the parameter slot.
        primitive: PrimitiveKind,
        /// The value, widened to 64 bits for carriage.
        value: u64,
    },
    /// A UTF-8 string.
    Str(String),
}

/// A single argument value sent with an operation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireValue {
    /// Slot name; empty for purely type-matched values.
    #[serde(default)]
    pub name: String,
    /// Message type URL for envelope payloads; empty otherwise.
    #[serde(default)]
    pub subtype: String,
    /// The value itself.
    pub payload: WirePayload,
}

/// The argument list of every dynamic operation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuncArgs {
    /// Values matching the operation's advertised [`ArgSpec`]s.
    pub args: Vec<WireValue>,
}
