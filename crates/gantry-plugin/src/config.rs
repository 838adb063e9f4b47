//! Configuration structure descriptors for the host's config decoder.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kind of a configuration field as presented to the host decoder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConfigFieldKind {
    /// UTF-8 string.
    String,
    /// Integer.
    Int,
    /// Boolean.
    Bool,
    /// List of strings.
    List,
    /// String-to-string map.
    Map,
    /// Nested block with its own fields.
    Block,
}

/// One field of a plugin's configuration shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigField {
    /// Attribute name as written in configuration.
    pub name: String,
    /// Field kind for the decoder.
    pub kind: ConfigFieldKind,
    /// Whether the attribute may be omitted.
    pub optional: bool,
    /// Environment variable consulted when the attribute is unset.
    #[serde(default)]
    pub env_var: String,
    /// One-line description shown in errors and docs.
    #[serde(default)]
    pub synopsis: String,
}

impl ConfigField {
    /// Creates a required field.
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ConfigFieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            env_var: String::new(),
            synopsis: String::new(),
        }
    }

    /// Creates an optional field.
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: ConfigFieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: true,
            env_var: String::new(),
            synopsis: String::new(),
        }
    }

    /// Sets the environment-variable fallback.
    #[must_use]
    pub fn with_env_var(mut self, env_var: impl Into<String>) -> Self {
        self.env_var = env_var.into();
        self
    }

    /// Sets the one-line description.
    #[must_use]
    pub fn with_synopsis(mut self, synopsis: impl Into<String>) -> Self {
        self.synopsis = synopsis.into();
        self
    }
}

/// Structural descriptor of a plugin's configuration shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigStruct {
    /// The configuration fields in declaration order.
    pub fields: Vec<ConfigField>,
}

impl ConfigStruct {
    /// Creates an empty descriptor (a plugin with no configuration).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field.
    #[must_use]
    pub fn with_field(mut self, field: ConfigField) -> Self {
        self.fields.push(field);
        self
    }
}
