//! Plugin documentation bundle.
//!
//! A plugin documents itself with a [`Documentation`] value: a high-level
//! description and example, the input/output types of its primary
//! operation, per-field configuration docs (with optional defaults and
//! environment-variable fallbacks), template fields available to the host's
//! templating engine, request fields for dynamic config sourcing, and the
//! mappers it contributes. The whole bundle is serializable so the adapter
//! can ship it to the host in one call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from assembling documentation.
#[derive(Debug, Error)]
pub enum DocsError {
    /// A field was documented twice.
    #[error("field '{name}' is already documented")]
    DuplicateField {
        /// The duplicated field name.
        name: String,
    },
}

/// High-level details about a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Details {
    /// High-level description of the plugin.
    pub description: String,
    /// Configuration snippet showing typical use.
    pub example: String,
    /// Type accepted from the previous operation, empty when unused.
    pub input: String,
    /// Type this plugin outputs.
    pub output: String,
    /// Mappers the plugin makes available for type conversion.
    pub mappers: Vec<MapperDocs>,
}

/// Documents a single mapper: what it converts from and to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperDocs {
    /// Input type of the mapper.
    pub input: String,
    /// Output type of the mapper.
    pub output: String,
    /// Short explanation of the conversion.
    pub description: String,
}

/// Documents one configuration attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDocs {
    /// Attribute name.
    pub field: String,
    /// Attribute type as shown to users ("string", "int", "bool").
    pub field_type: String,
    /// One-line description.
    pub synopsis: String,
    /// Longer description.
    pub summary: String,
    /// Whether the attribute may be omitted.
    pub optional: bool,
    /// Value used when the user does not set the attribute.
    pub default: String,
    /// Environment variable read when the user does not set the attribute.
    pub env_var: String,
    /// Nested fields, for attributes that are blocks rather than scalars.
    pub sub_fields: Vec<FieldDocs>,
}

/// Options applied when documenting a field.
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    field_type: String,
    summary: String,
    optional: bool,
    default: String,
    env_var: String,
    sub_fields: Vec<FieldDocs>,
}

impl FieldOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the displayed attribute type.
    #[must_use]
    pub fn field_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = field_type.into();
        self
    }

    /// Sets the longer description.
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Marks the attribute optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Documents the default value.
    #[must_use]
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }

    /// Documents the environment-variable fallback.
    #[must_use]
    pub fn env_var(mut self, env_var: impl Into<String>) -> Self {
        self.env_var = env_var.into();
        self
    }

    /// Documents nested fields for block attributes.
    #[must_use]
    pub fn sub_fields(mut self, sub_fields: Vec<FieldDocs>) -> Self {
        self.sub_fields = sub_fields;
        self
    }

    fn into_docs(self, name: &str, synopsis: &str) -> FieldDocs {
        FieldDocs {
            field: name.to_owned(),
            field_type: self.field_type,
            synopsis: synopsis.to_owned(),
            summary: self.summary,
            optional: self.optional,
            default: self.default,
            env_var: self.env_var,
            sub_fields: self.sub_fields,
        }
    }
}

/// The full documentation bundle a plugin exposes.
///
/// # Example
///
/// ```
/// use gantry_docs::{Documentation, FieldOptions};
///
/// let mut docs = Documentation::new();
/// docs.description("Deploys OCI images to a container runtime.");
/// docs.example("deploy {\n  use \"docker\" {}\n}");
/// docs.input("docker.Image");
/// docs.output("docker.Deployment");
/// docs.set_field(
///     "memory_mb",
///     "memory limit for the container",
///     FieldOptions::new()
///         .field_type("int")
///         .optional()
///         .default_value("256")
///         .env_var("GANTRY_DOCKER_MEMORY_MB"),
/// ).expect("field");
///
/// assert_eq!(docs.fields().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
    description: String,
    example: String,
    input: String,
    output: String,
    fields: BTreeMap<String, FieldDocs>,
    template_fields: BTreeMap<String, FieldDocs>,
    request_fields: BTreeMap<String, FieldDocs>,
    mappers: Vec<MapperDocs>,
}

impl Documentation {
    /// Creates an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the high-level description.
    pub fn description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Sets the configuration example snippet.
    pub fn example(&mut self, example: impl Into<String>) {
        self.example = example.into();
    }

    /// Sets the input type of the primary operation.
    pub fn input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Sets the output type of the primary operation.
    pub fn output(&mut self, output: impl Into<String>) {
        self.output = output.into();
    }

    /// Documents a mapper this plugin contributes.
    pub fn add_mapper(
        &mut self,
        input: impl Into<String>,
        output: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.mappers.push(MapperDocs {
            input: input.into(),
            output: output.into(),
            description: description.into(),
        });
    }

    /// Documents a configuration field.
    ///
    /// # Errors
    ///
    /// Returns [`DocsError::DuplicateField`] when the field is already
    /// documented.
    pub fn set_field(
        &mut self,
        name: &str,
        synopsis: &str,
        options: FieldOptions,
    ) -> Result<(), DocsError> {
        insert_field(&mut self.fields, name, synopsis, options)
    }

    /// Documents a template field made available to the host's templating
    /// engine.
    ///
    /// # Errors
    ///
    /// Returns [`DocsError::DuplicateField`] when the field is already
    /// documented.
    pub fn set_template_field(
        &mut self,
        name: &str,
        synopsis: &str,
        options: FieldOptions,
    ) -> Result<(), DocsError> {
        insert_field(&mut self.template_fields, name, synopsis, options)
    }

    /// Documents a request field used by dynamic config sourcing.
    ///
    /// # Errors
    ///
    /// Returns [`DocsError::DuplicateField`] when the field is already
    /// documented.
    pub fn set_request_field(
        &mut self,
        name: &str,
        synopsis: &str,
        options: FieldOptions,
    ) -> Result<(), DocsError> {
        insert_field(&mut self.request_fields, name, synopsis, options)
    }

    /// Replaces a configuration field wholesale.
    pub fn override_field(&mut self, field: FieldDocs) {
        self.fields.insert(field.field.clone(), field);
    }

    /// Returns the high-level details.
    #[must_use]
    pub fn details(&self) -> Details {
        Details {
            description: self.description.clone(),
            example: self.example.clone(),
            input: self.input.clone(),
            output: self.output.clone(),
            mappers: self.mappers.clone(),
        }
    }

    /// Returns the configuration fields sorted by name.
    #[must_use]
    pub fn fields(&self) -> Vec<&FieldDocs> {
        self.fields.values().collect()
    }

    /// Returns the template fields sorted by name.
    #[must_use]
    pub fn template_fields(&self) -> Vec<&FieldDocs> {
        self.template_fields.values().collect()
    }

    /// Returns the request fields sorted by name.
    #[must_use]
    pub fn request_fields(&self) -> Vec<&FieldDocs> {
        self.request_fields.values().collect()
    }
}

fn insert_field(
    target: &mut BTreeMap<String, FieldDocs>,
    name: &str,
    synopsis: &str,
    options: FieldOptions,
) -> Result<(), DocsError> {
    if target.contains_key(name) {
        return Err(DocsError::DuplicateField {
            name: name.to_owned(),
        });
    }
    target.insert(name.to_owned(), options.into_docs(name, synopsis));
    Ok(())
}
