//! Small result messages shared by the component capability calls.

use serde::{Deserialize, Serialize};

use crate::envelope::Message;

/// Result of an authentication check or auth bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    /// True when the plugin now holds valid credentials.
    pub authenticated: bool,
}

impl Message for AuthResult {
    const TYPE_URL: &'static str = "gantry.AuthResult";
}

/// Result of an exec session run by the plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    /// Exit code of the process that was run.
    pub exit_code: i32,
}

impl Message for ExecResult {
    const TYPE_URL: &'static str = "gantry.ExecResult";
}

/// Stable identity of a long-lived deployment generation.
///
/// Operations that share a generation id update resources in place instead
/// of creating a new set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationId {
    /// Opaque generation identifier.
    pub id: String,
}

impl Message for GenerationId {
    const TYPE_URL: &'static str = "gantry.GenerationId";
}
