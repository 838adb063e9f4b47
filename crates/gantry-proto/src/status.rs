//! Status report messages summarising resource health.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::envelope::Message;

/// Health of a resource or of a whole deployment.
///
/// The variant order is the defined severity order used when sorting
/// mixed-health summaries; keep it stable.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Health {
    /// Health could not be determined.
    #[default]
    Unknown,
    /// The resource exists but is not ready to serve.
    Alive,
    /// The resource is fully operational.
    Ready,
    /// The resource exists but is not operational.
    Down,
    /// The resource should exist but could not be found.
    Missing,
    /// Constituent resources report a mix of healths.
    Partial,
}

/// Health report for a single platform resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResource {
    /// Resource name as reported by the platform.
    pub name: String,
    /// Platform-specific type string, e.g. "pod".
    pub resource_type: String,
    /// Reported health.
    pub health: Health,
    /// Optional human-readable health detail.
    pub health_message: String,
    /// Name of the declared resource this report belongs to.
    pub declared_resource: String,
}

/// Aggregate status of a deployment's resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Per-resource reports.
    pub resources: Vec<StatusResource>,
    /// Overall health per the summary rule.
    pub health: Health,
    /// Human-readable summary of the overall health.
    pub health_message: String,
    /// Milliseconds since the Unix epoch at generation time.
    pub generated_millis: u64,
    /// True when the report was generated outside the host.
    pub external: bool,
}

impl Message for StatusReport {
    const TYPE_URL: &'static str = "gantry.StatusReport";
}

#[cfg(test)]
mod tests;
