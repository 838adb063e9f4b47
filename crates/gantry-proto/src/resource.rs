//! Declared-resource and persisted-state messages for the resource
//! framework.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::envelope::{Envelope, Message};

/// Display category a resource belongs to, for host UI grouping.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ResourceCategory {
    /// No specific category.
    #[default]
    Other,
    /// A compute instance (container, VM, pod).
    Instance,
    /// Something that manages instances (autoscaling group, deployment).
    InstanceManager,
    /// A traffic router (load balancer, ingress).
    Router,
    /// A policy object (IAM role, security group).
    Policy,
    /// A configuration object (config map, parameter).
    Config,
    /// A serverless function.
    Function,
    /// A storage primitive (bucket, volume).
    Storage,
}

/// A resource reported to the host as present and managed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclaredResource {
    /// Human-readable resource name, unique within one plugin operation.
    pub name: String,
    /// Platform-specific type string, e.g. "pod" or "security group".
    pub resource_type: String,
    /// Platform the resource lives on, e.g. "kubernetes" or "docker".
    pub platform: String,
    /// Display category hint for the host UI.
    pub category_display_hint: ResourceCategory,
    /// Opaque state envelope, when the resource carries state.
    pub state: Option<Envelope>,
    /// JSON rendering of the state for forward-compatible host display.
    pub state_json: String,
}

/// A resource whose destroy callback has been invoked this operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestroyedResource {
    /// Human-readable resource name.
    pub name: String,
    /// Platform-specific type string.
    pub resource_type: String,
    /// Platform the resource lived on.
    pub platform: String,
    /// Final state envelope, when the resource carried state.
    pub state: Option<Envelope>,
    /// JSON rendering of the final state.
    pub state_json: String,
}

/// Out-parameter collector for declared resources.
///
/// Passed to operations as an ambient out-parameter; the resource manager
/// fills it after a successful create pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclaredResourcesResp {
    /// Resources declared by the operation.
    pub declared: Vec<DeclaredResource>,
}

/// Out-parameter collector for destroyed resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestroyedResourcesResp {
    /// Resources destroyed by the operation.
    pub destroyed: Vec<DestroyedResource>,
}

/// Persisted state of a single resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource name the state belongs to.
    pub name: String,
    /// Raw state envelope; absent for stateless resources.
    pub raw: Option<Envelope>,
    /// JSON rendering of the state.
    pub state_json: String,
}

/// Persisted state of a whole resource manager.
///
/// Round-trips byte-for-byte through host storage; the order list records
/// creation order so destruction can reverse it later.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerState {
    /// Resource names in successful-creation order.
    pub order: Vec<String>,
    /// Per-resource persisted state.
    pub resources: Vec<ResourceState>,
}

impl Message for ManagerState {
    const TYPE_URL: &'static str = "gantry.framework.ManagerState";
}
