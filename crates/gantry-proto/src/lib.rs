//! Wire data model for the gantry plugin runtime.
//!
//! Everything that crosses the host/plugin boundary is defined here: the
//! [`Envelope`] that carries serialized plugin messages without the host
//! understanding them, the process-wide [`registry`] that maps type URLs to
//! concrete Rust types, the [`FuncSpec`] descriptors a plugin advertises for
//! its dynamic functions, the declared-resource and status-report messages
//! emitted by the resource framework, and the connection handshake.
//!
//! The crate is deliberately free of any runtime machinery: it is the shared
//! vocabulary both sides of the wire agree on. Higher layers
//! (`gantry-funcspec`, `gantry-plugin`) build behaviour on top of it.

pub mod component;
pub mod envelope;
pub mod handshake;
pub mod registry;
pub mod resource;
pub mod spec;
pub mod status;

mod error;

pub use self::component::{AuthResult, ExecResult, GenerationId};
pub use self::envelope::{Empty, Envelope, Message};
pub use self::error::EnvelopeError;
pub use self::handshake::{Handshake, REATTACH_ENV_VAR};
pub use self::resource::{
    DeclaredResource, DeclaredResourcesResp, DestroyedResource, DestroyedResourcesResp,
    ManagerState, ResourceCategory, ResourceState,
};
pub use self::spec::{ArgKind, ArgSpec, FuncArgs, FuncSpec, PrimitiveKind, WirePayload, WireValue};
pub use self::status::{Health, StatusReport, StatusResource};
