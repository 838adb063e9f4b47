//! Declarative resource lifecycle framework.
//!
//! A "resource" is any external thing a plugin creates during an operation:
//! a load balancer, a pod, a security group, a file. Declaring them as
//! [`Resource`]s with create/destroy/status callbacks buys lifecycle
//! management for free: the [`Manager`] works out a valid creation order
//! from the callbacks' value types alone, rolls back partially-created sets
//! when a callback fails, persists the creation order in opaque state so a
//! later destroy reverses it, and summarises per-resource health into a
//! single report.
//!
//! Dependencies are expressed purely through types: a resource whose create
//! callback takes `Arc<StateA>` depends on the resource whose create
//! callback returns `StateA`. The manager feeds every callback through the
//! funcspec solver, so anything the solver can inject (host values,
//! converter outputs, shared value providers) is available to callbacks
//! too.

pub mod manager;
pub mod resource;

mod error;

pub use self::error::ResourceError;
pub use self::manager::Manager;
pub use self::resource::{Resource, StatusResponse};
