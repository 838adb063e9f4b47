//! The gantry plugin SDK facade.
//!
//! Plugin authors depend on this crate alone. It re-exports the SDK
//! surface — the wire data model, the funcspec engine, the resource
//! framework, the component traits and adapters — and provides [`serve`],
//! the entry point a plugin's `main` calls to speak to a host.
//!
//! A minimal plugin:
//!
//! ```no_run
//! use std::sync::Arc;
//! use gantry_sdk::plugin::adapter::builder::BuilderPlugin;
//! use gantry_sdk::plugin::component::Builder;
//! use gantry_sdk::funcspec::FuncDef;
//! use gantry_sdk::{serve_stdio, ServeConfig};
//! # use gantry_sdk::proto::{Empty, Message};
//!
//! struct MyBuilder;
//!
//! impl Builder for MyBuilder {
//!     fn build_func(&self) -> FuncDef {
//!         FuncDef::from_fn("build", || -> Result<Empty, std::io::Error> {
//!             Ok(Empty {})
//!         })
//!     }
//! }
//!
//! fn main() {
//!     let config = ServeConfig::new("my-builder")
//!         .with_server(BuilderPlugin::new(Arc::new(MyBuilder)).into_server());
//!     serve_stdio(config).expect("serve");
//! }
//! ```

pub mod serve;

/// Wire data model: envelopes, registry, funcspec descriptors, handshake.
pub mod proto {
    pub use gantry_proto::*;
}

/// The funcspec engine and mapper solver.
pub mod funcspec {
    pub use gantry_funcspec::*;
}

/// The resource lifecycle framework.
pub mod resource {
    pub use gantry_resource::*;
}

/// Plugin documentation bundles.
pub mod docs {
    pub use gantry_docs::*;
}

/// Component adapters and the wire protocol.
pub mod plugin {
    pub use gantry_plugin::*;
}

pub use self::serve::{reattach_address, serve, serve_stdio, ServeConfig, ServeHandle};
