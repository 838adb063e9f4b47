//! Component plugin adapters over the gantry wire protocol.
//!
//! This crate is the glue between a plugin's typed component implementation
//! and the host on the other side of a duplex frame channel. For every
//! component kind (builder, registry, platform, release manager, config
//! sourcer, task launcher) it provides:
//!
//! - a **server adapter** that advertises the implementation's operations
//!   as funcspecs, probes for the optional capabilities the implementation
//!   carries, and executes operations with host-supplied wire arguments;
//! - a **client stub** the host constructs over a connection, exposing
//!   exactly the capabilities the plugin advertised and caching funcspecs
//!   per operation.
//!
//! Stateful interactions that cannot fit one round trip (terminal UI, exec
//! sessions, log viewing) run over broker-allocated sub-streams on the same
//! connection.

pub mod adapter;
pub mod args;
pub mod broker;
pub mod component;
pub mod config;
pub mod exec;
pub mod logviewer;
pub mod mapper;
pub mod mappers;
pub mod template;
pub mod terminal;
pub mod wire;

mod error;

pub use self::adapter::{Capabilities, ComponentClient, ComponentServer, OpResponse};
pub use self::args::{CancelToken, Cleanup, DataDir, DeclaredCollector, DestroyedCollector, Internal, Logger};
pub use self::broker::Broker;
pub use self::component::ComponentKind;
pub use self::error::PluginError;
pub use self::wire::{Connection, Frame, JsonlTransport, PipeTransport, Transport, WireError};
