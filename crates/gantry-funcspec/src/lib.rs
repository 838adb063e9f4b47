//! Dynamic function specification and invocation engine.
//!
//! The funcspec engine lets a plugin expose strongly-typed operations whose
//! argument values are supplied by a host that does not share the plugin's
//! types. A plugin function enters the engine as a [`FuncDef`] — a closure
//! plus explicit parameter and result descriptors derived from its
//! signature via the [`FuncArg`] / [`IntoFunc`] traits. From a `FuncDef` the
//! engine can:
//!
//! - derive a wire-friendly [`gantry_proto::FuncSpec`] advertising the
//!   argument kinds the host must supply ([`derive_spec`]);
//! - resolve host-supplied values against the function's parameters with a
//!   small dependency-injection solver that applies user-defined converters
//!   ([`solve`]);
//! - invoke the function with wire arguments decoded into concrete types
//!   ([`call_dynamic`]);
//! - reconstruct a callable from a received spec on the host side
//!   ([`SpecCall`]).
//!
//! Parameter types fall into four classes: enveloped messages and supported
//! primitives (advertised to the host), ambient values the host injects
//! locally (loggers, cancellation handles, broker plumbing), and derived
//! values that must be reachable from advertised inputs through a converter
//! chain.

pub mod dynamic;
pub mod func;
pub mod set;
pub mod solver;
pub mod spec;
pub mod value;

mod error;

pub use self::dynamic::call_dynamic;
pub use self::error::FuncError;
pub use self::func::{
    ArgClass, CallArgs, FuncArg, FuncDef, FuncOutput, IntoFunc, ParamSpec,
};
pub use self::set::ValueSet;
pub use self::solver::{solve, Plan};
pub use self::spec::{derive_spec, SpecCall, SpecOptions};
pub use self::value::{TypedValue, ValueKey};
