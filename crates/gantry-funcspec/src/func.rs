//! The dynamic function abstraction.
//!
//! A [`FuncDef`] is a callable closure plus explicit descriptors for its
//! parameters and results. Plugin functions become `FuncDef`s through the
//! [`IntoFunc`] conversion: every parameter type implements [`FuncArg`]
//! (which classifies it as an advertised message or primitive, an ambient
//! host-injected value, or a converter-derived value) and the return type
//! determines the declared outputs. This recovers the behaviour of
//! reflection-based spec derivation with nothing but trait dispatch.

use std::sync::Arc;

use gantry_proto::{Envelope, Message, PrimitiveKind, WireValue};

use crate::error::FuncError;
use crate::set::ValueSet;
use crate::solver;
use crate::value::{TypedValue, ValueKey};

/// Classification of a function parameter or result slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgClass {
    /// An enveloped message, advertised to the host with its type URL.
    Message,
    /// A supported primitive, advertised with its width tag.
    Primitive(PrimitiveKind),
    /// A host-injected ambient value; never advertised.
    Ambient,
    /// A value reachable only through a converter chain.
    Derived,
}

/// One declared parameter or result slot of a [`FuncDef`].
#[derive(Clone, Debug)]
pub struct ParamSpec {
    key: ValueKey,
    class: ArgClass,
}

impl ParamSpec {
    /// Creates a slot from a key and class.
    #[must_use]
    pub fn new(key: ValueKey, class: ArgClass) -> Self {
        Self { key, class }
    }

    /// Creates the slot for a message type.
    #[must_use]
    pub fn message<M: Message>() -> Self {
        Self {
            key: ValueKey::typed::<M>().with_subtype(M::TYPE_URL),
            class: ArgClass::Message,
        }
    }

    /// Creates the slot for an ambient type.
    #[must_use]
    pub fn ambient<T: 'static>() -> Self {
        Self {
            key: ValueKey::typed::<T>(),
            class: ArgClass::Ambient,
        }
    }

    /// Creates the slot for a converter-derived type.
    #[must_use]
    pub fn derived<T: 'static>() -> Self {
        Self {
            key: ValueKey::typed::<T>(),
            class: ArgClass::Derived,
        }
    }

    /// Returns the slot identity.
    #[must_use]
    pub fn key(&self) -> &ValueKey {
        &self.key
    }

    /// Returns the slot classification.
    #[must_use]
    pub const fn class(&self) -> ArgClass {
        self.class
    }

    /// Attaches a slot name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.key = self.key.with_name(name);
        self
    }
}

/// A type usable as a parameter of a dynamic function.
///
/// Implementations exist for `Arc<M>` where `M` is a registered message,
/// for the supported primitives, and for the engine's own plumbing types.
/// Ambient host types gain an implementation through [`crate::ambient_arg!`]
/// and converter-derived types through [`crate::derived_value!`].
pub trait FuncArg: Sized + Send + Sync + 'static {
    /// Declares the slots this parameter contributes, under an optional
    /// field name.
    fn params_named(name: Option<&str>) -> Vec<ParamSpec>;

    /// Extracts the parameter from a resolved value set.
    ///
    /// # Errors
    ///
    /// Returns [`FuncError::Unsatisfied`] when the set has no value for the
    /// slot.
    fn extract_named(set: &ValueSet, name: Option<&str>) -> Result<Self, FuncError>;

    /// Declares the slots for an unnamed parameter position.
    fn params() -> Vec<ParamSpec> {
        Self::params_named(None)
    }

    /// Extracts an unnamed parameter.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`FuncArg::extract_named`].
    fn extract(set: &ValueSet) -> Result<Self, FuncError> {
        Self::extract_named(set, None)
    }
}

fn named(key: ValueKey, name: Option<&str>) -> ValueKey {
    match name {
        Some(name) => key.with_name(name),
        None => key,
    }
}

impl<M: Message> FuncArg for Arc<M> {
    fn params_named(name: Option<&str>) -> Vec<ParamSpec> {
        let key = named(
            ValueKey::typed::<M>().with_subtype(M::TYPE_URL),
            name,
        );
        vec![ParamSpec::new(key, ArgClass::Message)]
    }

    fn extract_named(set: &ValueSet, name: Option<&str>) -> Result<Self, FuncError> {
        let key = named(
            ValueKey::typed::<M>().with_subtype(M::TYPE_URL),
            name,
        );
        set.extract_arc::<M>(&key)
    }
}

macro_rules! primitive_arg {
    ($ty:ty, $kind:expr) => {
        impl FuncArg for $ty {
            fn params_named(name: Option<&str>) -> Vec<ParamSpec> {
                vec![ParamSpec::new(
                    named(ValueKey::typed::<$ty>(), name),
                    ArgClass::Primitive($kind),
                )]
            }

            fn extract_named(set: &ValueSet, name: Option<&str>) -> Result<Self, FuncError> {
                set.extract_cloned::<$ty>(&named(ValueKey::typed::<$ty>(), name))
            }
        }
    };
}

primitive_arg!(bool, PrimitiveKind::Bool);
primitive_arg!(i8, PrimitiveKind::I8);
primitive_arg!(i16, PrimitiveKind::I16);
primitive_arg!(i32, PrimitiveKind::I32);
primitive_arg!(i64, PrimitiveKind::I64);
primitive_arg!(isize, PrimitiveKind::Int);
primitive_arg!(u8, PrimitiveKind::U8);
primitive_arg!(u16, PrimitiveKind::U16);
primitive_arg!(u32, PrimitiveKind::U32);
primitive_arg!(u64, PrimitiveKind::U64);
primitive_arg!(usize, PrimitiveKind::Uint);
primitive_arg!(String, PrimitiveKind::Str);

/// The collected wire arguments of a spec-driven call, handed to the
/// receiver callback on the host side.
#[derive(Clone, Debug, Default)]
pub struct CallArgs(pub Vec<WireValue>);

impl FuncArg for CallArgs {
    fn params_named(_name: Option<&str>) -> Vec<ParamSpec> {
        vec![ParamSpec::ambient::<CallArgs>()]
    }

    fn extract_named(set: &ValueSet, _name: Option<&str>) -> Result<Self, FuncError> {
        set.extract_cloned::<CallArgs>(&ValueKey::typed::<CallArgs>())
    }
}

/// Implements [`FuncArg`] for a cloneable ambient type the host injects
/// into every call.
#[macro_export]
macro_rules! ambient_arg {
    ($ty:ty) => {
        impl $crate::FuncArg for $ty {
            fn params_named(name: Option<&str>) -> Vec<$crate::ParamSpec> {
                let _ = name;
                vec![$crate::ParamSpec::ambient::<$ty>()]
            }

            fn extract_named(
                set: &$crate::ValueSet,
                name: Option<&str>,
            ) -> Result<Self, $crate::FuncError> {
                let _ = name;
                set.extract_cloned::<$ty>(&$crate::ValueKey::typed::<$ty>())
            }
        }
    };
}

/// Implements [`FuncArg`] and [`FuncOutput`] for a cloneable type that is
/// produced by a converter rather than supplied by the host directly.
#[macro_export]
macro_rules! derived_value {
    ($ty:ty) => {
        impl $crate::FuncArg for $ty {
            fn params_named(name: Option<&str>) -> Vec<$crate::ParamSpec> {
                let _ = name;
                vec![$crate::ParamSpec::derived::<$ty>()]
            }

            fn extract_named(
                set: &$crate::ValueSet,
                name: Option<&str>,
            ) -> Result<Self, $crate::FuncError> {
                let _ = name;
                set.extract_cloned::<$ty>(&$crate::ValueKey::typed::<$ty>())
            }
        }

        impl $crate::FuncOutput for $ty {
            fn output_params() -> Vec<$crate::ParamSpec> {
                vec![$crate::ParamSpec::derived::<$ty>()]
            }

            fn into_values(self) -> Vec<$crate::TypedValue> {
                vec![$crate::TypedValue::of(self)]
            }
        }
    };
}

/// Defines a field-named parameter struct.
///
/// Each field becomes its own advertised slot named after the field, so a
/// function can take one struct where it would otherwise take several
/// identically-typed primitives.
///
/// # Example
///
/// ```
/// use gantry_funcspec::{arg_struct, FuncArg};
///
/// arg_struct! {
///     pub struct ScaleInput {
///         replicas: i64,
///         force: bool,
///     }
/// }
///
/// let params = ScaleInput::params();
/// assert_eq!(params.len(), 2);
/// assert_eq!(params[0].key().name(), Some("replicas"));
/// ```
#[macro_export]
macro_rules! arg_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($field:ident: $ty:ty),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        $vis struct $name {
            $(
                /// Field slot, advertised under its own name.
                $vis $field: $ty,
            )+
        }

        impl $crate::FuncArg for $name {
            fn params_named(name: Option<&str>) -> Vec<$crate::ParamSpec> {
                let _ = name;
                let mut params = Vec::new();
                $(
                    params.extend(
                        <$ty as $crate::FuncArg>::params_named(Some(stringify!($field))),
                    );
                )+
                params
            }

            fn extract_named(
                set: &$crate::ValueSet,
                name: Option<&str>,
            ) -> Result<Self, $crate::FuncError> {
                let _ = name;
                Ok(Self {
                    $(
                        $field: <$ty as $crate::FuncArg>::extract_named(
                            set,
                            Some(stringify!($field)),
                        )?,
                    )+
                })
            }
        }
    };
}

/// A type usable as the declared result of a dynamic function, other than
/// a plain message.
pub trait FuncOutput: Send + Sync + 'static {
    /// Declares the output slots.
    fn output_params() -> Vec<ParamSpec>;

    /// Converts the value into typed output values.
    fn into_values(self) -> Vec<TypedValue>;
}

impl FuncOutput for () {
    fn output_params() -> Vec<ParamSpec> {
        Vec::new()
    }

    fn into_values(self) -> Vec<TypedValue> {
        Vec::new()
    }
}

impl FuncOutput for Envelope {
    fn output_params() -> Vec<ParamSpec> {
        vec![ParamSpec::new(
            ValueKey::typed::<Envelope>(),
            ArgClass::Message,
        )]
    }

    fn into_values(self) -> Vec<TypedValue> {
        let key = ValueKey::typed::<Envelope>().with_subtype(self.type_url().to_owned());
        vec![TypedValue::with_key(key, self)]
    }
}

type CallFn = dyn Fn(&ValueSet) -> Result<Vec<TypedValue>, FuncError> + Send + Sync;

/// A dynamic function: a closure plus its declared inputs and outputs.
#[derive(Clone)]
pub struct FuncDef {
    name: String,
    inputs: Vec<ParamSpec>,
    outputs: Vec<ParamSpec>,
    call: Arc<CallFn>,
}

impl FuncDef {
    /// Converts a typed closure into a `FuncDef`.
    ///
    /// Every parameter must implement [`FuncArg`]; the return type must be
    /// one of the supported result shapes (a message, a [`FuncOutput`],
    /// unit, or a `Result` of any of those).
    pub fn from_fn<F, Marker>(name: impl Into<String>, f: F) -> Self
    where
        F: IntoFunc<Marker>,
    {
        f.into_func(name.into())
    }

    /// Builds a `FuncDef` from raw parts. Engine code only; typed closures
    /// should use [`FuncDef::from_fn`].
    pub fn raw(
        name: impl Into<String>,
        inputs: Vec<ParamSpec>,
        outputs: Vec<ParamSpec>,
        call: impl Fn(&ValueSet) -> Result<Vec<TypedValue>, FuncError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            inputs,
            outputs,
            call: Arc::new(call),
        }
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared parameter slots.
    #[must_use]
    pub fn inputs(&self) -> &[ParamSpec] {
        &self.inputs
    }

    /// Returns the declared result slots.
    #[must_use]
    pub fn outputs(&self) -> &[ParamSpec] {
        &self.outputs
    }

    /// Invokes the closure against an already-resolved value set.
    ///
    /// # Errors
    ///
    /// Returns [`FuncError::Unsatisfied`] when a parameter slot has no
    /// value, or the callback's own error wrapped in
    /// [`FuncError::Callback`].
    pub fn invoke(&self, set: &ValueSet) -> Result<Vec<TypedValue>, FuncError> {
        (self.call)(set)
    }

    /// Resolves the function's parameters from the given values, applying
    /// converters where needed, then invokes it.
    ///
    /// # Errors
    ///
    /// Solver failures ([`FuncError::Unsatisfied`],
    /// [`FuncError::CyclicConversion`], [`FuncError::ConversionFailed`]) or
    /// any invocation failure.
    pub fn call(
        &self,
        args: ValueSet,
        converters: &[FuncDef],
    ) -> Result<Vec<TypedValue>, FuncError> {
        let targets: Vec<ValueKey> = self.inputs.iter().map(|p| p.key().clone()).collect();
        let plan = solver::solve(&targets, &args, converters)?;
        let mut resolved = args;
        plan.execute(&mut resolved)?;
        self.invoke(&resolved)
    }
}

impl std::fmt::Debug for FuncDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuncDef")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// Conversion of a typed closure into a [`FuncDef`].
///
/// The `Marker` parameter disambiguates the supported signature families;
/// it is always inferred.
pub trait IntoFunc<Marker> {
    /// Performs the conversion.
    fn into_func(self, name: String) -> FuncDef;
}

#[doc(hidden)]
pub struct MessageResultMarker;
#[doc(hidden)]
pub struct OutputResultMarker;
#[doc(hidden)]
pub struct InfallibleMessageMarker;
#[doc(hidden)]
pub struct UnitMarker;

macro_rules! impl_into_func {
    ($($arg:ident),*) => {
        impl<F, $($arg,)* M, E> IntoFunc<(MessageResultMarker, ($($arg,)*), M, E)> for F
        where
            F: Fn($($arg),*) -> Result<M, E> + Send + Sync + 'static,
            $($arg: FuncArg,)*
            M: Message,
            E: std::error::Error + Send + Sync + 'static,
        {
            fn into_func(self, name: String) -> FuncDef {
                #[allow(unused_mut)]
                let mut inputs = Vec::new();
                $(inputs.extend($arg::params());)*
                let outputs = vec![ParamSpec::message::<M>()];
                FuncDef::raw(name, inputs, outputs, move |set| {
                    let result = (self)($($arg::extract(set)?),*).map_err(FuncError::callback)?;
                    let key = ValueKey::typed::<M>().with_subtype(M::TYPE_URL);
                    Ok(vec![TypedValue::with_key(key, result)])
                })
            }
        }

        impl<F, $($arg,)* O, E> IntoFunc<(OutputResultMarker, ($($arg,)*), O, E)> for F
        where
            F: Fn($($arg),*) -> Result<O, E> + Send + Sync + 'static,
            $($arg: FuncArg,)*
            O: FuncOutput,
            E: std::error::Error + Send + Sync + 'static,
        {
            fn into_func(self, name: String) -> FuncDef {
                #[allow(unused_mut)]
                let mut inputs = Vec::new();
                $(inputs.extend($arg::params());)*
                let outputs = O::output_params();
                FuncDef::raw(name, inputs, outputs, move |set| {
                    let result = (self)($($arg::extract(set)?),*).map_err(FuncError::callback)?;
                    Ok(result.into_values())
                })
            }
        }

        impl<F, $($arg,)* M> IntoFunc<(InfallibleMessageMarker, ($($arg,)*), M)> for F
        where
            F: Fn($($arg),*) -> M + Send + Sync + 'static,
            $($arg: FuncArg,)*
            M: Message,
        {
            fn into_func(self, name: String) -> FuncDef {
                #[allow(unused_mut)]
                let mut inputs = Vec::new();
                $(inputs.extend($arg::params());)*
                let outputs = vec![ParamSpec::message::<M>()];
                FuncDef::raw(name, inputs, outputs, move |set| {
                    let result = (self)($($arg::extract(set)?),*);
                    let key = ValueKey::typed::<M>().with_subtype(M::TYPE_URL);
                    Ok(vec![TypedValue::with_key(key, result)])
                })
            }
        }

        impl<F, $($arg),*> IntoFunc<(UnitMarker, ($($arg,)*))> for F
        where
            F: Fn($($arg),*) + Send + Sync + 'static,
            $($arg: FuncArg,)*
        {
            fn into_func(self, name: String) -> FuncDef {
                #[allow(unused_mut)]
                let mut inputs = Vec::new();
                $(inputs.extend($arg::params());)*
                FuncDef::raw(name, inputs, Vec::new(), move |set| {
                    (self)($($arg::extract(set)?),*);
                    Ok(Vec::new())
                })
            }
        }
    };
}

impl_into_func!();
impl_into_func!(A1);
impl_into_func!(A1, A2);
impl_into_func!(A1, A2, A3);
impl_into_func!(A1, A2, A3, A4);
impl_into_func!(A1, A2, A3, A4, A5);
impl_into_func!(A1, A2, A3, A4, A5, A6);
impl_into_func!(A1, A2, A3, A4, A5, A6, A7);
impl_into_func!(A1, A2, A3, A4, A5, A6, A7, A8);
