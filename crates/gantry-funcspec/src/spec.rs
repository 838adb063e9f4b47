//! Spec derivation and spec-driven call construction.
//!
//! [`derive_spec`] turns a [`FuncDef`] into the wire [`FuncSpec`] a plugin
//! advertises: messages and primitives become argument slots, ambient
//! values are omitted (the host injects them locally), and derived values
//! are chased through the registered converters down to advertisable
//! leaves. [`SpecCall`] is the other direction: the host holds a received
//! spec and a receiver callback, and reconstructs a callable function whose
//! advertised slots collect into [`CallArgs`] for the receiver to ship over
//! the wire.

use gantry_proto::{ArgKind, ArgSpec, Envelope, FuncSpec, PrimitiveKind, WirePayload, WireValue};

use crate::error::FuncError;
use crate::func::{ArgClass, CallArgs, FuncDef, ParamSpec};
use crate::set::ValueSet;
use crate::value::{TypedValue, ValueKey};

/// Options controlling spec derivation.
#[derive(Clone, Debug, Default)]
pub struct SpecOptions {
    converters: Vec<FuncDef>,
    allow_empty_result: bool,
}

impl SpecOptions {
    /// Creates the default options: no converters, message result required.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers converters used to reach derived parameter types.
    #[must_use]
    pub fn with_converters(mut self, converters: Vec<FuncDef>) -> Self {
        self.converters = converters;
        self
    }

    /// Permits functions with no message result (used by operations whose
    /// result is delivered out-of-band, like status probes).
    #[must_use]
    pub const fn allow_empty_result(mut self) -> Self {
        self.allow_empty_result = true;
        self
    }
}

/// Derives the wire spec advertised for a function.
///
/// # Errors
///
/// Returns [`FuncError::UnsatisfiedSpec`] when a derived parameter cannot
/// be reached through any converter chain, or when the function produces no
/// message result and the options did not allow that.
pub fn derive_spec(func: &FuncDef, opts: &SpecOptions) -> Result<FuncSpec, FuncError> {
    let mut args: Vec<ArgSpec> = Vec::new();
    for param in func.inputs() {
        let mut stack = Vec::new();
        advertise(func.name(), param, &opts.converters, &mut args, &mut stack)?;
    }
    let mut seen: Vec<ArgSpec> = Vec::with_capacity(args.len());
    for arg in args {
        if !seen.contains(&arg) {
            seen.push(arg);
        }
    }
    let args = seen;

    let result: Vec<ArgSpec> = func
        .outputs()
        .iter()
        .filter(|out| out.class() == ArgClass::Message)
        .filter_map(|out| {
            out.key()
                .subtype()
                .map(|subtype| ArgSpec::message(out.key().name().unwrap_or(""), subtype))
        })
        .collect();

    if result.is_empty() && !opts.allow_empty_result {
        return Err(FuncError::UnsatisfiedSpec {
            func: func.name().to_owned(),
            reason: String::from("function produces no message result"),
        });
    }

    Ok(FuncSpec {
        name: func.name().to_owned(),
        args,
        result,
    })
}

fn advertise(
    func_name: &str,
    param: &ParamSpec,
    converters: &[FuncDef],
    args: &mut Vec<ArgSpec>,
    stack: &mut Vec<usize>,
) -> Result<(), FuncError> {
    let name = param.key().name().unwrap_or("");
    match param.class() {
        ArgClass::Message => {
            let subtype = param.key().subtype().unwrap_or("");
            args.push(ArgSpec::message(name, subtype));
            Ok(())
        }
        ArgClass::Primitive(kind) => {
            args.push(ArgSpec::primitive(name, kind));
            Ok(())
        }
        ArgClass::Ambient => Ok(()),
        ArgClass::Derived => {
            for (idx, converter) in converters.iter().enumerate() {
                let produces = converter
                    .outputs()
                    .iter()
                    .any(|out| out.key().satisfies(param.key()));
                if !produces || stack.contains(&idx) {
                    continue;
                }
                stack.push(idx);
                let result: Result<(), FuncError> = converter
                    .inputs()
                    .iter()
                    .try_for_each(|input| advertise(func_name, input, converters, args, stack));
                stack.pop();
                if result.is_ok() {
                    return Ok(());
                }
            }
            Err(FuncError::UnsatisfiedSpec {
                func: func_name.to_owned(),
                reason: format!("no converter path reaches required value {}", param.key()),
            })
        }
    }
}

/// A received spec paired with a receiver callback, reconstructed into a
/// callable function on the host side.
///
/// The constructed function's inputs are the receiver's ambient inputs plus
/// one wire-typed slot per advertised argument: primitives keep their
/// concrete type, messages stay [`Envelope`] slots tagged with their type
/// URL (the host never decodes plugin-private payloads). At call time the
/// advertised slots collect into a [`CallArgs`] for the receiver.
#[derive(Clone, Debug)]
pub struct SpecCall {
    spec: FuncSpec,
    receiver: FuncDef,
}

impl SpecCall {
    /// Pairs a spec with a receiver callback.
    #[must_use]
    pub fn new(spec: FuncSpec, receiver: FuncDef) -> Self {
        Self { spec, receiver }
    }

    /// Builds the callable function.
    #[must_use]
    pub fn into_func(self) -> FuncDef {
        let Self { spec, receiver } = self;

        let call_args_key = ValueKey::typed::<CallArgs>();
        let mut inputs: Vec<ParamSpec> = receiver
            .inputs()
            .iter()
            .filter(|p| *p.key() != call_args_key)
            .cloned()
            .collect();
        for arg in &spec.args {
            inputs.push(wire_slot(arg));
        }

        let mapper_mode = spec.is_mapper();
        let outputs: Vec<ParamSpec> = if mapper_mode {
            spec.result.iter().map(result_slot).collect()
        } else {
            receiver.outputs().to_vec()
        };

        let arg_specs = spec.args.clone();
        let result_specs = spec.result.clone();
        let name = spec.name.clone();
        let inner = receiver;

        FuncDef::raw(name, inputs, outputs, move |set| {
            let mut wire_args = Vec::with_capacity(arg_specs.len());
            for arg in &arg_specs {
                wire_args.push(collect_wire_value(set, arg)?);
            }

            let mut child = set.clone();
            child.insert(TypedValue::of(CallArgs(wire_args)));
            let produced = inner.invoke(&child)?;

            if !mapper_mode {
                return Ok(produced);
            }

            // Mapper mode: project envelope outputs into the declared
            // result slots by type URL. Last write wins on a shared URL.
            let mut projected: Vec<Option<TypedValue>> = vec![None; result_specs.len()];
            for value in produced {
                let Some(subtype) = value.key().subtype().map(ToOwned::to_owned) else {
                    continue;
                };
                for (idx, result) in result_specs.iter().enumerate() {
                    let ArgKind::Message { type_url } = &result.kind else {
                        continue;
                    };
                    if *type_url == subtype {
                        let key = result_slot(result).key().clone();
                        projected[idx] =
                            Some(TypedValue::from_erased(key, value.value_arc()));
                    }
                }
            }
            Ok(projected.into_iter().flatten().collect())
        })
    }
}

fn named(key: ValueKey, name: &str) -> ValueKey {
    if name.is_empty() {
        key
    } else {
        key.with_name(name)
    }
}

fn wire_slot(arg: &ArgSpec) -> ParamSpec {
    match &arg.kind {
        ArgKind::Message { type_url } => ParamSpec::new(
            named(
                ValueKey::typed::<Envelope>().with_subtype(type_url.clone()),
                &arg.name,
            ),
            ArgClass::Message,
        ),
        ArgKind::Primitive { primitive } => ParamSpec::new(
            named(primitive_key(*primitive), &arg.name),
            ArgClass::Primitive(*primitive),
        ),
    }
}

fn result_slot(result: &ArgSpec) -> ParamSpec {
    let type_url = match &result.kind {
        ArgKind::Message { type_url } => type_url.clone(),
        ArgKind::Primitive { .. } => String::new(),
    };
    ParamSpec::new(
        named(
            ValueKey::typed::<Envelope>().with_subtype(type_url),
            &result.name,
        ),
        ArgClass::Message,
    )
}

fn primitive_key(kind: PrimitiveKind) -> ValueKey {
    match kind {
        PrimitiveKind::Bool => ValueKey::typed::<bool>(),
        PrimitiveKind::I8 => ValueKey::typed::<i8>(),
        PrimitiveKind::I16 => ValueKey::typed::<i16>(),
        PrimitiveKind::I32 => ValueKey::typed::<i32>(),
        PrimitiveKind::I64 => ValueKey::typed::<i64>(),
        PrimitiveKind::Int => ValueKey::typed::<isize>(),
        PrimitiveKind::U8 => ValueKey::typed::<u8>(),
        PrimitiveKind::U16 => ValueKey::typed::<u16>(),
        PrimitiveKind::U32 => ValueKey::typed::<u32>(),
        PrimitiveKind::U64 => ValueKey::typed::<u64>(),
        PrimitiveKind::Uint => ValueKey::typed::<usize>(),
        PrimitiveKind::Str => ValueKey::typed::<String>(),
    }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
fn collect_wire_value(set: &ValueSet, arg: &ArgSpec) -> Result<WireValue, FuncError> {
    let slot = wire_slot(arg);
    let payload = match &arg.kind {
        ArgKind::Message { .. } => {
            let envelope: Envelope = set.extract_cloned(slot.key())?;
            WirePayload::Envelope(envelope)
        }
        ArgKind::Primitive { primitive } => match primitive {
            PrimitiveKind::Bool => WirePayload::Bool(set.extract_cloned(slot.key())?),
            PrimitiveKind::I8 => int_payload(set.extract_cloned::<i8>(slot.key())?, *primitive),
            PrimitiveKind::I16 => int_payload(set.extract_cloned::<i16>(slot.key())?, *primitive),
            PrimitiveKind::I32 => int_payload(set.extract_cloned::<i32>(slot.key())?, *primitive),
            PrimitiveKind::I64 => int_payload(set.extract_cloned::<i64>(slot.key())?, *primitive),
            PrimitiveKind::Int => {
                int_payload(set.extract_cloned::<isize>(slot.key())? as i64, *primitive)
            }
            PrimitiveKind::U8 => uint_payload(set.extract_cloned::<u8>(slot.key())?, *primitive),
            PrimitiveKind::U16 => uint_payload(set.extract_cloned::<u16>(slot.key())?, *primitive),
            PrimitiveKind::U32 => uint_payload(set.extract_cloned::<u32>(slot.key())?, *primitive),
            PrimitiveKind::U64 => uint_payload(set.extract_cloned::<u64>(slot.key())?, *primitive),
            PrimitiveKind::Uint => {
                uint_payload(set.extract_cloned::<usize>(slot.key())? as u64, *primitive)
            }
            PrimitiveKind::Str => WirePayload::Str(set.extract_cloned(slot.key())?),
        },
    };

    let subtype = match &arg.kind {
        ArgKind::Message { type_url } => type_url.clone(),
        ArgKind::Primitive { .. } => String::new(),
    };

    Ok(WireValue {
        name: arg.name.clone(),
        subtype,
        payload,
    })
}

fn int_payload(value: impl Into<i64>, primitive: PrimitiveKind) -> WirePayload {
    WirePayload::Int {
        primitive,
        value: value.into(),
    }
}

fn uint_payload(value: impl Into<u64>, primitive: PrimitiveKind) -> WirePayload {
    WirePayload::Uint {
        primitive,
        value: value.into(),
    }
}

#[cfg(test)]
mod tests;
