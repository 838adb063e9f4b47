//! Server-side dynamic invocation.
//!
//! [`call_dynamic`] is how a plugin server executes an operation with
//! host-supplied wire arguments: each [`WireValue`] is decoded into a typed
//! value (messages through the process type registry, primitives at their
//! exact tagged width), the solver covers the function's parameters with
//! converters where needed, and the function runs.

use gantry_proto::{registry, EnvelopeError, FuncArgs, PrimitiveKind, WirePayload, WireValue};

use crate::error::FuncError;
use crate::func::{ArgClass, FuncDef};
use crate::set::ValueSet;
use crate::value::{TypedValue, ValueKey};

/// Decodes wire arguments and invokes a function with them.
///
/// `ambient` carries the host-injected values (logger, cancellation handle,
/// broker internals); wire arguments are appended to it before solving.
///
/// # Errors
///
/// - [`FuncError::UnknownType`] when a message argument's type URL is not
///   registered on this side.
/// - [`FuncError::TypeMismatch`] when a named argument's subtype disagrees
///   with the declared parameter.
/// - [`FuncError::PrimitiveWidthMismatch`] when an integer argument was
///   supplied at a different width than the parameter requires.
/// - Solver and callback failures from the invocation itself.
pub fn call_dynamic(
    func: &FuncDef,
    args: &FuncArgs,
    ambient: ValueSet,
    converters: &[FuncDef],
) -> Result<Vec<TypedValue>, FuncError> {
    let mut set = ambient;
    for wire in &args.args {
        set.insert(decode_wire_value(wire)?);
    }

    match func.call(set, converters) {
        Err(FuncError::Unsatisfied { slot }) => Err(refine_unsatisfied(func, &args.args, &slot)),
        other => other,
    }
}

/// Decodes a single wire value into a typed runtime value.
///
/// # Errors
///
/// Returns [`FuncError::UnknownType`] for unregistered message payloads and
/// [`FuncError::InvalidArgs`] for malformed primitive payloads.
pub fn decode_wire_value(wire: &WireValue) -> Result<TypedValue, FuncError> {
    let name = (!wire.name.is_empty()).then(|| wire.name.clone());

    match &wire.payload {
        WirePayload::Envelope(envelope) => {
            let erased = registry::decode_dyn(envelope).map_err(|err| match err {
                EnvelopeError::UnknownType { type_url } => FuncError::UnknownType { type_url },
                other => FuncError::Envelope(other),
            })?;
            let type_name = registry::type_name_for_url(envelope.type_url())
                .unwrap_or("<registered message>");
            let key = ValueKey::from_parts(
                erased.as_ref().type_id(),
                type_name,
                name,
                Some(envelope.type_url().to_owned()),
            );
            Ok(TypedValue::from_erased(key, erased))
        }
        WirePayload::Bool(value) => Ok(named_value(*value, name)),
        WirePayload::Int { primitive, value } => decode_int(*primitive, *value, name),
        WirePayload::Uint { primitive, value } => decode_uint(*primitive, *value, name),
        WirePayload::Str(value) => Ok(named_value(value.clone(), name)),
    }
}

fn named_value<T: Send + Sync + 'static>(value: T, name: Option<String>) -> TypedValue {
    let mut key = ValueKey::typed::<T>();
    if let Some(name) = name {
        key = key.with_name(name);
    }
    TypedValue::from_erased(key, std::sync::Arc::new(value))
}

fn decode_int(
    primitive: PrimitiveKind,
    value: i64,
    name: Option<String>,
) -> Result<TypedValue, FuncError> {
    let out_of_range = || FuncError::InvalidArgs {
        message: format!("integer {value} does not fit declared width {primitive}"),
    };
    match primitive {
        PrimitiveKind::I8 => i8::try_from(value)
            .map(|v| named_value(v, name))
            .map_err(|_| out_of_range()),
        PrimitiveKind::I16 => i16::try_from(value)
            .map(|v| named_value(v, name))
            .map_err(|_| out_of_range()),
        PrimitiveKind::I32 => i32::try_from(value)
            .map(|v| named_value(v, name))
            .map_err(|_| out_of_range()),
        PrimitiveKind::I64 => Ok(named_value(value, name)),
        PrimitiveKind::Int => isize::try_from(value)
            .map(|v| named_value(v, name))
            .map_err(|_| out_of_range()),
        other => Err(FuncError::InvalidArgs {
            message: format!("signed payload tagged with non-signed width {other}"),
        }),
    }
}

fn decode_uint(
    primitive: PrimitiveKind,
    value: u64,
    name: Option<String>,
) -> Result<TypedValue, FuncError> {
    let out_of_range = || FuncError::InvalidArgs {
        message: format!("integer {value} does not fit declared width {primitive}"),
    };
    match primitive {
        PrimitiveKind::U8 => u8::try_from(value)
            .map(|v| named_value(v, name))
            .map_err(|_| out_of_range()),
        PrimitiveKind::U16 => u16::try_from(value)
            .map(|v| named_value(v, name))
            .map_err(|_| out_of_range()),
        PrimitiveKind::U32 => u32::try_from(value)
            .map(|v| named_value(v, name))
            .map_err(|_| out_of_range()),
        PrimitiveKind::U64 => Ok(named_value(value, name)),
        PrimitiveKind::Uint => usize::try_from(value)
            .map(|v| named_value(v, name))
            .map_err(|_| out_of_range()),
        other => Err(FuncError::InvalidArgs {
            message: format!("unsigned payload tagged with non-unsigned width {other}"),
        }),
    }
}

/// Upgrades a bare unsatisfied-slot failure to a more specific mismatch
/// error when the wire arguments show what went wrong.
fn refine_unsatisfied(func: &FuncDef, args: &[WireValue], slot: &str) -> FuncError {
    for param in func.inputs() {
        if param.key().to_string() != slot {
            continue;
        }
        let param_name = param.key().name().unwrap_or("");

        match param.class() {
            ArgClass::Primitive(expected)
                if expected.is_signed_int() || expected.is_unsigned_int() =>
            {
                for arg in args {
                    let actual = match &arg.payload {
                        WirePayload::Int { primitive, .. }
                        | WirePayload::Uint { primitive, .. } => *primitive,
                        _ => continue,
                    };
                    let name_matches = param_name.is_empty() || arg.name == param_name;
                    let same_category = (expected.is_signed_int() && actual.is_signed_int())
                        || (expected.is_unsigned_int() && actual.is_unsigned_int());
                    if name_matches && same_category && actual != expected {
                        return FuncError::PrimitiveWidthMismatch {
                            name: arg.name.clone(),
                            expected,
                            actual,
                        };
                    }
                }
            }
            ArgClass::Message => {
                let expected = param.key().subtype().unwrap_or("");
                for arg in args {
                    if !matches!(arg.payload, WirePayload::Envelope(_)) {
                        continue;
                    }
                    let name_matches = !param_name.is_empty() && arg.name == param_name;
                    if name_matches && arg.subtype != expected {
                        return FuncError::TypeMismatch {
                            name: arg.name.clone(),
                            expected: expected.to_owned(),
                            actual: arg.subtype.clone(),
                        };
                    }
                }
            }
            _ => {}
        }
    }

    FuncError::Unsatisfied {
        slot: slot.to_owned(),
    }
}
