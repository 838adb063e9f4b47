//! Unit tests for spec derivation and spec-driven calls.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use gantry_proto::{Empty, Message};

use super::*;
use crate::derived_value;
use crate::func::FuncDef;
use crate::TypedValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Config {
    region: String,
}

impl Message for Config {
    const TYPE_URL: &'static str = "gantry.test.spec.Config";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Deployment {
    id: String,
}

impl Message for Deployment {
    const TYPE_URL: &'static str = "gantry.test.spec.Deployment";
}

#[derive(Clone, Debug, PartialEq)]
struct CloudClient {
    region: String,
}

derived_value!(CloudClient);

#[derive(Debug, thiserror::Error)]
#[error("spec test error")]
struct TestError;

// ---------------------------------------------------------------------------
// Spec derivation
// ---------------------------------------------------------------------------

#[test]
fn primitive_arg_and_empty_result() {
    let func = FuncDef::from_fn("toggle", |_on: bool| -> Result<Empty, TestError> {
        Ok(Empty {})
    });

    let spec = derive_spec(&func, &SpecOptions::new()).expect("derive");
    assert_eq!(spec.args.len(), 1);
    assert_eq!(
        spec.args[0].kind,
        ArgKind::Primitive {
            primitive: PrimitiveKind::Bool
        }
    );
    assert_eq!(spec.result.len(), 1);
    assert_eq!(
        spec.result[0].kind,
        ArgKind::Message {
            type_url: Empty::TYPE_URL.to_owned()
        }
    );
    assert!(spec.is_mapper());
}

#[test]
fn message_args_are_advertised_with_type_url() {
    let func = FuncDef::from_fn("deploy", |_cfg: Arc<Config>| -> Result<Deployment, TestError> {
        Ok(Deployment { id: "d1".into() })
    });

    let spec = derive_spec(&func, &SpecOptions::new()).expect("derive");
    assert_eq!(
        spec.args[0].kind,
        ArgKind::Message {
            type_url: Config::TYPE_URL.to_owned()
        }
    );
}

#[test]
fn ambient_args_are_not_advertised() {
    let func = FuncDef::from_fn(
        "collect",
        |_args: CallArgs| -> Result<Deployment, TestError> {
            Ok(Deployment { id: "d1".into() })
        },
    );

    let spec = derive_spec(&func, &SpecOptions::new()).expect("derive");
    assert!(spec.args.is_empty());
}

#[test]
fn derived_args_expand_to_converter_leaves() {
    let func = FuncDef::from_fn("deploy", |client: CloudClient| -> Result<Deployment, TestError> {
        Ok(Deployment { id: client.region })
    });
    let converter = FuncDef::from_fn(
        "client_from_config",
        |cfg: Arc<Config>| -> Result<CloudClient, TestError> {
            Ok(CloudClient {
                region: cfg.region.clone(),
            })
        },
    );

    let opts = SpecOptions::new().with_converters(vec![converter]);
    let spec = derive_spec(&func, &opts).expect("derive");

    // The derived CloudClient is advertised as its converter's Config leaf.
    assert_eq!(spec.args.len(), 1);
    assert_eq!(
        spec.args[0].kind,
        ArgKind::Message {
            type_url: Config::TYPE_URL.to_owned()
        }
    );
}

#[test]
fn unreachable_derived_arg_fails_derivation() {
    let func = FuncDef::from_fn("deploy", |client: CloudClient| -> Result<Deployment, TestError> {
        Ok(Deployment { id: client.region })
    });

    let err = derive_spec(&func, &SpecOptions::new()).expect_err("no converter");
    match err {
        FuncError::UnsatisfiedSpec { func, reason } => {
            assert_eq!(func, "deploy");
            assert!(reason.contains("CloudClient"), "reason was: {reason}");
        }
        other => panic!("expected UnsatisfiedSpec, got {other:?}"),
    }
}

#[test]
fn missing_message_result_fails_unless_allowed() {
    let func = FuncDef::from_fn("fire_and_forget", |_on: bool| {});

    let err = derive_spec(&func, &SpecOptions::new()).expect_err("no result");
    assert!(matches!(err, FuncError::UnsatisfiedSpec { .. }));

    let spec = derive_spec(&func, &SpecOptions::new().allow_empty_result()).expect("allowed");
    assert!(spec.result.is_empty());
    assert!(!spec.is_mapper());
}

#[test]
fn duplicate_leaves_are_advertised_once() {
    let func = FuncDef::from_fn(
        "double",
        |a: CloudClient, b: CloudClient| -> Result<Deployment, TestError> {
            let _ = b;
            Ok(Deployment { id: a.region })
        },
    );
    let converter = FuncDef::from_fn(
        "client_from_config",
        |cfg: Arc<Config>| -> Result<CloudClient, TestError> {
            Ok(CloudClient {
                region: cfg.region.clone(),
            })
        },
    );

    let opts = SpecOptions::new().with_converters(vec![converter]);
    let spec = derive_spec(&func, &opts).expect("derive");
    assert_eq!(spec.args.len(), 1);
}

// ---------------------------------------------------------------------------
// Spec-driven calls (host side)
// ---------------------------------------------------------------------------

#[test]
fn direct_call_collects_wire_args_for_the_receiver() {
    let spec = FuncSpec {
        name: "deploy".into(),
        args: vec![
            ArgSpec::message("", Config::TYPE_URL),
            ArgSpec::primitive("replicas", PrimitiveKind::I64),
        ],
        result: Vec::new(),
    };

    let receiver = FuncDef::from_fn("receiver", |args: CallArgs| -> Result<Deployment, TestError> {
        assert_eq!(args.0.len(), 2);
        let WirePayload::Envelope(env) = &args.0[0].payload else {
            panic!("first arg should be an envelope");
        };
        let cfg: Config = env.decode().expect("decode config");
        let WirePayload::Int { value, .. } = &args.0[1].payload else {
            panic!("second arg should be an int");
        };
        Ok(Deployment {
            id: format!("{}x{value}", cfg.region),
        })
    });

    let func = SpecCall::new(spec, receiver).into_func();

    // Inputs: one envelope slot, one named i64 slot.
    assert_eq!(func.inputs().len(), 2);

    let cfg_env = Envelope::encode(&Config {
        region: "eu".into(),
    })
    .expect("encode");
    let mut set = ValueSet::new().with_named("replicas", 3_i64);
    set.insert(TypedValue::with_key(
        ValueKey::typed::<Envelope>().with_subtype(Config::TYPE_URL),
        cfg_env,
    ));

    let outputs = func.invoke(&set).expect("invoke");
    let deployment = outputs[0]
        .value()
        .downcast_ref::<Deployment>()
        .expect("deployment");
    assert_eq!(deployment.id, "eux3");
}

#[test]
fn mapper_call_projects_envelopes_by_type_url() {
    let spec = FuncSpec {
        name: "to_deployment".into(),
        args: vec![ArgSpec::message("", Config::TYPE_URL)],
        result: vec![ArgSpec::message("", Deployment::TYPE_URL)],
    };

    let receiver = FuncDef::from_fn("receiver", |_args: CallArgs| -> Result<Envelope, TestError> {
        Envelope::encode(&Deployment { id: "d9".into() }).map_err(|_| TestError)
    });

    let func = SpecCall::new(spec, receiver).into_func();
    assert_eq!(func.outputs().len(), 1);
    assert_eq!(
        func.outputs()[0].key().subtype(),
        Some(Deployment::TYPE_URL)
    );

    let cfg_env = Envelope::encode(&Config {
        region: "eu".into(),
    })
    .expect("encode");
    let mut set = ValueSet::new();
    set.insert(TypedValue::with_key(
        ValueKey::typed::<Envelope>().with_subtype(Config::TYPE_URL),
        cfg_env,
    ));

    let outputs = func.invoke(&set).expect("invoke");
    assert_eq!(outputs.len(), 1);
    let env = outputs[0]
        .value()
        .downcast_ref::<Envelope>()
        .expect("envelope output");
    assert_eq!(
        env.decode::<Deployment>().expect("decode").id,
        "d9"
    );
}

#[test]
fn mapper_outputs_with_unmatched_type_url_are_dropped() {
    let spec = FuncSpec {
        name: "to_deployment".into(),
        args: Vec::new(),
        result: vec![ArgSpec::message("", Deployment::TYPE_URL)],
    };

    let receiver = FuncDef::from_fn("receiver", |_args: CallArgs| -> Result<Envelope, TestError> {
        // Returns a Config where a Deployment was declared.
        Envelope::encode(&Config {
            region: "eu".into(),
        })
        .map_err(|_| TestError)
    });

    let func = SpecCall::new(spec, receiver).into_func();
    let outputs = func.invoke(&ValueSet::new()).expect("invoke");
    assert!(outputs.is_empty());
}
