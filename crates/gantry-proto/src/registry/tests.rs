//! Unit tests for the process-wide type registry.

use std::any::TypeId;

use serde::{Deserialize, Serialize};

use super::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Release {
    url: String,
}

impl Message for Release {
    const TYPE_URL: &'static str = "gantry.test.registry.Release";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Impostor {
    url: String,
}

impl Message for Impostor {
    // Deliberately collides with Release for the conflict test.
    const TYPE_URL: &'static str = "gantry.test.registry.Release";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Unregistered {
    n: u8,
}

impl Message for Unregistered {
    const TYPE_URL: &'static str = "gantry.test.registry.Unregistered";
}

#[test]
fn register_is_idempotent() {
    register::<Release>().expect("first registration");
    register::<Release>().expect("second registration is a no-op");
    assert!(is_registered(Release::TYPE_URL));
}

#[test]
fn register_rejects_conflicting_type() {
    register::<Release>().expect("register release");
    let err = register::<Impostor>().expect_err("conflict should fail");
    assert!(matches!(err, EnvelopeError::RegistrationConflict { .. }));
}

#[test]
fn decode_dyn_produces_concrete_type() {
    register::<Release>().expect("register");
    let msg = Release {
        url: "https://app".into(),
    };
    let env = Envelope::encode(&msg).expect("encode");

    let erased = decode_dyn(&env).expect("decode_dyn");
    let back = erased.downcast_ref::<Release>().expect("downcast");
    assert_eq!(*back, msg);
}

#[test]
fn decode_dyn_rejects_unknown_type() {
    let env = Envelope::from_parts("gantry.test.registry.Nope", b"{}".to_vec());
    let err = decode_dyn(&env).expect_err("unknown type");
    assert!(matches!(err, EnvelopeError::UnknownType { .. }));
}

#[test]
fn encode_dyn_round_trips_through_registration() {
    register::<Release>().expect("register");
    let msg = Release {
        url: "https://app".into(),
    };
    let erased: ErasedValue = std::sync::Arc::new(msg.clone());

    let env = encode_dyn(erased.as_ref()).expect("encode_dyn");
    assert_eq!(env.type_url(), Release::TYPE_URL);
    assert_eq!(env.decode::<Release>().expect("decode"), msg);

    let json = render_json_dyn(erased.as_ref()).expect("render_json_dyn");
    assert!(json.contains("https://app"));
}

#[test]
fn encode_dyn_rejects_unregistered_value() {
    let erased: ErasedValue = std::sync::Arc::new(Unregistered { n: 1 });
    let err = encode_dyn(erased.as_ref()).expect_err("unregistered");
    assert!(matches!(err, EnvelopeError::UnregisteredType { .. }));
}

#[test]
fn type_url_lookup_by_type_id() {
    register::<Release>().expect("register");
    assert_eq!(
        type_url_for(TypeId::of::<Release>()),
        Some(Release::TYPE_URL)
    );
    assert_eq!(type_url_for(TypeId::of::<u128>()), None);
}
