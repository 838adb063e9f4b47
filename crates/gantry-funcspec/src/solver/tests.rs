//! Unit tests for the argument-mapper solver.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use gantry_proto::Message;

use super::*;
use crate::derived_value;
use crate::func::FuncDef;
use crate::value::{TypedValue, ValueKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SourceMsg {
    v: i64,
}

impl Message for SourceMsg {
    const TYPE_URL: &'static str = "gantry.test.solver.Source";
}

#[derive(Clone, Debug, PartialEq)]
struct StageOne(i64);
#[derive(Clone, Debug, PartialEq)]
struct StageTwo(i64);
#[derive(Clone, Debug, PartialEq)]
struct Unreachable;

derived_value!(StageOne);
derived_value!(StageTwo);
derived_value!(Unreachable);

#[derive(Debug, thiserror::Error)]
#[error("conversion blew up")]
struct ConvError;

fn source_value(v: i64) -> TypedValue {
    TypedValue::with_key(
        ValueKey::typed::<SourceMsg>().with_subtype(SourceMsg::TYPE_URL),
        SourceMsg { v },
    )
}

fn msg_to_one() -> FuncDef {
    FuncDef::from_fn("msg_to_one", |m: Arc<SourceMsg>| -> Result<StageOne, ConvError> {
        Ok(StageOne(m.v))
    })
}

fn one_to_two() -> FuncDef {
    FuncDef::from_fn("one_to_two", |one: StageOne| -> Result<StageTwo, ConvError> {
        Ok(StageTwo(one.0 * 2))
    })
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[test]
fn already_available_slots_need_no_steps() {
    let set = ValueSet::new().with(StageOne(1));
    let plan = solve(&[ValueKey::typed::<StageOne>()], &set, &[msg_to_one()]).expect("solve");
    assert!(plan.is_empty());
}

#[test]
fn single_converter_chain() {
    let mut set = ValueSet::new();
    set.insert(source_value(21));

    let plan = solve(&[ValueKey::typed::<StageOne>()], &set, &[msg_to_one()]).expect("solve");
    assert_eq!(plan.steps().len(), 1);

    let mut resolved = set;
    plan.execute(&mut resolved).expect("execute");
    let one: StageOne = resolved
        .extract_cloned(&ValueKey::typed::<StageOne>())
        .expect("stage one");
    assert_eq!(one, StageOne(21));
}

#[test]
fn two_step_chain_executes_in_dependency_order() {
    let mut set = ValueSet::new();
    set.insert(source_value(21));

    // Deliberately register the dependent converter first.
    let converters = [one_to_two(), msg_to_one()];
    let plan = solve(&[ValueKey::typed::<StageTwo>()], &set, &converters).expect("solve");

    let names: Vec<&str> = plan.steps().iter().map(FuncDef::name).collect();
    assert_eq!(names, vec!["msg_to_one", "one_to_two"]);

    let mut resolved = set;
    plan.execute(&mut resolved).expect("execute");
    let two: StageTwo = resolved
        .extract_cloned(&ValueKey::typed::<StageTwo>())
        .expect("stage two");
    assert_eq!(two, StageTwo(42));
}

#[test]
fn earlier_registration_wins_on_ambiguity() {
    let mut set = ValueSet::new();
    set.insert(source_value(1));

    let preferred = FuncDef::from_fn("preferred", |m: Arc<SourceMsg>| -> Result<StageOne, ConvError> {
        Ok(StageOne(m.v))
    });
    let shadowed = FuncDef::from_fn("shadowed", |m: Arc<SourceMsg>| -> Result<StageOne, ConvError> {
        Ok(StageOne(m.v + 100))
    });

    let plan = solve(
        &[ValueKey::typed::<StageOne>()],
        &set,
        &[preferred, shadowed],
    )
    .expect("solve");
    assert_eq!(plan.steps().len(), 1);
    assert_eq!(plan.steps()[0].name(), "preferred");
}

// ---------------------------------------------------------------------------
// Func-once discipline
// ---------------------------------------------------------------------------

#[test]
fn shared_converter_runs_once_for_multiple_slots() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let counting = FuncDef::from_fn("counting", move |m: Arc<SourceMsg>| -> Result<StageOne, ConvError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(StageOne(m.v))
    });

    let consumer_a = FuncDef::from_fn("consumer_a", |one: StageOne| -> Result<StageTwo, ConvError> {
        Ok(StageTwo(one.0))
    });

    let mut set = ValueSet::new();
    set.insert(source_value(7));

    // Both targets depend on `counting`'s output, directly and transitively.
    let plan = solve(
        &[ValueKey::typed::<StageOne>(), ValueKey::typed::<StageTwo>()],
        &set,
        &[counting, consumer_a],
    )
    .expect("solve");

    let mut resolved = set;
    plan.execute(&mut resolved).expect("execute");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Failure modes
// ---------------------------------------------------------------------------

#[test]
fn missing_leaf_is_named_in_the_error() {
    // Converter exists but its own input is missing from the set: the
    // error must name the missing leaf, not the requested slot.
    let set = ValueSet::new();
    let err = solve(&[ValueKey::typed::<StageOne>()], &set, &[msg_to_one()])
        .expect_err("unsatisfied");
    match err {
        FuncError::Unsatisfied { slot } => {
            assert!(slot.contains("SourceMsg"), "slot was: {slot}");
        }
        other => panic!("expected Unsatisfied, got {other:?}"),
    }
}

#[test]
fn no_candidate_names_the_slot() {
    let set = ValueSet::new();
    let err = solve(&[ValueKey::typed::<Unreachable>()], &set, &[msg_to_one()])
        .expect_err("unsatisfied");
    match err {
        FuncError::Unsatisfied { slot } => assert!(slot.contains("Unreachable")),
        other => panic!("expected Unsatisfied, got {other:?}"),
    }
}

#[test]
fn cycles_are_rejected() {
    let a_to_b = FuncDef::from_fn("a_to_b", |one: StageOne| -> Result<StageTwo, ConvError> {
        Ok(StageTwo(one.0))
    });
    let b_to_a = FuncDef::from_fn("b_to_a", |two: StageTwo| -> Result<StageOne, ConvError> {
        Ok(StageOne(two.0))
    });

    let err = solve(
        &[ValueKey::typed::<StageOne>()],
        &ValueSet::new(),
        &[a_to_b, b_to_a],
    )
    .expect_err("cycle");
    assert!(matches!(err, FuncError::CyclicConversion { .. }));
}

#[test]
fn converter_failure_aborts_the_plan() {
    let failing = FuncDef::from_fn("failing", |_m: Arc<SourceMsg>| -> Result<StageOne, ConvError> {
        Err(ConvError)
    });

    let mut set = ValueSet::new();
    set.insert(source_value(1));

    let plan = solve(&[ValueKey::typed::<StageOne>()], &set, &[failing]).expect("solve");
    let err = plan.execute(&mut set).expect_err("conversion failed");
    match err {
        FuncError::ConversionFailed { converter, source } => {
            assert_eq!(converter, "failing");
            assert!(source.to_string().contains("blew up"));
        }
        other => panic!("expected ConversionFailed, got {other:?}"),
    }
}
