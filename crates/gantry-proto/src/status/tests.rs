//! Unit tests for the health enum ordering and rendering.

use rstest::rstest;

use super::*;

#[test]
fn health_order_is_the_defined_severity_order() {
    let mut healths = vec![
        Health::Partial,
        Health::Ready,
        Health::Unknown,
        Health::Down,
        Health::Alive,
        Health::Missing,
    ];
    healths.sort();
    assert_eq!(
        healths,
        vec![
            Health::Unknown,
            Health::Alive,
            Health::Ready,
            Health::Down,
            Health::Missing,
            Health::Partial,
        ]
    );
}

#[rstest]
#[case(Health::Ready, "READY")]
#[case(Health::Down, "DOWN")]
#[case(Health::Alive, "ALIVE")]
#[case(Health::Partial, "PARTIAL")]
fn health_displays_uppercase(#[case] health: Health, #[case] expected: &str) {
    assert_eq!(health.to_string(), expected);
}

#[test]
fn health_parses_case_insensitively() {
    let parsed: Health = "ready".parse().expect("parse");
    assert_eq!(parsed, Health::Ready);
}
