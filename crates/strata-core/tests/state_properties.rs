//! Property tests for state container copy, export, and reset semantics.

use proptest::prelude::*;
use serde_json::{Map, Value, json};
use strata_core::clock::{ClockSpec, SteppingClock};
use strata_core::entropy::DeterministicRng;
use strata_core::task::NOT_EXECUTED;
use strata_core::{StateContainer, StateError, VersionedValue};

fn clock() -> SteppingClock {
    SteppingClock::new(ClockSpec {
        base_millis: 1_700_000_000_000,
        step_millis: 1_000,
    })
}

/// Container after `changes` random mutations drawn from `seed`.
fn mutated(seed: u64, changes: usize) -> StateContainer {
    let clock = clock();
    let mut rng = DeterministicRng::new(seed);
    let mut container = StateContainer::new();
    for i in 0..changes {
        container.make_random_changes(&format!("caller-{i}"), &mut rng, &clock);
    }
    container
}

fn arb_value() -> impl Strategy<Value = VersionedValue> {
    (any::<i64>(), "[a-z0-9@ :.-]{0,24}", prop::collection::vec(any::<i64>(), 0..8))
        .prop_map(|(a, b, c)| VersionedValue::new(a, b, c))
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn construction_defaults() {
    let c = StateContainer::new();
    assert_eq!(c.primary(), &VersionedValue::new(1, "default", vec![1, 2, 3, 4]));
    assert!(c.items().is_empty());
    assert!(c.tagged().is_empty());
    assert_eq!(c.task().output(), NOT_EXECUTED);
}

#[test]
fn shared_task_aliasing() {
    let g = StateContainer::new();
    let s = StateContainer::with_task(g.task().clone());
    s.task().run(&clock());
    assert_eq!(g.task().output(), s.task().output());
    assert!(g.task().output().starts_with("done at "));
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn random_changes_grow_by_exactly_one(seed in any::<u64>(), prior in 0usize..12) {
        let clock = clock();
        let mut rng = DeterministicRng::new(seed.wrapping_add(1));
        let mut c = mutated(seed, prior);
        let items_before = c.items().len();
        let tagged_before = c.tagged().len();
        let primary_before = c.primary().clone();

        let change = c.make_random_changes("x", &mut rng, &clock);

        prop_assert_eq!(c.items().len(), items_before + 1);
        if change.replaced_existing {
            prop_assert_eq!(c.tagged().len(), tagged_before);
        } else {
            prop_assert_eq!(c.tagged().len(), tagged_before + 1);
        }
        // caller names differ, so the label always changes
        prop_assert_ne!(c.primary(), &primary_before);
    }

    #[test]
    fn export_reset_round_trip(seed in any::<u64>(), changes in 0usize..10) {
        let c = mutated(seed, changes);
        let mut c2 = StateContainer::with_task(c.task().clone());
        c2.reset_from_export(&c.export().to_map()).expect("round trip");

        prop_assert_eq!(c2.primary(), c.primary());
        prop_assert_eq!(c2.items(), c.items());
        prop_assert_eq!(c2.tagged(), c.tagged());
        prop_assert!(c2.task().ptr_eq(c.task()));
    }

    #[test]
    fn deep_copy_independence(seed in any::<u64>(), changes in 0usize..10) {
        let clock = clock();
        let mut rng = DeterministicRng::new(!seed);
        let c = mutated(seed, changes);
        let before = c.export();

        let mut d = c.deep_copy();
        d.make_random_changes("y", &mut rng, &clock);

        prop_assert_eq!(Some(c.primary().clone()), before.primary);
        prop_assert_eq!(Some(c.items().to_vec()), before.items);
        prop_assert_eq!(Some(c.tagged().clone()), before.tagged);
        prop_assert_eq!(c.task().output(), d.task().output());
    }

    #[test]
    fn partial_reset_preserves_unspecified_fields(
        seed in any::<u64>(),
        changes in 1usize..8,
        primary in arb_value(),
    ) {
        let mut c = mutated(seed, changes);
        let items = c.items().to_vec();
        let tagged = c.tagged().clone();

        c.reset_from_export(&object(json!({ "primary": primary }))).expect("valid primary");

        prop_assert_eq!(c.primary(), &primary);
        prop_assert_eq!(c.items(), items.as_slice());
        prop_assert_eq!(c.tagged(), &tagged);
    }

    #[test]
    fn malformed_input_rejection(seed in any::<u64>(), changes in 0usize..8, bad in "[a-z]{1,12}") {
        let mut c = mutated(seed, changes);
        let before = c.export();

        let err = c
            .reset_from_export(&object(json!({ "primary": { "a": bad, "b": "x" } })))
            .expect_err("non-integer a must be rejected");

        let is_validation = matches!(err, StateError::Validation { .. });
        prop_assert!(is_validation);
        prop_assert_eq!(c.export(), before);
    }

    #[test]
    fn reset_never_replaces_task(seed in any::<u64>(), task_text in ".{0,40}") {
        let c = mutated(seed, 3);
        let mut form = c.export().to_map();
        form.insert("task".to_string(), Value::String(task_text));

        let fresh = StateContainer::new();
        let mut target = fresh.deep_copy();
        target.reset_from_export(&form).expect("valid form");
        prop_assert!(target.task().ptr_eq(fresh.task()));
        prop_assert_eq!(target.task().output(), NOT_EXECUTED);
    }
}
