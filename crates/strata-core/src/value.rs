//! The atomic payload held by every state layer.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::format_timestamp;
use crate::container::StateError;
use crate::entropy::Entropy;

/// Immutable record of an integer, a label, and a list of integers.
///
/// Instances are replaced, never mutated, when a layer changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionedValue {
    pub a: i64,
    pub b: String,
    #[serde(default)]
    pub c: Vec<i64>,
}

impl VersionedValue {
    #[must_use]
    pub fn new(a: i64, b: impl Into<String>, c: Vec<i64>) -> Self {
        Self { a, b: b.into(), c }
    }

    /// Generate a value with `a` drawn from `[0, a_max]`, a
    /// `changed-{caller}@{at}` label, and `c = 0..k` for `k` drawn from `[0, 9]`.
    pub fn random(
        entropy: &mut dyn Entropy,
        a_max: i64,
        caller: &str,
        at: NaiveDateTime,
    ) -> Self {
        let a = entropy.next_in(0, a_max);
        let len = entropy.next_in(0, 9);
        Self {
            a,
            b: changed_label(caller, at),
            c: (0..len).collect(),
        }
    }

    /// Parse one value out of an export form entry.
    ///
    /// `field` names the location (e.g. `items[3]`) reported on failure.
    /// `a` must be an integer, `b` a string, and `c` absent, null, or a list of
    /// integers. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Validation`] when the entry has the wrong shape.
    pub fn from_export(field: &str, raw: &Value) -> Result<Self, StateError> {
        let Some(object) = raw.as_object() else {
            return Err(StateError::validation(field, "expected an object"));
        };

        let a = match object.get("a") {
            None | Some(Value::Null) => {
                return Err(StateError::validation(field, "missing field `a`"));
            }
            Some(v) => v
                .as_i64()
                .ok_or_else(|| StateError::validation(field, "`a` must be an integer"))?,
        };

        let b = match object.get("b") {
            None | Some(Value::Null) => {
                return Err(StateError::validation(field, "missing field `b`"));
            }
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(StateError::validation(field, "`b` must be a string")),
        };

        let c = match object.get("c") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .map(|entry| {
                    entry.as_i64().ok_or_else(|| {
                        StateError::validation(field, "`c` must contain only integers")
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(StateError::validation(field, "`c` must be a list")),
        };

        Ok(Self { a, b, c })
    }
}

impl Default for VersionedValue {
    fn default() -> Self {
        Self {
            a: 1,
            b: "default".to_string(),
            c: vec![1, 2, 3, 4],
        }
    }
}

/// Label stamped on every randomly generated value.
#[must_use]
pub fn changed_label(caller: &str, at: NaiveDateTime) -> String {
    format!("changed-{caller}@{}", format_timestamp(at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, SteppingClock};
    use crate::entropy::DeterministicRng;
    use serde_json::json;

    #[test]
    fn default_value_matches_construction_defaults() {
        let v = VersionedValue::default();
        assert_eq!(v, VersionedValue::new(1, "default", vec![1, 2, 3, 4]));
    }

    #[test]
    fn random_value_respects_ranges() {
        let clock = SteppingClock::fixed(0);
        let mut rng = DeterministicRng::new(3);
        for _ in 0..500 {
            let v = VersionedValue::random(&mut rng, 99, "test", clock.now());
            assert!((0..=99).contains(&v.a));
            assert!(v.c.len() <= 9);
            assert_eq!(v.c, (0..v.c.len() as i64).collect::<Vec<_>>());
            assert_eq!(v.b, "changed-test@1970-01-01 00:00:00.000000");
        }
    }

    #[test]
    fn parses_full_entry() {
        let v = VersionedValue::from_export("primary", &json!({"a": 7, "b": "x", "c": [1, 2]}))
            .expect("valid entry");
        assert_eq!(v, VersionedValue::new(7, "x", vec![1, 2]));
    }

    #[test]
    fn missing_or_null_list_means_empty() {
        let absent = VersionedValue::from_export("primary", &json!({"a": 1, "b": "x"}))
            .expect("absent c is allowed");
        let null = VersionedValue::from_export("primary", &json!({"a": 1, "b": "x", "c": null}))
            .expect("null c is allowed");
        assert!(absent.c.is_empty());
        assert!(null.c.is_empty());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let v = VersionedValue::from_export("primary", &json!({"a": 1, "b": "x", "z": true}))
            .expect("extra keys are fine");
        assert_eq!(v.a, 1);
    }

    #[test]
    fn rejects_bad_shapes() {
        let cases = [
            json!({"b": "x"}),
            json!({"a": 1}),
            json!({"a": "not-an-int", "b": "x"}),
            json!({"a": 1.5, "b": "x"}),
            json!({"a": 1, "b": 2}),
            json!({"a": 1, "b": "x", "c": "nope"}),
            json!({"a": 1, "b": "x", "c": [1, "two"]}),
            json!([1, 2, 3]),
        ];
        for raw in cases {
            let err = VersionedValue::from_export("primary", &raw).expect_err("must reject");
            assert!(matches!(err, StateError::Validation { ref field, .. } if field == "primary"));
        }
    }
}
