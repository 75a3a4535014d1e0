//! State container: a primary value, an append-only list, a keyed map, and a
//! shared task handle.
//!
//! # Copy semantics
//!
//! [`StateContainer::deep_copy`] duplicates `primary`, `items`, and `tagged`
//! but keeps the task handle aliased, so copies diverge in data while staying
//! coupled in side-effect visibility.
//!
//! # Export form
//!
//! The export form is a JSON object with the keys `primary`, `task`, `items`,
//! and `tagged`. Consumers round-trip exclusively through
//! [`StateContainer::export`] and [`StateContainer::reset_from_export`].
//! Resetting never touches the task handle; the `task` key of a form is
//! informational only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::clock::Clock;
use crate::entropy::Entropy;
use crate::error::ErrorCode;
use crate::task::TaskHandle;
use crate::value::VersionedValue;

/// Upper bound (inclusive) of `a` for values appended to `items`.
pub const ITEM_A_MAX: i64 = 99;
/// Upper bound (inclusive) of `a` for values upserted into `tagged`.
pub const TAGGED_A_MAX: i64 = 999;
/// Upper bound (inclusive) of `a` for the replacement `primary`.
pub const PRIMARY_A_MAX: i64 = 499;
/// Upper bound (inclusive) of `n` in generated `key-{n}` map keys.
pub const TAGGED_KEY_MAX: i64 = 9999;

/// Errors raised while restoring a container from its export form.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid `{field}`: {reason}")]
    Validation { field: String, reason: String },

    #[error("malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

impl StateError {
    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::ValidationFailed,
            Self::MalformedJson(_) => ErrorCode::MalformedJson,
        }
    }
}

/// Flattened, serialization-ready representation of a container.
///
/// Every key is always present; `None` serializes as `null` and only occurs
/// for an uninitialised slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportForm {
    pub primary: Option<VersionedValue>,
    pub task: Option<String>,
    pub items: Option<Vec<VersionedValue>>,
    pub tagged: Option<BTreeMap<String, VersionedValue>>,
}

impl ExportForm {
    /// JSON object form, suitable for [`StateContainer::reset_from_export`].
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Pretty JSON with four-space indentation.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        crate::format::pretty_json(self)
    }
}

/// Outcome of one [`StateContainer::make_random_changes`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomChange {
    /// Key the new `tagged` entry was written under.
    pub tagged_key: String,
    /// Whether that key already existed and was overwritten.
    pub replaced_existing: bool,
}

/// A populated state container.
///
/// `Clone` has the same semantics as [`StateContainer::deep_copy`].
#[derive(Debug, Clone)]
pub struct StateContainer {
    primary: VersionedValue,
    items: Vec<VersionedValue>,
    tagged: BTreeMap<String, VersionedValue>,
    task: TaskHandle,
}

impl StateContainer {
    /// Fresh container with its own task result and default primary value.
    #[must_use]
    pub fn new() -> Self {
        Self::with_task(TaskHandle::new())
    }

    /// Fresh container sharing `task` with whoever else holds it.
    #[must_use]
    pub fn with_task(task: TaskHandle) -> Self {
        Self {
            primary: VersionedValue::default(),
            items: Vec::new(),
            tagged: BTreeMap::new(),
            task,
        }
    }

    #[must_use]
    pub const fn primary(&self) -> &VersionedValue {
        &self.primary
    }

    #[must_use]
    pub fn items(&self) -> &[VersionedValue] {
        &self.items
    }

    #[must_use]
    pub const fn tagged(&self) -> &BTreeMap<String, VersionedValue> {
        &self.tagged
    }

    #[must_use]
    pub const fn task(&self) -> &TaskHandle {
        &self.task
    }

    /// Append one random item, upsert one random tagged value, replace the
    /// primary value, then run the shared task.
    ///
    /// All labels generated by one call share a single clock reading. A
    /// random key that already exists in `tagged` is silently overwritten.
    pub fn make_random_changes(
        &mut self,
        caller: &str,
        entropy: &mut dyn Entropy,
        clock: &dyn Clock,
    ) -> RandomChange {
        let now = clock.now();

        self.items
            .push(VersionedValue::random(entropy, ITEM_A_MAX, caller, now));

        let tagged_key = format!("key-{}", entropy.next_in(0, TAGGED_KEY_MAX));
        let value = VersionedValue::random(entropy, TAGGED_A_MAX, caller, now);
        let replaced_existing = self.tagged.insert(tagged_key.clone(), value).is_some();

        self.primary = VersionedValue::random(entropy, PRIMARY_A_MAX, caller, now);

        self.task.run(clock);

        debug!(
            caller,
            items = self.items.len(),
            tagged = self.tagged.len(),
            key = %tagged_key,
            replaced_existing,
            "made random changes"
        );

        RandomChange {
            tagged_key,
            replaced_existing,
        }
    }

    /// Export form of this container. Pure.
    #[must_use]
    pub fn export(&self) -> ExportForm {
        ExportForm {
            primary: Some(self.primary.clone()),
            task: Some(self.task.output()),
            items: Some(self.items.clone()),
            tagged: Some(self.tagged.clone()),
        }
    }

    /// Pretty JSON text of the export form.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::MalformedJson`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String, StateError> {
        Ok(self.export().to_pretty_json()?)
    }

    /// Overwrite `primary`, `items`, and `tagged` from an export form.
    ///
    /// Absent keys leave their field untouched; `task` and unknown keys are
    /// ignored. `items: null` and `tagged: null` mean empty collections.
    /// The whole form is validated before anything is applied.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Validation`] if a present key has the wrong
    /// shape. The container is unchanged in that case.
    pub fn reset_from_export(&mut self, data: &Map<String, Value>) -> Result<(), StateError> {
        let primary = match data.get("primary") {
            None => None,
            Some(Value::Null) => {
                return Err(StateError::validation(
                    "primary",
                    "a populated container cannot take a null primary",
                ));
            }
            Some(raw) => Some(VersionedValue::from_export("primary", raw)?),
        };

        let items = match data.get("items") {
            None => None,
            Some(Value::Null) => Some(Vec::new()),
            Some(Value::Array(entries)) => Some(
                entries
                    .iter()
                    .enumerate()
                    .map(|(i, raw)| VersionedValue::from_export(&format!("items[{i}]"), raw))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(_) => return Err(StateError::validation("items", "expected a list")),
        };

        let tagged = match data.get("tagged") {
            None => None,
            Some(Value::Null) => Some(BTreeMap::new()),
            Some(Value::Object(entries)) => Some(
                entries
                    .iter()
                    .map(|(key, raw)| {
                        VersionedValue::from_export(&format!("tagged.{key}"), raw)
                            .map(|v| (key.clone(), v))
                    })
                    .collect::<Result<BTreeMap<_, _>, _>>()?,
            ),
            Some(_) => return Err(StateError::validation("tagged", "expected an object")),
        };

        if let Some(primary) = primary {
            self.primary = primary;
        }
        if let Some(items) = items {
            self.items = items;
        }
        if let Some(tagged) = tagged {
            self.tagged = tagged;
        }

        debug!(
            items = self.items.len(),
            tagged = self.tagged.len(),
            "reset from export form"
        );
        Ok(())
    }

    /// Parse JSON text and apply it with [`Self::reset_from_export`].
    ///
    /// # Errors
    ///
    /// Returns [`StateError::MalformedJson`] if the text is not JSON and
    /// [`StateError::Validation`] if it is not an object or fails validation.
    pub fn reset_from_json_str(&mut self, text: &str) -> Result<(), StateError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(data) = value else {
            return Err(StateError::validation("$", "expected a JSON object"));
        };
        self.reset_from_export(&data)
    }

    /// Independent copy of the data that shares this container's task handle.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }
}

impl Default for StateContainer {
    fn default() -> Self {
        Self::new()
    }
}

/// A container slot that may still be a placeholder.
///
/// The only transition is `Uninitialised -> Populated`, and it always
/// installs a fully constructed container.
#[derive(Debug, Clone, Default)]
pub enum StateSlot {
    #[default]
    Uninitialised,
    Populated(StateContainer),
}

impl StateSlot {
    #[must_use]
    pub const fn is_populated(&self) -> bool {
        matches!(self, Self::Populated(_))
    }

    #[must_use]
    pub const fn as_populated(&self) -> Option<&StateContainer> {
        match self {
            Self::Uninitialised => None,
            Self::Populated(container) => Some(container),
        }
    }

    /// The populated container, or a fresh one around `seed` for a
    /// placeholder.
    #[must_use]
    pub fn into_populated(self, seed: &TaskHandle) -> StateContainer {
        match self {
            Self::Populated(container) => container,
            Self::Uninitialised => StateContainer::with_task(seed.clone()),
        }
    }

    /// Export form; every key is null for a placeholder.
    #[must_use]
    pub fn export(&self) -> ExportForm {
        self.as_populated()
            .map_or_else(ExportForm::default, StateContainer::export)
    }
}

impl From<StateContainer> for StateSlot {
    fn from(container: StateContainer) -> Self {
        Self::Populated(container)
    }
}
