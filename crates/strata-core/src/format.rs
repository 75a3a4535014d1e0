//! Pretty JSON rendering and the nested demo record it is showcased with.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::clock::Clock;

/// Indentation used for every pretty-printed document.
pub const JSON_INDENT: &[u8] = b"    ";

/// Serialize `value` as JSON indented with four spaces.
///
/// # Errors
///
/// Returns an error if `value` fails to serialize.
pub fn pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(JSON_INDENT));
    value.serialize(&mut ser)?;
    // serde_json only ever writes valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Named timestamp nested inside [`EncapsulatedRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedStamp {
    pub name: String,
    /// Seconds since the Unix epoch, with microsecond precision.
    pub time: f64,
}

/// A record with a nested object, rendered as indented JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncapsulatedRecord {
    pub text: String,
    pub number: i64,
    pub my_object: NestedStamp,
}

impl EncapsulatedRecord {
    /// Build a record stamped with the current time from `clock`.
    #[must_use]
    pub fn new(text: &str, number: i64, name: &str, clock: &dyn Clock) -> Self {
        let micros = clock.now().and_utc().timestamp_micros();
        #[allow(clippy::cast_precision_loss)]
        let time = micros as f64 / 1_000_000.0;
        Self {
            text: text.to_string(),
            number,
            my_object: NestedStamp {
                name: name.to_string(),
                time,
            },
        }
    }

    /// Record with the stock values `Hello`, `221`, and `Sherlock`.
    #[must_use]
    pub fn stock(clock: &dyn Clock) -> Self {
        Self::new("Hello", 221, "Sherlock", clock)
    }
}

impl fmt::Display for EncapsulatedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = pretty_json(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}
