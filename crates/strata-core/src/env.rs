//! Typed environment variable parsing.
//!
//! The `*_from` variants take the raw value explicitly so they can be tested
//! without touching the process environment.

use std::fmt::Display;
use std::str::FromStr;

use crate::error::ErrorCode;

/// Strings (case-insensitive) read as `true`; anything else is `false`.
pub const TRUE_VALUES: [&str; 5] = ["true", "yes", "t", "y", "on"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvError {
    #[error("environment variable {name} does not exist and no default value was provided")]
    Missing { name: String },

    #[error("environment variable {name}={value:?} is invalid: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

impl EnvError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Missing { .. } => ErrorCode::MissingEnvironment,
            Self::Invalid { .. } => ErrorCode::ConfigParseError,
        }
    }
}

fn resolve(name: &str, raw: Option<String>, default: Option<&str>) -> Result<String, EnvError> {
    raw.or_else(|| default.map(str::to_string))
        .ok_or_else(|| EnvError::Missing {
            name: name.to_string(),
        })
}

fn convert<T>(name: &str, value: &str) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|err: T::Err| EnvError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
        reason: err.to_string(),
    })
}

/// Parse `raw` (the variable's value, if set) or `default` into `T`.
///
/// # Errors
///
/// [`EnvError::Missing`] if neither is available, [`EnvError::Invalid`] if
/// the value does not parse.
pub fn parse_env_from<T>(name: &str, raw: Option<String>, default: Option<&str>) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: Display,
{
    let value = resolve(name, raw, default)?;
    convert(name, &value)
}

/// Boolean flavour of [`parse_env_from`]: true for any of [`TRUE_VALUES`].
///
/// # Errors
///
/// [`EnvError::Missing`] if neither a value nor a default is available.
pub fn parse_env_bool_from(
    name: &str,
    raw: Option<String>,
    default: Option<&str>,
) -> Result<bool, EnvError> {
    let value = resolve(name, raw, default)?.to_lowercase();
    Ok(TRUE_VALUES.contains(&value.as_str()))
}

/// Read and parse the environment variable `name`.
///
/// # Errors
///
/// See [`parse_env_from`].
pub fn parse_env<T>(name: &str, default: Option<&str>) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_env_from(name, std::env::var(name).ok(), default)
}

/// Read the environment variable `name` as a boolean.
///
/// # Errors
///
/// See [`parse_env_bool_from`].
pub fn parse_env_bool(name: &str, default: Option<&str>) -> Result<bool, EnvError> {
    parse_env_bool_from(name, std::env::var(name).ok(), default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_used_when_unset() {
        let value: String = parse_env_from("UNSET", None, Some("UNKNOWN")).expect("default");
        assert_eq!(value, "UNKNOWN");
    }

    #[test]
    fn set_value_wins_over_default() {
        let value: i32 = parse_env_from("PORT", Some("8080".into()), Some("80")).expect("parse");
        assert_eq!(value, 8080);
    }

    #[test]
    fn missing_without_default_is_an_error() {
        let err = parse_env_from::<String>("NOPE", None, None).expect_err("missing");
        assert_eq!(err, EnvError::Missing { name: "NOPE".into() });
        assert_eq!(err.code(), ErrorCode::MissingEnvironment);
    }

    #[test]
    fn booleans_accept_truthy_words() {
        for raw in ["on", "Yes", "TRUE", "t", "y"] {
            assert!(parse_env_bool_from("B", Some(raw.into()), None).expect("bool"), "{raw}");
        }
        for raw in ["off", "0", "no", "false", ""] {
            assert!(!parse_env_bool_from("B", Some(raw.into()), None).expect("bool"), "{raw}");
        }
    }

    #[test]
    fn floats_parse() {
        let value: f64 = parse_env_from("F", None, Some("1234.5678")).expect("float");
        assert!((value - 1234.5678).abs() < f64::EPSILON);
        let pi: f64 = parse_env_from("PI", None, Some("3.14")).expect("float");
        assert!((pi - std::f64::consts::PI).abs() / std::f64::consts::PI < 1e-2);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = parse_env_from::<i64>("N", Some("two".into()), Some("1")).expect_err("invalid");
        assert!(matches!(err, EnvError::Invalid { ref name, ref value, .. } if name == "N" && value == "two"));
        assert_eq!(err.code(), ErrorCode::ConfigParseError);
    }

    #[test]
    fn process_environment_is_read() {
        let path: String = parse_env("PATH", Some("fallback")).expect("PATH or default");
        assert!(!path.is_empty());
        let missing = parse_env::<String>("STRATA_SURELY_UNSET_VARIABLE_7F3A", None);
        assert!(missing.is_err());
    }
}
