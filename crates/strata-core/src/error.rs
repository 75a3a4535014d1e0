use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    MissingEnvironment,
    ValidationFailed,
    MalformedJson,
    SessionNotFound,
    UnsupportedDataset,
    DatasetUnreadable,
    RowOutOfRange,
    StoreWriteFailed,
    LockContention,
    StoreReadFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::MissingEnvironment => "E1002",
            Self::ValidationFailed => "E2001",
            Self::MalformedJson => "E2002",
            Self::SessionNotFound => "E3001",
            Self::UnsupportedDataset => "E4001",
            Self::DatasetUnreadable => "E4002",
            Self::RowOutOfRange => "E4003",
            Self::StoreWriteFailed => "E5001",
            Self::LockContention => "E5002",
            Self::StoreReadFailed => "E5003",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::MissingEnvironment => "Environment variable not set",
            Self::ValidationFailed => "Export form failed validation",
            Self::MalformedJson => "Malformed JSON text",
            Self::SessionNotFound => "Session not found",
            Self::UnsupportedDataset => "Unsupported dataset file extension",
            Self::DatasetUnreadable => "Dataset file could not be read or parsed",
            Self::RowOutOfRange => "Dataset row out of range",
            Self::StoreWriteFailed => "Browser store write failed",
            Self::LockContention => "Lock contention",
            Self::StoreReadFailed => "Browser store read failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in strata/config.toml and retry."),
            Self::MissingEnvironment => {
                Some("Export the variable or configure a default value for it.")
            }
            Self::ValidationFailed => {
                Some("Discard the stored layer with `strata browser clear` or fix its fields.")
            }
            Self::MalformedJson => Some("Check that the stored value is a JSON object."),
            Self::SessionNotFound => Some("Open a new session before changing session state."),
            Self::UnsupportedDataset => Some("Use a .csv, .json, or .parquet file."),
            Self::DatasetUnreadable => {
                Some("Check the file's format; JSON datasets must be an array of objects.")
            }
            Self::RowOutOfRange => Some("Pick a row below the reported row count."),
            Self::StoreWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other `strata` process releases its lock."),
            Self::StoreReadFailed => Some("Check read permissions on the storage directory."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 11] = [
        ErrorCode::ConfigParseError,
        ErrorCode::MissingEnvironment,
        ErrorCode::ValidationFailed,
        ErrorCode::MalformedJson,
        ErrorCode::SessionNotFound,
        ErrorCode::UnsupportedDataset,
        ErrorCode::DatasetUnreadable,
        ErrorCode::RowOutOfRange,
        ErrorCode::StoreWriteFailed,
        ErrorCode::LockContention,
        ErrorCode::StoreReadFailed,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::ValidationFailed.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn every_code_has_a_message() {
        for code in ALL {
            assert!(!code.message().is_empty());
        }
    }
}
