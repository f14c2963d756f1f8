//! Error types for Rubble

use thiserror::Error;

/// The main error type for Rubble operations
///
/// Only setup and out-of-range requests produce errors. The per-tick
/// simulation path never returns one: overflowing event lists and spawn
/// requests are dropped instead.
#[derive(Debug, Error)]
pub enum RubbleError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Index out of range: {index} exceeds limit {limit}")]
    IndexOutOfRange { index: usize, limit: usize },

    #[error("Render backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML serialization error: {0}")]
    TomlSer(String),
}

/// Result type alias for Rubble operations
pub type Result<T> = std::result::Result<T, RubbleError>;

impl From<toml::de::Error> for RubbleError {
    fn from(err: toml::de::Error) -> Self {
        RubbleError::TomlParse(err.to_string())
    }
}

impl From<toml::ser::Error> for RubbleError {
    fn from(err: toml::ser::Error) -> Self {
        RubbleError::TomlSer(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_both_values() {
        let err = RubbleError::IndexOutOfRange {
            index: 1200,
            limit: 1000,
        };
        assert_eq!(
            err.to_string(),
            "Index out of range: 1200 exceeds limit 1000"
        );
    }

    #[test]
    fn toml_errors_convert() {
        let bad: std::result::Result<toml::value::Table, _> = toml::from_str("cols = ");
        let err: RubbleError = bad.unwrap_err().into();
        assert!(matches!(err, RubbleError::TomlParse(_)));
    }
}
