//! Error types for cqlmap.

use thiserror::Error;

use crate::engine::ExecutionError;
use crate::materialize::EndOfRows;

/// The main error type for cqlmap operations.
#[derive(Debug, Error)]
pub enum CqlError {
    /// The table schema cannot be mapped onto the target store.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A value does not fit the column it is written to.
    #[error("Value mismatch for column '{column}': expected {expected}")]
    ValueMismatch {
        column: String,
        expected: &'static str,
    },

    /// The remote store rejected or failed a statement.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// A key lookup returned no rows.
    #[error("Key not found")]
    KeyNotFound,

    /// A scan ran past its last row.
    #[error("End of rows")]
    EndOfRows,

    /// The operation has no counterpart in the target store.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed TOML configuration.
    #[error("Configuration file error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CqlError {
    /// Create a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema(message.into())
    }

    /// Create a value mismatch error.
    pub fn mismatch(column: impl Into<String>, expected: &'static str) -> Self {
        Self::ValueMismatch {
            column: column.into(),
            expected,
        }
    }

    /// True for the two outcomes a scan treats as "stop", not "fail".
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Self::EndOfRows | Self::KeyNotFound)
    }
}

impl From<EndOfRows> for CqlError {
    fn from(_: EndOfRows) -> Self {
        Self::EndOfRows
    }
}

/// Result type alias for cqlmap operations.
pub type CqlResult<T> = Result<T, CqlError>;
