//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while building or preparing market data.
#[derive(Debug, Error)]
pub enum DataError {
    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// A required column is absent from the input frame
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Invalid preparation parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
