//! Error types for the barmatch system.

use thiserror::Error;

use crate::types::Side;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the barmatch system.
#[derive(Error, Debug)]
pub enum Error {
    /// A side label outside {long, short}.
    #[error("Invalid side: {0:?} (expected \"long\" or \"short\")")]
    InvalidSide(String),

    /// A long and a short position were combined directly.
    #[error("Cannot combine a {left} position with a {right} position")]
    MismatchedSideCombination { left: Side, right: Side },

    /// An order that is neither fillable nor triggerable.
    #[error("Unclassifiable order: {0}")]
    UnclassifiableOrder(String),

    /// An order or position with size <= 0.
    #[error("Size must be positive, got {0}")]
    NonPositiveSize(f64),

    /// A price, take-profit or stop-loss that is not a finite number.
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create an invalid price error.
    pub fn invalid_price(msg: impl Into<String>) -> Self {
        Error::InvalidPrice(msg.into())
    }

    /// Create an unclassifiable order error.
    pub fn unclassifiable(msg: impl Into<String>) -> Self {
        Error::UnclassifiableOrder(msg.into())
    }
}
