//! Error types for pgcore.
//!
//! The analytics operations themselves do not fail; errors only come from
//! parameter validation and from the JSON surfaces used by callers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PgError {
    /// A tunable is outside its admissible range.
    #[error("invalid parameter `{name}`: {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PgError {
    pub fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        PgError::InvalidParameter { name, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, PgError>;
