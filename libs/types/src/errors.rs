//! Error types for the shared data model
//!
//! Error taxonomy using thiserror

use thiserror::Error;

/// Errors raised while constructing model values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("token id must not be empty")]
    EmptyTokenId,

    #[error("Invalid numeric value for {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },
}
