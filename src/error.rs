//! Error taxonomy for parsing, validating and loading message specs.
//!
//! Per-field conversion problems during encode/decode are not errors: the codec
//! reports them through [`crate::codec::Encoding`] and [`crate::value::DecodeStatus`].

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Empty input")]
    EmptyInput,
    #[error("Validation: {0}")]
    Validation(String),
    #[error("Syntax: {0}")]
    Syntax(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SpecError {
    fn from(e: serde_json::Error) -> Self {
        SpecError::Syntax(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SpecError>;
