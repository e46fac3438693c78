//! Shared validator scaffolding for artifact schemas.

use crate::error::CoreError;

/// A single schema violation, addressed with a JSON-pointer-style path.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<ValidationError> for CoreError {
    fn from(e: ValidationError) -> Self {
        CoreError::SchemaValidationFailed {
            path: e.path,
            reason: e.message,
        }
    }
}

/// Implemented by every artifact schema. `validate` returns the first
/// violation found; validators reject unknown required fields, wrong enum
/// values, non-absolute `artifacts.root` paths, and negative counts.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Helper for "must be non-empty" checks used across several schemas.
pub fn require_non_empty(path: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(path, "must not be empty"));
    }
    Ok(())
}
