use serde::Serialize;

use crate::error::ValidationError;

/// Messages collected while checking a function's arguments. Empty means
/// the call may be evaluated.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Validation {
    errors: Vec<ValidationError>,
}

#[derive(Debug, Serialize)]
pub struct ValidationMessage {
    pub code: &'static str,
    pub message: String,
}

impl Validation {
    pub fn new() -> Self {
        Validation::default()
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn has(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code() == code)
    }

    pub fn messages(&self) -> Vec<ValidationMessage> {
        self.errors
            .iter()
            .map(|e| ValidationMessage {
                code: e.code(),
                message: e.to_string(),
            })
            .collect()
    }
}

impl From<ValidationError> for Validation {
    fn from(error: ValidationError) -> Self {
        Validation {
            errors: vec![error],
        }
    }
}
