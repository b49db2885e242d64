//! Field validation helpers for decoded request bodies
//!
//! Handlers decode into a typed struct with serde first, then run the
//! field rules here and answer `400` if anything was collected.

use std::fmt;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Name of the invalid field (e.g., "email")
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Syntactic email check: one `@`, a dotted domain, no empty
/// dot-separated labels on either side, no whitespace.
pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    let labels_ok = |part: &str| part.split('.').all(|label| !label.is_empty());

    !domain.contains('@')
        && domain.contains('.')
        && labels_ok(local)
        && labels_ok(domain)
        && !value.contains(char::is_whitespace)
}

/// Collects field errors
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value must be present and non-empty; whitespace counts as a value
    pub fn required(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if value.map_or(true, str::is_empty) {
            self.errors.push(ValidationError::new(field, "is required"));
        }
        self
    }

    /// Value, if present, must look like an email address
    pub fn email(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            if !is_email(v) {
                self.errors.push(ValidationError::new(field, "must be a valid email address"));
            }
        }
        self
    }

    pub fn max_length(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if value.is_some_and(|v| v.chars().count() > max) {
            self.errors.push(ValidationError::new(
                field,
                format!("must be at most {} characters", max),
            ));
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }
}
