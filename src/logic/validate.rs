use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{FieldDescriptor, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationErrorType {
    MissingRequiredValue,
    TooLong,
    OutOfRange,
    TypeMismatch,
}

/// One failing field, reported with the label the user sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field_name: String,
    pub display_name: String,
    pub error_type: ValidationErrorType,
    pub message: String,
}

/// Every failing field of one form, in form order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = FieldError>) {
        self.errors.extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Names of the failing fields, in form order.
    pub fn field_names(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field_name.as_str()).collect()
    }

    pub fn for_field(&self, field_name: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field_name == field_name)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field_name, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Checks a single control value against its descriptor.
pub struct FieldValidator;

impl FieldValidator {
    /// Validate `value` against every rule of `descriptor`. All rule failures for
    /// the field are returned, not just the first.
    pub fn validate_value(descriptor: &FieldDescriptor, value: &FieldValue) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let error = |error_type, message: String| FieldError {
            field_name: descriptor.field_name.clone(),
            display_name: descriptor.display_name.clone(),
            error_type,
            message,
        };

        if !value.fits(&descriptor.kind) {
            errors.push(error(
                ValidationErrorType::TypeMismatch,
                format!("expects a {} value", descriptor.kind.name()),
            ));
            return errors;
        }

        if value.is_empty() {
            if descriptor.required {
                errors.push(error(
                    ValidationErrorType::MissingRequiredValue,
                    format!("{} is required", descriptor.display_name),
                ));
            }
            return errors;
        }

        match value {
            FieldValue::Text(text) => {
                if let Some(limit) = descriptor.length_limit() {
                    let length = text.chars().count();
                    if length > limit {
                        errors.push(error(
                            ValidationErrorType::TooLong,
                            format!(
                                "must be at most {} characters (currently {})",
                                limit, length
                            ),
                        ));
                    }
                }
            }
            FieldValue::Number(number) if !number.is_finite() => {
                errors.push(error(
                    ValidationErrorType::OutOfRange,
                    "must be a finite number".to_string(),
                ));
            }
            FieldValue::Number(number) => {
                if *number < descriptor.min {
                    errors.push(error(
                        ValidationErrorType::OutOfRange,
                        format!("must be at least {}", descriptor.min),
                    ));
                }
                if *number > descriptor.max {
                    errors.push(error(
                        ValidationErrorType::OutOfRange,
                        format!("must be at most {}", descriptor.max),
                    ));
                }
            }
            _ => {}
        }

        errors
    }
}
