//! Error types for form declaration, lookup and validation.
//!
//! Every failure aborts the whole validation call: there is no partial
//! acceptance and no retry. Locations are `None` unless the call enabled
//! `detailed_location`.

use thiserror::Error;

use crate::path::FieldPath;
use crate::requirement::Requirement;
use crate::types::Type;
use crate::value::{Value, ValueKind};

fn location(path: &Option<FieldPath>) -> String {
    path.as_ref()
        .map_or_else(|| "<unknown location>".to_owned(), ToString::to_string)
}

/// Top-level error type of the form engine.
#[derive(Debug, Clone, Error)]
pub enum FormError {
    /// A required field had no value in `Full` mode.
    #[error("missing value for required field at {}", location(.path))]
    MissingFieldValue { path: Option<FieldPath> },

    /// A value's shape does not match its declared type and could not be cast.
    #[error("expected {expected} but got {actual} at {}", location(.path))]
    FieldValueTypeMismatch {
        path: Option<FieldPath>,
        actual: ValueKind,
        expected: Type,
    },

    /// A value violated the requirement attached to its type.
    #[error("value at {} violates requirement: {requirement}", location(.path))]
    InvalidFieldValue {
        path: Option<FieldPath>,
        requirement: Requirement,
    },

    /// A field id is not declared by the form.
    #[error("form '{form}' has no field '{id}'")]
    FieldNotFound { form: &'static str, id: String },

    /// A field handle from one form was used against data of another.
    #[error("field '{id}' belongs to form '{expected}', not '{actual}'")]
    UnexpectedField {
        id: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The form schema itself is malformed.
    #[error("invalid form declaration: {0}")]
    FormDeclaration(#[from] DeclarationError),
}

impl FormError {
    /// Location of the failing value, when one was recorded.
    #[must_use]
    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            Self::MissingFieldValue { path }
            | Self::FieldValueTypeMismatch { path, .. }
            | Self::InvalidFieldValue { path, .. } => path.as_ref(),
            Self::FieldNotFound { .. } | Self::UnexpectedField { .. } | Self::FormDeclaration(_) => {
                None
            }
        }
    }

    pub(crate) fn mismatch(path: Option<&FieldPath>, actual: &Value, expected: &Type) -> Self {
        Self::FieldValueTypeMismatch {
            path: path.cloned(),
            actual: actual.kind(),
            expected: expected.clone(),
        }
    }
}

/// Details of a malformed form schema, detected when the schema is first
/// resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("form '{form}' declares a field with an empty id")]
    EmptyFieldId { form: &'static str },

    #[error("form '{form}' declares field '{id}' more than once")]
    DuplicateField { form: &'static str, id: String },

    #[error("default of field '{form}.{id}' does not conform to {expected}")]
    DefaultTypeMismatch {
        form: &'static str,
        id: String,
        expected: String,
    },

    #[error("field '{form}.{id}' uses {key_type} as a map key type")]
    UnsupportedMapKey {
        form: &'static str,
        id: String,
        key_type: String,
    },
}
