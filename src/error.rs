//! Error types for ItemDrive.
//!
//! Construction errors are raised synchronously by the value and fact
//! factories, before any store is touched. Storage errors live next to the
//! storage contract in [`crate::storage`]; [`DriveError`] ties both together
//! for the item-level facade.

use thiserror::Error;

use crate::storage::StorageError;
use crate::value::ValueType;

/// Validation errors raised while building typed values, facts and configs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("One of value or numericalValue is required")]
    MissingValue,

    #[error("Numerical value is not allowed for type {value_type}")]
    NumericalValueNotAllowed {
        value_type: ValueType,
    },

    #[error("Field '{field}' must hold exactly one element when not repeatable (got {len})")]
    NotRepeatable {
        field: &'static str,
        len: usize,
    },

    #[error("Value and numericalValue must have the same length ({values} != {numerical_values})")]
    LengthMismatch {
        values: usize,
        numerical_values: usize,
    },

    #[error("Invalid value for type {value_type}: {value:?}")]
    InvalidValue {
        value_type: ValueType,
        value: String,
    },

    #[error("Invalid numerical value for type {value_type}: {value}")]
    InvalidNumericalValue {
        value_type: ValueType,
        value: f64,
    },

    #[error("Type {value_type} has no numerical representation")]
    NoNumericalProjection {
        value_type: ValueType,
    },

    #[error("Value and numericalValue disagree for type {value_type}: {value:?} !== {numerical_value}")]
    RepresentationMismatch {
        value_type: ValueType,
        value: String,
        numerical_value: f64,
    },

    #[error("Value of type {actual} does not fit declared type {expected}")]
    TypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: &'static str,
    },

    #[error("Field '{field}' cannot be empty")]
    EmptyField {
        field: &'static str,
    },

    #[error("Unknown value type: {name:?}")]
    UnknownValueType {
        name: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

impl ValidationError {
    /// Returns true when a supplied string and numeric representation
    /// contradict each other.
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::RepresentationMismatch { .. })
    }
}

/// Top-level error type for item drive operations.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Validation error: {0}")]
    Validation(ValidationError),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl DriveError {
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true for point lookups on an unknown fact or item.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }

    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        match self {
            Self::Validation(e) => e.is_invariant_violation(),
            _ => false,
        }
    }
}

impl From<ValidationError> for DriveError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

// Validation failures surfaced by a backend keep their category.
impl From<StorageError> for DriveError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Validation(v) => Self::Validation(v),
            other => Self::Storage(other),
        }
    }
}

/// Result type alias for item drive operations.
pub type DriveResult<T> = Result<T, DriveError>;
