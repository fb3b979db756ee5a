//! The storage contract every fact backend implements.
//!
//! Backends are interchangeable behind [`DataSource`]: they must agree on
//! the missing/empty semantics (an unknown `fetch_fact` fails with
//! [`StorageError::FactNotFound`], an empty `fetch_facts` returns an empty
//! vector) and on "last write wins" for a reused `fact_id`.

use thiserror::Error;

use crate::error::ValidationError;
use crate::fact::{Fact, PartialFact};
use crate::ids::{FactId, ItemId};
use crate::query::FactQuery;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Fact not found.
    #[error("Fact not found: {0}")]
    FactNotFound(FactId),

    /// Item not found (no facts reference it).
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// The fact could not be built from its partial.
    #[error("Invalid fact: {0}")]
    Validation(#[from] ValidationError),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl StorageError {
    /// Returns true for point lookups on an unknown identity.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::FactNotFound(_) | Self::ItemNotFound(_))
    }
}

/// Storage for facts.
///
/// Writes take partials and return the normalized fact that was stored.
/// Nothing here is transactional: a failing batch leaves the facts written
/// before the failure in place.
pub trait DataSource: Send + Sync {
    /// Normalizes `partial` and upserts it. Reusing a `fact_id` overwrites
    /// the stored fact.
    fn insert_fact(&self, partial: PartialFact) -> Result<Fact, StorageError>;

    /// Inserts facts in order, sharing one default timestamp across the
    /// batch. Partials with their own timestamp keep it.
    ///
    /// # Errors
    /// Stops at the first failing partial; earlier facts stay committed.
    fn insert_facts(&self, partials: Vec<PartialFact>) -> Result<Vec<Fact>, StorageError>;

    /// All facts matching `query`, in insertion order. Never fails on an
    /// empty result.
    fn fetch_facts(&self, query: &FactQuery) -> Result<Vec<Fact>, StorageError>;

    /// Point lookup by identity.
    ///
    /// # Errors
    /// - `FactNotFound`: if no fact has this identifier
    fn fetch_fact(&self, fact_id: &FactId) -> Result<Fact, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_data_source_object_safe(_: &dyn DataSource) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::FactNotFound(FactId::from("f-1"));
        assert!(err.to_string().contains("Fact not found"));
        assert!(err.to_string().contains("f-1"));
        assert!(err.is_not_found());

        let err = StorageError::BackendError("disk full".to_string());
        assert!(err.to_string().contains("disk full"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_validation_errors_convert() {
        let err: StorageError = ValidationError::MissingValue.into();
        assert!(matches!(err, StorageError::Validation(ValidationError::MissingValue)));
    }
}
