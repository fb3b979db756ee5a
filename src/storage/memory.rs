//! In-memory storage backend.
//!
//! Thread-safe reference implementation of [`DataSource`], intended for
//! embedded usage and tests.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::fact::{Fact, FactFactory, PartialFact};
use crate::ids::FactId;
use crate::query::FactQuery;
use crate::storage::index::FactIndex;
use crate::storage::traits::{DataSource, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// Facts held in a [`FactIndex`] behind a lock.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    factory: FactFactory,
    index: RwLock<FactIndex>,
}

impl InMemoryDataSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `factory` to normalize partials, e.g. with a fixed clock.
    #[must_use]
    pub fn with_factory(factory: FactFactory) -> Self {
        Self {
            factory,
            index: RwLock::new(FactIndex::new()),
        }
    }

    /// Number of stored facts.
    ///
    /// # Errors
    /// `BackendError` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.index.read().map_err(|_| lock_err("facts read"))?.len())
    }

    /// # Errors
    /// `BackendError` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    fn insert_at(&self, partial: PartialFact, at: DateTime<Utc>) -> Result<Fact, StorageError> {
        let fact = self.factory.make_at(partial, at)?;
        let mut index = self.index.write().map_err(|_| lock_err("facts write"))?;
        if let Some(previous) = index.upsert(fact.clone()) {
            warn!(fact_id = %fact.fact_id, previous_item = %previous.item_id, "overwrote existing fact");
        } else {
            debug!(fact_id = %fact.fact_id, item_id = %fact.item_id, attribute = %fact.attribute, "inserted fact");
        }
        Ok(fact)
    }
}

impl DataSource for InMemoryDataSource {
    fn insert_fact(&self, partial: PartialFact) -> Result<Fact, StorageError> {
        self.insert_at(partial, self.factory.now())
    }

    fn insert_facts(&self, partials: Vec<PartialFact>) -> Result<Vec<Fact>, StorageError> {
        let at = self.factory.now();
        partials
            .into_iter()
            .map(|partial| self.insert_at(partial, at))
            .collect()
    }

    fn fetch_facts(&self, query: &FactQuery) -> Result<Vec<Fact>, StorageError> {
        let index = self.index.read().map_err(|_| lock_err("facts read"))?;
        Ok(index.query(query))
    }

    fn fetch_fact(&self, fact_id: &FactId) -> Result<Fact, StorageError> {
        let index = self.index.read().map_err(|_| lock_err("facts read"))?;
        index
            .get(fact_id)
            .cloned()
            .ok_or_else(|| StorageError::FactNotFound(fact_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{IdGenerator, TimeOrderedIds};
    use crate::time::FixedClock;
    use std::sync::Arc;

    fn source() -> InMemoryDataSource {
        InMemoryDataSource::with_factory(FactFactory::new(
            Arc::new(FixedClock::at_millis(1_000)),
            Arc::new(TimeOrderedIds),
        ))
    }

    #[test]
    fn test_insert_then_fetch() {
        let source = source();
        let fact = source
            .insert_fact(PartialFact::new().attribute("name").value(["Ethan"]))
            .unwrap();
        assert_eq!(source.fetch_fact(&fact.fact_id).unwrap(), fact);
        assert_eq!(source.len().unwrap(), 1);
    }

    #[test]
    fn test_fetch_unknown_fact() {
        let err = source().fetch_fact(&FactId::from("unknown")).unwrap_err();
        assert!(matches!(err, StorageError::FactNotFound(ref id) if id.as_str() == "unknown"));
    }

    #[test]
    fn test_empty_fetch_is_empty_vec() {
        let source = source();
        assert!(source.fetch_facts(&FactQuery::new()).unwrap().is_empty());
        assert!(source.is_empty().unwrap());
    }

    #[test]
    fn test_batch_shares_timestamp() {
        let source = source();
        let own = DateTime::from_timestamp_millis(5).unwrap();
        let facts = source
            .insert_facts(vec![
                PartialFact::new().attribute("a").value(["1"]),
                PartialFact::new().attribute("b").value(["2"]),
                PartialFact::new().attribute("c").value(["3"]).timestamp(own),
            ])
            .unwrap();
        assert_eq!(facts[0].timestamp, facts[1].timestamp);
        assert_eq!(facts[0].timestamp.timestamp_millis(), 1_000);
        assert_eq!(facts[2].timestamp, own);
    }

    #[test]
    fn test_batch_is_not_atomic() {
        let source = source();
        let err = source
            .insert_facts(vec![
                PartialFact::new().attribute("a").value(["1"]),
                PartialFact::new().value(["2"]),
                PartialFact::new().attribute("c").value(["3"]),
            ])
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
        assert_eq!(source.len().unwrap(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let source = source();
        let id = TimeOrderedIds.fact_id(DateTime::UNIX_EPOCH);
        source
            .insert_fact(PartialFact::new().fact_id(id.clone()).attribute("a").value(["old"]))
            .unwrap();
        source
            .insert_fact(PartialFact::new().fact_id(id.clone()).attribute("a").value(["new"]))
            .unwrap();
        assert_eq!(source.fetch_fact(&id).unwrap().value(), vec!["new"]);
        assert_eq!(source.len().unwrap(), 1);
    }
}
