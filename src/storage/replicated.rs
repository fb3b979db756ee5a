//! A data source that mirrors every write to several backends.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::fact::{Fact, PartialFact};
use crate::ids::FactId;
use crate::query::FactQuery;
use crate::storage::traits::{DataSource, StorageError};

/// Writes go to a primary and then to each mirror; reads come from the
/// primary only.
///
/// The primary normalizes each partial, so every mirror receives the same
/// fully specified fact (identifiers and timestamp included). There is no
/// rollback: when a mirror fails, the primary and the mirrors that
/// succeeded keep the write and the first mirror error is returned.
///
/// Batches are committed to the primary one fact at a time. When a fact
/// fails, the facts committed before it still reach every mirror and the
/// primary's error is returned.
pub struct ReplicatedDataSource {
    primary: Arc<dyn DataSource>,
    mirrors: Vec<Arc<dyn DataSource>>,
}

impl std::fmt::Debug for ReplicatedDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedDataSource")
            .field("mirrors", &self.mirrors.len())
            .finish_non_exhaustive()
    }
}

impl ReplicatedDataSource {
    #[must_use]
    pub fn new(primary: Arc<dyn DataSource>) -> Self {
        Self {
            primary,
            mirrors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_mirror(mut self, mirror: Arc<dyn DataSource>) -> Self {
        self.mirrors.push(mirror);
        self
    }

    #[must_use]
    pub fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }

    fn replicate(&self, facts: &[Fact]) -> Result<(), StorageError> {
        if facts.is_empty() {
            return Ok(());
        }
        let partials: Vec<PartialFact> = facts.iter().map(Fact::to_partial).collect();
        let mut first_error = None;
        for (position, mirror) in self.mirrors.iter().enumerate() {
            match mirror.insert_facts(partials.clone()) {
                Ok(_) => debug!(mirror = position, facts = facts.len(), "replicated facts"),
                Err(e) => {
                    warn!(mirror = position, error = %e, "mirror write failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl DataSource for ReplicatedDataSource {
    fn insert_fact(&self, partial: PartialFact) -> Result<Fact, StorageError> {
        let fact = self.primary.insert_fact(partial)?;
        self.replicate(std::slice::from_ref(&fact))?;
        Ok(fact)
    }

    fn insert_facts(&self, partials: Vec<PartialFact>) -> Result<Vec<Fact>, StorageError> {
        let mut committed = Vec::with_capacity(partials.len());
        let mut failure = None;
        // Unstamped partials share the timestamp the primary gave the first of them.
        let mut batch_at = None;
        for mut partial in partials {
            let stamped = partial.timestamp.is_some();
            if !stamped {
                partial.timestamp = batch_at;
            }
            match self.primary.insert_fact(partial) {
                Ok(fact) => {
                    if !stamped {
                        batch_at.get_or_insert(fact.timestamp);
                    }
                    committed.push(fact);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let replicated = self.replicate(&committed);
        match failure {
            Some(e) => {
                warn!(committed = committed.len(), error = %e, "batch stopped on primary");
                Err(e)
            }
            None => replicated.map(|()| committed),
        }
    }

    fn fetch_facts(&self, query: &FactQuery) -> Result<Vec<Fact>, StorageError> {
        self.primary.fetch_facts(query)
    }

    fn fetch_fact(&self, fact_id: &FactId) -> Result<Fact, StorageError> {
        self.primary.fetch_fact(fact_id)
    }
}
