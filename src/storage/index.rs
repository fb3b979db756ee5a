//! The dual index shared by the in-memory and persistent backends.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::fact::Fact;
use crate::ids::{FactId, ItemId};
use crate::query::{check_fact, FactQuery};

#[derive(Debug, Clone)]
struct Stored {
    seq: u64,
    fact: Fact,
}

/// Facts bucketed by item, plus a fact → item secondary index.
///
/// Every fact carries the sequence number of its first insertion, so
/// results come back in insertion order and an overwrite keeps its
/// original position.
#[derive(Debug, Clone, Default)]
pub struct FactIndex {
    facts_by_item: HashMap<ItemId, HashMap<FactId, Stored>>,
    item_by_fact: HashMap<FactId, ItemId>,
    next_seq: u64,
}

impl FactIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.item_by_fact.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.item_by_fact.is_empty()
    }

    /// Number of items with at least one fact.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.facts_by_item.len()
    }

    /// Stores `fact`, returning the fact it replaced.
    ///
    /// A replaced fact filed under a different item is moved out of that
    /// item's bucket; a bucket left empty is dropped.
    pub fn upsert(&mut self, fact: Fact) -> Option<Fact> {
        let previous = self
            .item_by_fact
            .insert(fact.fact_id.clone(), fact.item_id.clone())
            .and_then(|old_item| {
                let bucket = self.facts_by_item.get_mut(&old_item)?;
                let stored = bucket.remove(&fact.fact_id);
                if bucket.is_empty() {
                    self.facts_by_item.remove(&old_item);
                }
                stored
            });

        let seq = match &previous {
            Some(stored) => stored.seq,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                seq
            }
        };

        self.facts_by_item
            .entry(fact.item_id.clone())
            .or_default()
            .insert(fact.fact_id.clone(), Stored { seq, fact });

        previous.map(|stored| stored.fact)
    }

    /// Two-hop lookup: fact → item → fact.
    #[must_use]
    pub fn get(&self, fact_id: &FactId) -> Option<&Fact> {
        let item_id = self.item_by_fact.get(fact_id)?;
        self.facts_by_item
            .get(item_id)?
            .get(fact_id)
            .map(|stored| &stored.fact)
    }

    /// Facts matching `query`, in insertion order.
    ///
    /// Only the named item buckets are visited when the query lists item
    /// identifiers; a query naming only fact identifiers goes through the
    /// secondary index. Otherwise every bucket is scanned.
    #[must_use]
    pub fn query(&self, query: &FactQuery) -> Vec<Fact> {
        let mut hits: Vec<&Stored> = match (&query.item_id, &query.fact_id) {
            (Some(item_ids), _) => {
                let unique: HashSet<&ItemId> = item_ids.iter().collect();
                debug!(buckets = unique.len(), "scanning named item buckets");
                unique
                    .into_iter()
                    .filter_map(|id| self.facts_by_item.get(id))
                    .flat_map(HashMap::values)
                    .filter(|stored| check_fact(&stored.fact, query))
                    .collect()
            }
            (None, Some(fact_ids)) => {
                let unique: HashSet<&FactId> = fact_ids.iter().collect();
                unique
                    .into_iter()
                    .filter_map(|id| {
                        let item_id = self.item_by_fact.get(id)?;
                        self.facts_by_item.get(item_id)?.get(id)
                    })
                    .filter(|stored| check_fact(&stored.fact, query))
                    .collect()
            }
            (None, None) => {
                debug!(buckets = self.facts_by_item.len(), "scanning all item buckets");
                self.facts_by_item
                    .values()
                    .flat_map(HashMap::values)
                    .filter(|stored| check_fact(&stored.fact, query))
                    .collect()
            }
        };
        hits.sort_unstable_by_key(|stored| stored.seq);
        hits.into_iter().map(|stored| stored.fact.clone()).collect()
    }

    /// Every stored fact, in insertion order.
    #[must_use]
    pub fn facts(&self) -> Vec<Fact> {
        self.query(&FactQuery::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::{make_fact_at, PartialFact};
    use chrono::DateTime;

    fn fact(fact_id: &str, item_id: &str, value: &str) -> Fact {
        make_fact_at(
            PartialFact::new()
                .fact_id(fact_id)
                .item_id(item_id)
                .attribute("name")
                .value([value]),
            DateTime::UNIX_EPOCH,
        )
        .unwrap()
    }

    fn ids(facts: &[Fact]) -> Vec<&str> {
        facts.iter().map(|f| f.fact_id.as_str()).collect()
    }

    #[test]
    fn test_upsert_and_get() {
        let mut index = FactIndex::new();
        assert!(index.upsert(fact("f1", "i1", "a")).is_none());
        assert_eq!(index.get(&FactId::from("f1")).unwrap().value(), vec!["a"]);
        assert!(index.get(&FactId::from("missing")).is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut index = FactIndex::new();
        index.upsert(fact("f1", "i1", "a"));
        index.upsert(fact("f2", "i1", "b"));
        let replaced = index.upsert(fact("f1", "i1", "c")).unwrap();

        assert_eq!(replaced.value(), vec!["a"]);
        assert_eq!(index.len(), 2);
        let all = index.facts();
        assert_eq!(ids(&all), vec!["f1", "f2"]);
        assert_eq!(all[0].value(), vec!["c"]);
    }

    #[test]
    fn test_moving_a_fact_between_items() {
        let mut index = FactIndex::new();
        index.upsert(fact("f1", "i1", "a"));
        index.upsert(fact("f1", "i2", "a"));

        assert_eq!(index.item_count(), 1);
        assert!(index.query(&FactQuery::for_item("i1")).is_empty());
        assert_eq!(ids(&index.query(&FactQuery::for_item("i2"))), vec!["f1"]);
        assert_eq!(index.get(&FactId::from("f1")).unwrap().item_id.as_str(), "i2");
    }

    #[test]
    fn test_query_paths() {
        let mut index = FactIndex::new();
        index.upsert(fact("f1", "i1", "a"));
        index.upsert(fact("f2", "i2", "b"));
        index.upsert(fact("f3", "i1", "c"));

        assert_eq!(ids(&index.query(&FactQuery::for_item("i1"))), vec!["f1", "f3"]);
        assert_eq!(ids(&index.query(&FactQuery::new().item_ids(["i1", "i1"]))), vec!["f1", "f3"]);
        assert_eq!(ids(&index.query(&FactQuery::new().fact_ids(["f3", "f2"]))), vec!["f2", "f3"]);
        assert_eq!(ids(&index.query(&FactQuery::new())), vec!["f1", "f2", "f3"]);
        assert!(index.query(&FactQuery::for_item("nobody")).is_empty());
    }
}
