//! The item drive: items in, facts out, and back.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::config::DriveConfig;
use crate::error::{DriveError, DriveResult};
use crate::fact::{Fact, PartialFact};
use crate::ids::{FactId, IdGenerator, ItemId, TimeOrderedIds};
use crate::item::{facts_from, Item, PartialItem};
use crate::query::{check_item, FactQuery, QueryMode};
use crate::storage::{DataSource, StorageError};
use crate::time::{Clock, SystemClock};

/// Stateless façade that decomposes items into facts on a [`DataSource`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use itemdrive::{InMemoryDataSource, ItemDrive, PartialFact, PartialItem};
///
/// let drive = ItemDrive::new(Arc::new(InMemoryDataSource::new()));
/// let item = drive
///     .insert_item(
///         PartialItem::new()
///             .item_type("person")
///             .attribute(PartialFact::new().attribute("name").value(["Ethan"])),
///     )
///     .unwrap();
///
/// let fetched = drive.fetch_item(&item.item_id).unwrap();
/// assert_eq!(fetched.attributes.len(), 1);
/// assert_eq!(fetched.attributes[0].value(), vec!["Ethan"]);
/// ```
#[derive(Clone)]
pub struct ItemDrive {
    source: Arc<dyn DataSource>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: DriveConfig,
}

impl std::fmt::Debug for ItemDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemDrive")
            .field("clock", &self.clock)
            .field("ids", &self.ids)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ItemDrive {
    #[must_use]
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            clock: Arc::new(SystemClock),
            ids: Arc::new(TimeOrderedIds),
            config: DriveConfig::default(),
        }
    }

    /// Clock used to seed generated item identifiers.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// # Errors
    /// `Validation` if the configuration is invalid.
    pub fn with_config(mut self, config: DriveConfig) -> DriveResult<Self> {
        self.config = config.validate()?;
        Ok(self)
    }

    #[must_use]
    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    #[must_use]
    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    /// Writes every attribute of the draft as a fact and returns the item
    /// made of the facts written under its identity.
    ///
    /// Attributes default to the item's identity and type but may name
    /// another item. Such link facts are written to that item and are not
    /// part of the returned one, so for a new item the result equals
    /// [`fetch_item`](Self::fetch_item). Nothing is rolled back if a fact
    /// fails.
    ///
    /// # Errors
    /// Validation errors of any attribute, or storage errors.
    pub fn insert_item(&self, partial: PartialItem) -> DriveResult<Item> {
        let PartialItem {
            item_id,
            item_type,
            attributes,
        } = partial;
        let item_id = item_id.unwrap_or_else(|| self.ids.item_id(self.clock.now()));
        let item_type = item_type.unwrap_or_else(|| self.config.default_item_type.clone());

        let partials = facts_from(&item_id, &item_type, attributes)
            .into_iter()
            .map(|mut fact| {
                fact.typed_value
                    .value_type
                    .get_or_insert(self.config.default_value_type);
                fact
            })
            .collect();
        let written = self.source.insert_facts(partials)?;
        let written_count = written.len();
        let attributes: Vec<_> = written.into_iter().filter(|f| f.item_id == item_id).collect();

        debug!(
            item_id = %item_id,
            facts = written_count,
            linked = written_count - attributes.len(),
            "inserted item"
        );
        Ok(Item {
            item_id,
            item_type,
            attributes,
        })
    }

    /// Inserts drafts one after another, stopping at the first failure.
    ///
    /// # Errors
    /// The first failing item's error; earlier items stay written.
    pub fn insert_items(&self, partials: Vec<PartialItem>) -> DriveResult<Vec<Item>> {
        partials
            .into_iter()
            .map(|partial| self.insert_item(partial))
            .collect()
    }

    /// All facts of `item_id`, assembled.
    ///
    /// # Errors
    /// `ItemNotFound` if no fact references the item.
    pub fn fetch_item(&self, item_id: &ItemId) -> DriveResult<Item> {
        let facts = self.source.fetch_facts(&FactQuery::for_item(item_id.clone()))?;
        Item::from_facts(item_id.clone(), facts)
            .ok_or_else(|| DriveError::from(StorageError::ItemNotFound(item_id.clone())))
    }

    /// Items with facts matching `query`.
    ///
    /// Collects the distinct items of the matching facts, in order of first
    /// match, then fetches each one whole. In
    /// [`QueryMode::ItemConjunction`] an item is kept only if it satisfies
    /// every attribute query (see [`check_item`]).
    ///
    /// # Errors
    /// Storage errors.
    pub fn fetch_items(&self, query: &FactQuery) -> DriveResult<Vec<Item>> {
        let mut seen = HashSet::new();
        let item_ids: Vec<ItemId> = self
            .source
            .fetch_facts(query)?
            .into_iter()
            .map(|fact| fact.item_id)
            .filter(|id| seen.insert(id.clone()))
            .collect();
        debug!(candidates = item_ids.len(), mode = ?query.mode, "fetching items");

        let mut items = Vec::with_capacity(item_ids.len());
        for item_id in &item_ids {
            let item = self.fetch_item(item_id)?;
            if query.mode == QueryMode::ItemConjunction && !check_item(&item.attributes, query) {
                continue;
            }
            items.push(item);
        }
        Ok(items)
    }
}

impl DataSource for ItemDrive {
    fn insert_fact(&self, partial: PartialFact) -> Result<Fact, StorageError> {
        self.source.insert_fact(partial)
    }

    fn insert_facts(&self, partials: Vec<PartialFact>) -> Result<Vec<Fact>, StorageError> {
        self.source.insert_facts(partials)
    }

    fn fetch_facts(&self, query: &FactQuery) -> Result<Vec<Fact>, StorageError> {
        self.source.fetch_facts(query)
    }

    fn fetch_fact(&self, fact_id: &FactId) -> Result<Fact, StorageError> {
        self.source.fetch_fact(fact_id)
    }
}
