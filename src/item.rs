//! Items: the facts sharing one item identifier, viewed together.
//!
//! An item has no storage record of its own. It exists exactly as long as
//! some fact references its identifier.

use serde::{Deserialize, Serialize};

use crate::fact::{Fact, PartialFact};
use crate::ids::ItemId;

/// A materialized item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "itemID")]
    pub item_id: ItemId,
    #[serde(rename = "itemType")]
    pub item_type: String,
    pub attributes: Vec<Fact>,
}

impl Item {
    /// Assembles an item from its facts; the item type comes from the first
    /// fact. Returns `None` for an empty fact list.
    #[must_use]
    pub fn from_facts(item_id: ItemId, attributes: Vec<Fact>) -> Option<Self> {
        let item_type = attributes.first()?.item_type.clone();
        Some(Self {
            item_id,
            item_type,
            attributes,
        })
    }

    /// The current fact for `name`: the newest non-discarded one, with
    /// later facts winning timestamp ties.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Fact> {
        self.active_attributes()
            .filter(|f| f.attribute == name)
            .max_by_key(|f| f.timestamp)
    }

    /// Facts not marked as discarded.
    pub fn active_attributes(&self) -> impl Iterator<Item = &Fact> {
        self.attributes.iter().filter(|f| !f.discarded)
    }
}

/// An item draft: optional identity plus the facts to write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialItem {
    #[serde(rename = "itemID", default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    #[serde(rename = "itemType", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub attributes: Vec<PartialFact>,
}

impl PartialItem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn item_id(mut self, item_id: impl Into<ItemId>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    #[must_use]
    pub fn item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = Some(item_type.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, fact: PartialFact) -> Self {
        self.attributes.push(fact);
        self
    }
}

/// Files each attribute under the item unless the attribute names its own
/// item identity.
#[must_use]
pub fn facts_from(item_id: &ItemId, item_type: &str, attributes: Vec<PartialFact>) -> Vec<PartialFact> {
    attributes
        .into_iter()
        .map(|mut fact| {
            fact.item_id.get_or_insert_with(|| item_id.clone());
            fact.item_type.get_or_insert_with(|| item_type.to_string());
            fact
        })
        .collect()
}
