//! Declarative fact queries and the predicate evaluator.
//!
//! A [`FactQuery`] restricts by identity (`item_id`, `fact_id`, each a
//! list with OR semantics) and by attribute conditions. How several
//! [`AttributeQuery`] entries combine is controlled by [`QueryMode`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fact::Fact;
use crate::ids::{FactId, ItemId};
use crate::value::{Value, ValueType};

/// How the attribute conditions of a query combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// A single fact must satisfy every attribute query.
    ///
    /// With more than one distinct attribute name nothing can match, since
    /// a fact describes exactly one attribute.
    #[default]
    FactConjunction,
    /// Every attribute query must be satisfied by some fact of the item.
    ///
    /// At fact level this accepts facts matching any attribute query; use
    /// [`check_item`] to evaluate the whole item.
    ItemConjunction,
}

/// Conditions on facts of one attribute.
///
/// Unset conditions are ignored. "Includes" conditions hold if some element
/// of the fact's value array satisfies them; "excludes" conditions hold if
/// no element does. Numerical conditions never hold for facts of a type
/// without a numerical projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeQuery {
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_includes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_excludes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numerical_value_includes: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numerical_value_excludes: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numerical_value_includes_at_or_above: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numerical_value_includes_at_or_below: Option<f64>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at_or_after: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at_or_before: Option<DateTime<Utc>>,
}

impl AttributeQuery {
    #[must_use]
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn value_includes<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.value_includes = Some(values.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn value_excludes<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.value_excludes = Some(values.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn numerical_value_includes(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.numerical_value_includes = Some(values.into_iter().collect());
        self
    }

    #[must_use]
    pub fn numerical_value_excludes(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.numerical_value_excludes = Some(values.into_iter().collect());
        self
    }

    #[must_use]
    pub fn at_or_above(mut self, bound: f64) -> Self {
        self.numerical_value_includes_at_or_above = Some(bound);
        self
    }

    #[must_use]
    pub fn at_or_below(mut self, bound: f64) -> Self {
        self.numerical_value_includes_at_or_below = Some(bound);
        self
    }

    #[must_use]
    pub fn created_at_or_after(mut self, at: DateTime<Utc>) -> Self {
        self.created_at_or_after = Some(at);
        self
    }

    #[must_use]
    pub fn created_at_or_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_at_or_before = Some(at);
        self
    }

    /// Whether `fact` describes this attribute and satisfies every set
    /// condition.
    #[must_use]
    pub fn matches(&self, fact: &Fact) -> bool {
        if fact.attribute != self.attribute {
            return false;
        }
        if self.created_at_or_after.is_some_and(|at| fact.timestamp < at) {
            return false;
        }
        if self.created_at_or_before.is_some_and(|at| fact.timestamp > at) {
            return false;
        }

        let values = fact.value();
        let value_type = fact.value_type();
        if let Some(wanted) = &self.value_includes {
            let wanted = canonical_strings(wanted, value_type);
            if !values.iter().any(|v| wanted.contains(v)) {
                return false;
            }
        }
        if let Some(unwanted) = &self.value_excludes {
            let unwanted = canonical_strings(unwanted, value_type);
            if values.iter().any(|v| unwanted.contains(v)) {
                return false;
            }
        }

        if !self.has_numerical_condition() {
            return true;
        }
        let Some(numbers) = fact.numerical_value() else {
            return false;
        };
        if let Some(wanted) = &self.numerical_value_includes {
            if !numbers.iter().any(|n| wanted.contains(n)) {
                return false;
            }
        }
        if let Some(unwanted) = &self.numerical_value_excludes {
            if numbers.iter().any(|n| unwanted.contains(n)) {
                return false;
            }
        }
        if let Some(bound) = self.numerical_value_includes_at_or_above {
            if !numbers.iter().any(|n| *n >= bound) {
                return false;
            }
        }
        if let Some(bound) = self.numerical_value_includes_at_or_below {
            if !numbers.iter().any(|n| *n <= bound) {
                return false;
            }
        }
        true
    }

    const fn has_numerical_condition(&self) -> bool {
        self.numerical_value_includes.is_some()
            || self.numerical_value_excludes.is_some()
            || self.numerical_value_includes_at_or_above.is_some()
            || self.numerical_value_includes_at_or_below.is_some()
    }
}

const fn default_include_discarded() -> bool {
    true
}

/// Query over stored facts.
///
/// The default query matches every fact.
///
/// # Examples
///
/// ```
/// use itemdrive::{AttributeQuery, FactQuery};
///
/// let query = FactQuery::new()
///     .item_id("item-1")
///     .attribute(AttributeQuery::new("name").value_includes(["Ethan"]));
/// assert_eq!(query.item_id.as_deref().map(<[_]>::len), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactQuery {
    #[serde(rename = "itemID", default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<Vec<ItemId>>,
    #[serde(rename = "factID", default, skip_serializing_if = "Option::is_none")]
    pub fact_id: Option<Vec<FactId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<AttributeQuery>>,
    #[serde(default)]
    pub mode: QueryMode,
    #[serde(default = "default_include_discarded")]
    pub include_discarded: bool,
}

impl Default for FactQuery {
    fn default() -> Self {
        Self {
            item_id: None,
            fact_id: None,
            attributes: None,
            mode: QueryMode::default(),
            include_discarded: default_include_discarded(),
        }
    }
}

impl FactQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All facts of one item.
    #[must_use]
    pub fn for_item(item_id: impl Into<ItemId>) -> Self {
        Self::new().item_id(item_id)
    }

    /// Adds an item identifier to the accepted set.
    #[must_use]
    pub fn item_id(mut self, item_id: impl Into<ItemId>) -> Self {
        self.item_id.get_or_insert_with(Vec::new).push(item_id.into());
        self
    }

    #[must_use]
    pub fn item_ids<I, T>(mut self, item_ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemId>,
    {
        self.item_id
            .get_or_insert_with(Vec::new)
            .extend(item_ids.into_iter().map(Into::into));
        self
    }

    /// Adds a fact identifier to the accepted set.
    #[must_use]
    pub fn fact_id(mut self, fact_id: impl Into<FactId>) -> Self {
        self.fact_id.get_or_insert_with(Vec::new).push(fact_id.into());
        self
    }

    #[must_use]
    pub fn fact_ids<I, T>(mut self, fact_ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<FactId>,
    {
        self.fact_id
            .get_or_insert_with(Vec::new)
            .extend(fact_ids.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn attribute(mut self, attribute: AttributeQuery) -> Self {
        self.attributes.get_or_insert_with(Vec::new).push(attribute);
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn include_discarded(mut self, include: bool) -> Self {
        self.include_discarded = include;
        self
    }

    /// Identity and discard filters only.
    fn admits(&self, fact: &Fact) -> bool {
        if !self.include_discarded && fact.discarded {
            return false;
        }
        if let Some(ids) = &self.item_id {
            if !ids.contains(&fact.item_id) {
                return false;
            }
        }
        if let Some(ids) = &self.fact_id {
            if !ids.contains(&fact.fact_id) {
                return false;
            }
        }
        true
    }
}

/// Query strings in the canonical form stored values use, so `"1.50"`
/// finds a stored `1.5`. Strings that do not parse as `value_type` are
/// compared as given.
fn canonical_strings(strings: &[String], value_type: ValueType) -> Vec<String> {
    strings
        .iter()
        .map(|s| {
            Value::parse(s, value_type)
                .map_or_else(|_| s.clone(), |v| v.normalized().to_string())
        })
        .collect()
}

/// Evaluates `query` against a single fact.
///
/// Identity lists use OR semantics within a list and AND across lists.
/// Attribute queries combine according to [`FactQuery::mode`].
#[must_use]
pub fn check_fact(fact: &Fact, query: &FactQuery) -> bool {
    if !query.admits(fact) {
        return false;
    }
    match (&query.attributes, query.mode) {
        (None, _) => true,
        (Some(attributes), QueryMode::FactConjunction) => attributes.iter().all(|a| a.matches(fact)),
        (Some(attributes), QueryMode::ItemConjunction) => {
            attributes.is_empty() || attributes.iter().any(|a| a.matches(fact))
        }
    }
}

/// Evaluates `query` against all facts of one item.
///
/// Only facts passing the identity and discard filters count. In
/// [`QueryMode::FactConjunction`] some fact must pass [`check_fact`]; in
/// [`QueryMode::ItemConjunction`] each attribute query must be satisfied by
/// some fact.
#[must_use]
pub fn check_item(facts: &[Fact], query: &FactQuery) -> bool {
    let mut admitted = facts.iter().filter(|f| query.admits(f)).peekable();
    match (&query.attributes, query.mode) {
        (None, _) => admitted.peek().is_some(),
        (Some(_), QueryMode::FactConjunction) => admitted.any(|f| check_fact(f, query)),
        (Some(attributes), QueryMode::ItemConjunction) => {
            let admitted: Vec<&Fact> = admitted.collect();
            !admitted.is_empty()
                && attributes
                    .iter()
                    .all(|a| admitted.iter().any(|f| a.matches(f)))
        }
    }
}
