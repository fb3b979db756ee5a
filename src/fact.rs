//! Facts: the atomic unit of storage.
//!
//! A [`Fact`] states that an attribute of an item holds a typed value as of
//! a timestamp. Facts are built by a [`FactFactory`] from a [`PartialFact`],
//! which fills in identifiers, timestamps and defaults and validates the
//! value. Once built, a fact is never modified in place; newer facts (or a
//! re-insert under the same `fact_id`) describe change.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::{FactId, IdGenerator, ItemId, TimeOrderedIds};
use crate::time::{truncate_to_millis, Clock, SystemClock};
use crate::typed_value::{make_typed_value_or, PartialTypedValue, TypedValue, DEFAULT_VALUE_TYPE};
use crate::value::{Value, ValueType};

/// Item type assigned to facts that declare none.
pub const DEFAULT_ITEM_TYPE: &str = "empty";

/// A typed attribute value of one item.
///
/// Serializes to the flat storage shape:
/// `{ factID, itemID, itemType, attribute, timestamp, discarded, type,
/// repeatable, value, numericalValue }` with `timestamp` in epoch
/// milliseconds.
///
/// # Examples
///
/// ```
/// use itemdrive::{make_fact, PartialFact};
///
/// let fact = make_fact(PartialFact::new().attribute("name").value(["Ethan"])).unwrap();
/// assert_eq!(fact.attribute, "name");
/// assert_eq!(fact.value(), vec!["Ethan"]);
/// assert!(!fact.discarded);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    #[serde(rename = "factID")]
    pub fact_id: FactId,
    #[serde(rename = "itemID")]
    pub item_id: ItemId,
    #[serde(rename = "itemType")]
    pub item_type: String,
    pub attribute: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub discarded: bool,
    #[serde(flatten)]
    pub typed_value: TypedValue,
}

impl Fact {
    #[must_use]
    pub fn value(&self) -> Vec<String> {
        self.typed_value.value()
    }

    #[must_use]
    pub fn numerical_value(&self) -> Option<Vec<f64>> {
        self.typed_value.numerical_value()
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        self.typed_value.values()
    }

    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        self.typed_value.value_type()
    }

    #[must_use]
    pub const fn is_repeatable(&self) -> bool {
        self.typed_value.is_repeatable()
    }

    /// A partial that rebuilds exactly this fact.
    ///
    /// Used to copy facts between stores and to derive updated versions,
    /// e.g. `fact.to_partial().discarded(true)`.
    #[must_use]
    pub fn to_partial(&self) -> PartialFact {
        PartialFact {
            fact_id: Some(self.fact_id.clone()),
            item_id: Some(self.item_id.clone()),
            item_type: Some(self.item_type.clone()),
            attribute: Some(self.attribute.clone()),
            timestamp: Some(self.timestamp),
            discarded: Some(self.discarded),
            typed_value: PartialTypedValue {
                value_type: Some(self.value_type()),
                repeatable: Some(self.is_repeatable()),
                value: Some(self.value()),
                numerical_value: None,
            },
        }
    }
}

/// Fact fields as supplied by callers; anything left out is defaulted by
/// the factory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialFact {
    #[serde(rename = "factID", default, skip_serializing_if = "Option::is_none")]
    pub fact_id: Option<FactId>,
    #[serde(rename = "itemID", default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discarded: Option<bool>,
    #[serde(flatten)]
    pub typed_value: PartialTypedValue,
}

impl PartialFact {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    #[must_use]
    pub fn fact_id(mut self, fact_id: impl Into<FactId>) -> Self {
        self.fact_id = Some(fact_id.into());
        self
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
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn discarded(mut self, discarded: bool) -> Self {
        self.discarded = Some(discarded);
        self
    }

    #[must_use]
    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.typed_value.value_type = Some(value_type);
        self
    }

    #[must_use]
    pub fn repeatable(mut self, repeatable: bool) -> Self {
        self.typed_value.repeatable = Some(repeatable);
        self
    }

    /// Sets the string representation.
    #[must_use]
    pub fn value<I, S>(mut self, value: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.typed_value.value = Some(value.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the numerical representation.
    #[must_use]
    pub fn numerical_value(mut self, numerical_value: impl IntoIterator<Item = f64>) -> Self {
        self.typed_value.numerical_value = Some(numerical_value.into_iter().collect());
        self
    }

    /// Sets type, repeatability and value from an already-typed value.
    #[must_use]
    pub fn typed(mut self, typed: &TypedValue) -> Self {
        self.typed_value = PartialTypedValue {
            value_type: Some(typed.value_type()),
            repeatable: Some(typed.is_repeatable()),
            value: Some(typed.value()),
            numerical_value: None,
        };
        self
    }

    /// Sets a single, non-repeatable value.
    #[must_use]
    pub fn single(self, value: impl Into<Value>) -> Self {
        self.typed(&TypedValue::single(value))
    }
}

/// Builds facts from partials.
///
/// Holds the clock used for default timestamps and the generator used for
/// missing identifiers; swap both for deterministic tests.
#[derive(Debug, Clone)]
pub struct FactFactory {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    default_value_type: ValueType,
}

impl Default for FactFactory {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(TimeOrderedIds))
    }
}

impl FactFactory {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            clock,
            ids,
            default_value_type: DEFAULT_VALUE_TYPE,
        }
    }

    /// Sets the type assumed for partials that declare none.
    #[must_use]
    pub fn with_default_value_type(mut self, value_type: ValueType) -> Self {
        self.default_value_type = value_type;
        self
    }

    /// Current time according to the factory's clock, at millisecond
    /// precision.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        truncate_to_millis(self.clock.now())
    }

    #[must_use]
    pub fn ids(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }

    /// Builds a fact, timestamped now unless the partial says otherwise.
    ///
    /// # Errors
    ///
    /// See [`FactFactory::make_at`].
    pub fn make(&self, partial: PartialFact) -> Result<Fact, ValidationError> {
        let at = self.now();
        self.make_at(partial, at)
    }

    /// Builds a fact using `at` as the reference time when the partial has
    /// no timestamp.
    ///
    /// # Errors
    ///
    /// - `MissingField` / `EmptyField` for a missing or blank attribute
    /// - `EmptyField` for a blank supplied identifier
    /// - any error of [`make_typed_value`](crate::make_typed_value)
    pub fn make_at(&self, partial: PartialFact, at: DateTime<Utc>) -> Result<Fact, ValidationError> {
        let PartialFact {
            fact_id,
            item_id,
            item_type,
            attribute,
            timestamp,
            discarded,
            typed_value,
        } = partial;

        let attribute = attribute.ok_or(ValidationError::MissingField { field: "attribute" })?;
        if attribute.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "attribute" });
        }
        if fact_id.as_ref().is_some_and(FactId::is_empty) {
            return Err(ValidationError::EmptyField { field: "factID" });
        }
        if item_id.as_ref().is_some_and(ItemId::is_empty) {
            return Err(ValidationError::EmptyField { field: "itemID" });
        }

        let typed_value = make_typed_value_or(typed_value, self.default_value_type)?;

        let timestamp = truncate_to_millis(timestamp.unwrap_or(at));
        Ok(Fact {
            fact_id: fact_id.unwrap_or_else(|| self.ids.fact_id(timestamp)),
            item_id: item_id.unwrap_or_else(|| self.ids.item_id(timestamp)),
            item_type: item_type.unwrap_or_else(|| DEFAULT_ITEM_TYPE.to_string()),
            attribute,
            timestamp,
            discarded: discarded.unwrap_or(false),
            typed_value,
        })
    }
}

/// Builds a fact with the system clock and time-ordered identifiers.
///
/// # Errors
///
/// See [`FactFactory::make_at`].
pub fn make_fact(partial: PartialFact) -> Result<Fact, ValidationError> {
    FactFactory::default().make(partial)
}

/// Builds a fact with `at` as the reference time.
///
/// # Errors
///
/// See [`FactFactory::make_at`].
pub fn make_fact_at(partial: PartialFact, at: DateTime<Utc>) -> Result<Fact, ValidationError> {
    FactFactory::default().make_at(partial, at)
}
