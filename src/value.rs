//! Value types that facts can hold.
//!
//! Every declared [`ValueType`] has a canonical string form. Numerical types
//! (`number`, `date_time`, `boolean`) also have a numeric projection, and the
//! two forms convert into each other losslessly:
//!
//! | type        | string form                  | numeric form          |
//! |-------------|------------------------------|-----------------------|
//! | `number`    | shortest decimal, e.g. `1.5` | the number itself     |
//! | `boolean`   | `true` / `false`             | `1` / `0`             |
//! | `date_time` | `2001-03-24T00:00:00.000Z`   | epoch milliseconds    |
//! | `text`      | the text                     | none                  |
//! | `item_id`   | the referenced item ID       | none                  |

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::ItemId;
use crate::time::{to_iso_string, truncate_to_millis};

/// Literal string form of a true boolean.
pub const BOOLEAN_TRUE: &str = "true";
/// Literal string form of a false boolean.
pub const BOOLEAN_FALSE: &str = "false";
pub const BOOLEAN_TRUE_NUMERICAL: f64 = 1.0;
pub const BOOLEAN_FALSE_NUMERICAL: f64 = 0.0;

/// Earliest `date_time`, `0000-01-01T00:00:00.000Z`, in epoch milliseconds.
pub const MIN_DATE_TIME_MILLIS: i64 = -62_167_219_200_000;
/// Latest `date_time`, `9999-12-31T23:59:59.999Z`, in epoch milliseconds.
///
/// Four-digit years are all RFC 3339 can spell, so the canonical string
/// form stays parseable across the whole range.
pub const MAX_DATE_TIME_MILLIS: i64 = 253_402_300_799_999;

/// Declared type of a typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    Text,
    Number,
    DateTime,
    Boolean,
    ItemId,
}

impl ValueType {
    /// All value types, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Text,
        Self::Number,
        Self::DateTime,
        Self::Boolean,
        Self::ItemId,
    ];

    /// Returns true if values of this type have a numerical projection.
    #[must_use]
    pub const fn is_numerical(self) -> bool {
        matches!(self, Self::Number | Self::DateTime | Self::Boolean)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::DateTime => "date_time",
            Self::Boolean => "boolean",
            Self::ItemId => "item_id",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownValueType { name: s.to_string() })
    }
}

/// A single value, tagged with its type.
///
/// Holding the parsed value rather than a string/number pair means the two
/// representations cannot disagree; both are derived on demand.
///
/// # Examples
///
/// ```
/// use itemdrive::{Value, ValueType};
///
/// let v = Value::parse("true", ValueType::Boolean).unwrap();
/// assert_eq!(v, Value::Boolean(true));
/// assert_eq!(v.numerical(), Some(1.0));
/// assert_eq!(v.to_string(), "true");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Text(String),
    Number(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    #[serde(rename = "item_id")]
    ItemRef(ItemId),
}

impl Value {
    /// Parses the string form of a value of the given type.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidValue` if `value` is not a valid
    /// string form for `value_type`.
    pub fn parse(value: &str, value_type: ValueType) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidValue {
            value_type,
            value: value.to_string(),
        };

        match value_type {
            ValueType::Text => Ok(Self::Text(value.to_string())),
            ValueType::ItemId => Ok(Self::ItemRef(ItemId::from(value))),
            ValueType::Number => value
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Self::Number)
                .ok_or_else(invalid),
            ValueType::Boolean => match value {
                BOOLEAN_TRUE => Ok(Self::Boolean(true)),
                BOOLEAN_FALSE => Ok(Self::Boolean(false)),
                _ => Err(invalid()),
            },
            ValueType::DateTime => parse_date_time(value).map(Self::DateTime).ok_or_else(invalid),
        }
    }

    /// Builds a value from its numerical projection.
    ///
    /// # Errors
    ///
    /// - `NoNumericalProjection` for `text` and `item_id`
    /// - `InvalidNumericalValue` if `numerical` is out of the type's domain
    pub fn from_numerical(numerical: f64, value_type: ValueType) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidNumericalValue {
            value_type,
            value: numerical,
        };

        match value_type {
            ValueType::Text | ValueType::ItemId => {
                Err(ValidationError::NoNumericalProjection { value_type })
            }
            ValueType::Number if numerical.is_finite() => Ok(Self::Number(numerical)),
            ValueType::Number => Err(invalid()),
            ValueType::Boolean => {
                if numerical == BOOLEAN_TRUE_NUMERICAL {
                    Ok(Self::Boolean(true))
                } else if numerical == BOOLEAN_FALSE_NUMERICAL {
                    Ok(Self::Boolean(false))
                } else {
                    Err(invalid())
                }
            }
            ValueType::DateTime => {
                #[allow(clippy::cast_precision_loss)]
                let range = MIN_DATE_TIME_MILLIS as f64..=MAX_DATE_TIME_MILLIS as f64;
                if !numerical.is_finite() || numerical.fract() != 0.0 || !range.contains(&numerical) {
                    return Err(invalid());
                }
                #[allow(clippy::cast_possible_truncation)]
                let millis = numerical as i64;
                DateTime::from_timestamp_millis(millis)
                    .map(Self::DateTime)
                    .ok_or_else(invalid)
            }
        }
    }

    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Text(_) => ValueType::Text,
            Self::Number(_) => ValueType::Number,
            Self::Boolean(_) => ValueType::Boolean,
            Self::DateTime(_) => ValueType::DateTime,
            Self::ItemRef(_) => ValueType::ItemId,
        }
    }

    /// Numerical projection, `None` for non-numerical types.
    #[must_use]
    pub fn numerical(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Boolean(true) => Some(BOOLEAN_TRUE_NUMERICAL),
            Self::Boolean(false) => Some(BOOLEAN_FALSE_NUMERICAL),
            #[allow(clippy::cast_precision_loss)]
            Self::DateTime(at) => Some(at.timestamp_millis() as f64),
            Self::Text(_) | Self::ItemRef(_) => None,
        }
    }

    /// Returns true if the value lies in its type's domain: finite numbers,
    /// date-times with four-digit UTC years.
    #[must_use]
    pub fn in_domain(&self) -> bool {
        match self {
            Self::Number(n) => n.is_finite(),
            Self::DateTime(at) => date_time_in_range(*at),
            Self::Text(_) | Self::Boolean(_) | Self::ItemRef(_) => true,
        }
    }

    /// Brings the value into canonical form. Date-times lose sub-millisecond
    /// precision.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::DateTime(at) => Self::DateTime(truncate_to_millis(at)),
            other => other,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_date_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_item_ref(&self) -> Option<&ItemId> {
        match self {
            Self::ItemRef(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => f.write_str(v),
            Self::Number(v) => write!(f, "{v}"),
            Self::Boolean(true) => f.write_str(BOOLEAN_TRUE),
            Self::Boolean(false) => f.write_str(BOOLEAN_FALSE),
            Self::DateTime(at) => f.write_str(&to_iso_string(*at)),
            Self::ItemRef(id) => write!(f, "{id}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(truncate_to_millis(v))
    }
}

impl From<ItemId> for Value {
    fn from(v: ItemId) -> Self {
        Self::ItemRef(v)
    }
}

fn parse_date_time(value: &str) -> Option<DateTime<Utc>> {
    let at = match DateTime::parse_from_rfc3339(value) {
        Ok(at) => truncate_to_millis(at.with_timezone(&Utc)),
        // Date-only forms are read as midnight UTC.
        Err(_) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))?
            .and_utc(),
    };
    // Offsets can push a four-digit local year out of range once in UTC.
    date_time_in_range(at).then_some(at)
}

fn date_time_in_range(at: DateTime<Utc>) -> bool {
    (MIN_DATE_TIME_MILLIS..=MAX_DATE_TIME_MILLIS).contains(&at.timestamp_millis())
}

/// Returns true if `value` is a valid string form for `value_type`.
#[must_use]
pub fn check(value: &str, value_type: ValueType) -> bool {
    Value::parse(value, value_type).is_ok()
}

/// Returns true if `numerical` is a valid numerical form for `value_type`.
///
/// Non-numerical types accept nothing.
#[must_use]
pub fn check_numerical(numerical: f64, value_type: ValueType) -> bool {
    Value::from_numerical(numerical, value_type).is_ok()
}

/// Converts a numerical value to its canonical string form.
///
/// # Errors
///
/// Fails for non-numerical types and for out-of-domain numbers.
pub fn to_value(numerical: f64, value_type: ValueType) -> Result<String, ValidationError> {
    Value::from_numerical(numerical, value_type).map(|v| v.to_string())
}

/// Converts a string value to its numerical projection.
///
/// Returns `Ok(None)` for types without a numerical projection.
///
/// # Errors
///
/// Returns `InvalidValue` if the string does not parse as `value_type`.
pub fn to_numerical_value(value: &str, value_type: ValueType) -> Result<Option<f64>, ValidationError> {
    Value::parse(value, value_type).map(|v| v.numerical())
}

/// Returns true if `value` and `numerical` describe the same value in both
/// directions.
#[must_use]
pub fn representations_agree(value: &str, numerical: f64, value_type: ValueType) -> bool {
    let forward = to_value(numerical, value_type).map_or(false, |v| v == value);
    let backward = to_numerical_value(value, value_type).map_or(false, |n| n == Some(numerical));
    forward && backward
}
