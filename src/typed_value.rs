//! Typed, possibly repeatable value containers.
//!
//! A [`TypedValue`] owns one or more [`Value`]s of a single declared type.
//! The string and numerical arrays seen by storage backends are derived from
//! those values, so they always agree. [`make_typed_value`] is the validating
//! entry point for callers that start from the dual-array form.
//!
//! # Invariants
//! - Every value has the declared type.
//! - A non-repeatable typed value holds exactly one value.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::value::{representations_agree, Value, ValueType};

/// Type assumed when a partial typed value declares none.
pub const DEFAULT_VALUE_TYPE: ValueType = ValueType::Text;

/// One or more values of a declared type.
///
/// # Examples
///
/// ```
/// use itemdrive::{make_typed_value, PartialTypedValue, ValueType};
///
/// let typed = make_typed_value(PartialTypedValue {
///     value_type: Some(ValueType::Number),
///     value: Some(vec!["42".to_string()]),
///     ..Default::default()
/// })
/// .unwrap();
///
/// assert_eq!(typed.value(), vec!["42"]);
/// assert_eq!(typed.numerical_value(), Some(vec![42.0]));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "LegacyTypedValue", try_from = "LegacyTypedValue")]
pub struct TypedValue {
    value_type: ValueType,
    repeatable: bool,
    values: Vec<Value>,
}

impl TypedValue {
    /// Creates a typed value from already-typed values.
    ///
    /// # Errors
    ///
    /// - `TypeMismatch` if any value's type differs from `value_type`
    /// - `NotRepeatable` if `repeatable` is false and `values.len() != 1`
    /// - `InvalidValue` if a value is outside its type's domain
    pub fn new(
        value_type: ValueType,
        repeatable: bool,
        values: Vec<Value>,
    ) -> Result<Self, ValidationError> {
        if !repeatable && values.len() != 1 {
            return Err(ValidationError::NotRepeatable {
                field: "value",
                len: values.len(),
            });
        }

        if let Some(bad) = values.iter().find(|v| v.value_type() != value_type) {
            return Err(ValidationError::TypeMismatch {
                expected: value_type,
                actual: bad.value_type(),
            });
        }

        if let Some(bad) = values.iter().find(|v| !v.in_domain()) {
            return Err(ValidationError::InvalidValue {
                value_type,
                value: bad.to_string(),
            });
        }

        Ok(Self {
            value_type,
            repeatable,
            values: values.into_iter().map(Value::normalized).collect(),
        })
    }

    /// A non-repeatable typed value holding `value`.
    #[must_use]
    pub fn single(value: impl Into<Value>) -> Self {
        let value = value.into().normalized();
        Self {
            value_type: value.value_type(),
            repeatable: false,
            values: vec![value],
        }
    }

    /// A repeatable typed value.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if any value's type differs from `value_type`.
    pub fn repeated(value_type: ValueType, values: Vec<Value>) -> Result<Self, ValidationError> {
        Self::new(value_type, true, values)
    }

    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        self.value_type
    }

    #[must_use]
    pub const fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn first(&self) -> Option<&Value> {
        self.values.first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// String representation of every value.
    #[must_use]
    pub fn value(&self) -> Vec<String> {
        self.values.iter().map(ToString::to_string).collect()
    }

    /// Numerical representation of every value, `None` for non-numerical
    /// types.
    #[must_use]
    pub fn numerical_value(&self) -> Option<Vec<f64>> {
        if !self.value_type.is_numerical() {
            return None;
        }
        self.values.iter().map(Value::numerical).collect()
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Loosely specified typed value, as supplied by callers.
///
/// At least one of `value` and `numerical_value` must be present; the
/// missing one is derived from the other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialTypedValue {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeatable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numerical_value: Option<Vec<f64>>,
}

/// Validates a partial typed value and fills in what is missing.
///
/// # Errors
///
/// - `MissingValue` if neither representation is supplied
/// - `NumericalValueNotAllowed` if a numerical value is given for `text`/`item_id`
/// - `NotRepeatable` if a non-repeatable input does not hold exactly one element
/// - `InvalidValue` / `InvalidNumericalValue` if an element fails its type's format check
/// - `LengthMismatch` if both arrays are given with different lengths
/// - `RepresentationMismatch` if a supplied pair does not convert into each other
pub fn make_typed_value(partial: PartialTypedValue) -> Result<TypedValue, ValidationError> {
    make_typed_value_or(partial, DEFAULT_VALUE_TYPE)
}

/// Like [`make_typed_value`], with a caller-chosen type for partials that
/// declare none.
///
/// # Errors
///
/// See [`make_typed_value`].
pub fn make_typed_value_or(
    partial: PartialTypedValue,
    default_type: ValueType,
) -> Result<TypedValue, ValidationError> {
    let PartialTypedValue {
        value_type,
        repeatable,
        value,
        numerical_value,
    } = partial;

    if value.is_none() && numerical_value.is_none() {
        return Err(ValidationError::MissingValue);
    }

    let value_type = value_type.unwrap_or(default_type);
    if !value_type.is_numerical() && numerical_value.is_some() {
        return Err(ValidationError::NumericalValueNotAllowed { value_type });
    }

    let repeatable = repeatable.unwrap_or(false);
    if !repeatable {
        if let Some(v) = value.as_ref().filter(|v| v.len() != 1) {
            return Err(ValidationError::NotRepeatable {
                field: "value",
                len: v.len(),
            });
        }
        if let Some(n) = numerical_value.as_ref().filter(|n| n.len() != 1) {
            return Err(ValidationError::NotRepeatable {
                field: "numericalValue",
                len: n.len(),
            });
        }
    }

    let parsed = value
        .as_deref()
        .map(|strings| {
            strings
                .iter()
                .map(|s| Value::parse(s, value_type))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let derived = numerical_value
        .as_deref()
        .map(|nums| {
            nums.iter()
                .map(|n| Value::from_numerical(*n, value_type))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    if let (Some(strings), Some(nums)) = (&value, &numerical_value) {
        if strings.len() != nums.len() {
            return Err(ValidationError::LengthMismatch {
                values: strings.len(),
                numerical_values: nums.len(),
            });
        }
        for (s, n) in strings.iter().zip(nums) {
            if !representations_agree(s, *n, value_type) {
                return Err(ValidationError::RepresentationMismatch {
                    value_type,
                    value: s.clone(),
                    numerical_value: *n,
                });
            }
        }
    }

    let values = parsed.or(derived).ok_or(ValidationError::MissingValue)?;
    TypedValue::new(value_type, repeatable, values)
}

/// The dual-array shape typed values take in storage:
/// `{ "type", "repeatable", "value": [...], "numericalValue": [...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTypedValue {
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default)]
    pub value: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numerical_value: Option<Vec<f64>>,
}

impl From<TypedValue> for LegacyTypedValue {
    fn from(typed: TypedValue) -> Self {
        Self {
            value_type: typed.value_type,
            repeatable: typed.repeatable,
            value: typed.value(),
            numerical_value: typed.numerical_value(),
        }
    }
}

impl TryFrom<LegacyTypedValue> for TypedValue {
    type Error = ValidationError;

    fn try_from(legacy: LegacyTypedValue) -> Result<Self, Self::Error> {
        make_typed_value(PartialTypedValue {
            value_type: Some(legacy.value_type),
            repeatable: Some(legacy.repeatable),
            value: Some(legacy.value),
            numerical_value: legacy.numerical_value,
        })
    }
}

impl From<Value> for TypedValue {
    fn from(value: Value) -> Self {
        Self::single(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn strings(v: &[&str]) -> Option<Vec<String>> {
        Some(v.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn test_requires_a_representation() {
        assert_eq!(
            make_typed_value(PartialTypedValue::default()),
            Err(ValidationError::MissingValue)
        );
    }

    #[test]
    fn test_rejects_numerical_value_for_text() {
        let err = make_typed_value(PartialTypedValue {
            value_type: Some(ValueType::Text),
            numerical_value: Some(vec![0.0]),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ValidationError::NumericalValueNotAllowed { .. }));
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = make_typed_value(PartialTypedValue {
            value_type: Some(ValueType::Number),
            repeatable: Some(true),
            value: strings(&["0"]),
            numerical_value: Some(vec![0.0, 1.0]),
        })
        .unwrap_err();
        assert!(matches!(err, ValidationError::LengthMismatch { values: 1, numerical_values: 2 }));
    }

    #[test]
    fn test_non_repeatable_requires_single_element() {
        let err = make_typed_value(PartialTypedValue {
            value: strings(&["a", "b"]),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ValidationError::NotRepeatable { field: "value", len: 2 }));

        let err = make_typed_value(PartialTypedValue {
            value_type: Some(ValueType::Number),
            numerical_value: Some(vec![]),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ValidationError::NotRepeatable { field: "numericalValue", len: 0 }));
    }

    #[test]
    fn test_rejects_bad_format() {
        let err = make_typed_value(PartialTypedValue {
            value_type: Some(ValueType::Number),
            value: strings(&["abc"]),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));

        let err = make_typed_value(PartialTypedValue {
            value_type: Some(ValueType::Boolean),
            numerical_value: Some(vec![0.5]),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidNumericalValue { .. }));
    }

    #[test]
    fn test_rejects_disagreeing_pair() {
        let err = make_typed_value(PartialTypedValue {
            value_type: Some(ValueType::Boolean),
            value: strings(&["true"]),
            numerical_value: Some(vec![0.0]),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_accepts_agreeing_pair() {
        let typed = make_typed_value(PartialTypedValue {
            value_type: Some(ValueType::Boolean),
            value: strings(&["true"]),
            numerical_value: Some(vec![1.0]),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(typed.values(), &[Value::Boolean(true)]);
    }

    #[test]
    fn test_derives_value_from_numerical_value() {
        let typed = make_typed_value(PartialTypedValue {
            value_type: Some(ValueType::DateTime),
            numerical_value: Some(vec![985_392_000_000.0]),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(typed.value(), vec!["2001-03-24T00:00:00.000Z"]);
        assert!(!typed.is_repeatable());
    }

    #[test]
    fn test_derives_numerical_value_from_value() {
        let typed = make_typed_value(PartialTypedValue {
            value_type: Some(ValueType::Number),
            repeatable: Some(true),
            value: strings(&["1", "2.5", "-3"]),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(typed.numerical_value(), Some(vec![1.0, 2.5, -3.0]));
        assert_eq!(typed.len(), 3);
    }

    #[test]
    fn test_text_defaults() {
        let typed = make_typed_value(PartialTypedValue {
            value: strings(&["Ethan"]),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(typed.value_type(), ValueType::Text);
        assert_eq!(typed.value(), vec!["Ethan"]);
        assert_eq!(typed.numerical_value(), None);
    }

    #[test]
    fn test_default_type_override() {
        let typed = make_typed_value_or(
            PartialTypedValue {
                value: strings(&["7"]),
                ..Default::default()
            },
            ValueType::Number,
        )
        .unwrap();
        assert_eq!(typed.numerical_value(), Some(vec![7.0]));
    }

    #[test]
    fn test_repeatable_may_be_empty() {
        let typed = make_typed_value(PartialTypedValue {
            repeatable: Some(true),
            value: Some(vec![]),
            ..Default::default()
        })
        .unwrap();
        assert!(typed.is_empty());
    }

    #[test]
    fn test_new_checks_types() {
        let err = TypedValue::new(ValueType::Number, false, vec![Value::from("x")]).unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { .. }));

        let err = TypedValue::new(ValueType::Text, false, vec![]).unwrap_err();
        assert!(matches!(err, ValidationError::NotRepeatable { .. }));

        let typed = TypedValue::repeated(ValueType::Boolean, vec![true.into(), false.into()]).unwrap();
        assert_eq!(typed.numerical_value(), Some(vec![1.0, 0.0]));
    }

    #[test]
    fn test_single_normalizes_date_times() {
        let at = DateTime::from_timestamp(0, 1_500_000).unwrap();
        let typed = TypedValue::single(Value::DateTime(at));
        assert_eq!(typed.numerical_value(), Some(vec![1.0]));
    }

    #[test]
    fn test_legacy_shape() {
        let typed = TypedValue::single(Value::Boolean(false));
        let json = serde_json::to_value(&typed).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "boolean",
                "repeatable": false,
                "value": ["false"],
                "numericalValue": [0.0],
            })
        );
        let back: TypedValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, typed);

        let text = TypedValue::single("hello");
        let json = serde_json::to_value(&text).unwrap();
        assert!(json.get("numericalValue").is_none());
    }

    #[test]
    fn test_legacy_shape_is_validated() {
        let bad = serde_json::json!({
            "type": "boolean",
            "value": ["true"],
            "numericalValue": [0],
        });
        assert!(serde_json::from_value::<TypedValue>(bad).is_err());
    }

    #[test]
    fn test_date_times_beyond_year_9999_are_rejected() {
        let err = make_typed_value(PartialTypedValue {
            value_type: Some(ValueType::DateTime),
            numerical_value: Some(vec![253_402_300_800_000.0]),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidNumericalValue { .. }));

        let far = DateTime::from_timestamp_millis(253_402_300_800_000).unwrap();
        assert!(matches!(
            TypedValue::new(ValueType::DateTime, false, vec![Value::DateTime(far)]),
            Err(ValidationError::InvalidValue { .. })
        ));

        let legacy = r#"{"type":"date_time","repeatable":false,"value":["+10000-01-01T00:00:00.000Z"]}"#;
        assert!(serde_json::from_str::<TypedValue>(legacy).is_err());
    }
}
