//! Null-likeness classification.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::types::{LeafClass, Value};

use super::collector::ValueSet;

/// Caller-supplied sentinel values that count as "no data".
///
/// `None` entries stand for the absent marker ([`Value::Null`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NullDefinition {
    /// Null-like values for string-like leaves.
    pub strings: Vec<Option<String>>,
    /// Null-like values for numeric-like leaves. Integers match numerically (`0` matches `0.0`).
    pub numbers: Vec<Option<f64>>,
}

impl Default for NullDefinition {
    fn default() -> Self {
        Self {
            strings: vec![
                Some(String::new()),
                Some("NULL".to_string()),
                Some("null".to_string()),
                None,
            ],
            numbers: vec![None],
        }
    }
}

impl NullDefinition {
    /// Null sets for string-like and numeric-like leaves; `None` stands for [`Value::Null`].
    pub fn new(strings: Vec<Option<String>>, numbers: Vec<Option<f64>>) -> Self {
        Self { strings, numbers }
    }

    /// Whether `value` is in the null string set.
    pub fn matches_string(&self, value: &Value) -> bool {
        match value {
            Value::Null => self.strings.iter().any(Option::is_none),
            Value::Utf8(s) => self.strings.iter().flatten().any(|n| n == s),
            _ => false,
        }
    }

    /// Whether `value` is in the null numeric set.
    pub fn matches_number(&self, value: &Value) -> bool {
        match value {
            Value::Null => self.numbers.iter().any(Option::is_none),
            Value::Int64(_) | Value::Float64(_) => match value.as_f64() {
                Some(x) => self
                    .numbers
                    .iter()
                    .flatten()
                    .any(|n| OrderedFloat(*n) == OrderedFloat(x)),
                None => false,
            },
            _ => false,
        }
    }

    /// Whether a single normalized value is null-like for a leaf of class `class`.
    pub fn matches(&self, class: LeafClass, value: &Value) -> bool {
        match class {
            LeafClass::StringLike => self.matches_string(value),
            LeafClass::NumericLike => self.matches_number(value),
            LeafClass::Absent => true,
            LeafClass::OtherUnsupported => false,
        }
    }
}

/// Decide whether a leaf is null-like from its declared class and observed value set.
///
/// - `Absent` leaves are always null-like.
/// - `OtherUnsupported` leaves never are.
/// - String/numeric leaves are null-like when every observed value is in the matching null set;
///   an empty value set (no rows) is null-like.
pub fn is_null_like(class: LeafClass, values: &ValueSet, nulls: &NullDefinition) -> bool {
    match class {
        LeafClass::Absent => true,
        LeafClass::OtherUnsupported => false,
        LeafClass::StringLike | LeafClass::NumericLike => {
            if values.is_empty() {
                return true;
            }
            values.iter().all(|v| nulls.matches(class, v))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: Vec<Value>) -> ValueSet {
        values.into_iter().collect()
    }

    #[test]
    fn string_leaf_with_only_sentinels_is_null_like() {
        let nulls = NullDefinition::default();
        let values = set(vec![Value::from(""), Value::from("NULL"), Value::Null]);
        assert!(is_null_like(LeafClass::StringLike, &values, &nulls));
    }

    #[test]
    fn string_leaf_with_real_value_is_kept() {
        let nulls = NullDefinition::default();
        let values = set(vec![Value::from(""), Value::from("BTC")]);
        assert!(!is_null_like(LeafClass::StringLike, &values, &nulls));
    }

    #[test]
    fn numeric_leaf_uses_numeric_set() {
        let nulls = NullDefinition::default();
        assert!(is_null_like(
            LeafClass::NumericLike,
            &set(vec![Value::Null]),
            &nulls
        ));
        assert!(!is_null_like(
            LeafClass::NumericLike,
            &set(vec![Value::Null, Value::Int64(0)]),
            &nulls
        ));

        let zero_is_null = NullDefinition::new(vec![None], vec![None, Some(0.0)]);
        assert!(is_null_like(
            LeafClass::NumericLike,
            &set(vec![Value::Int64(0), Value::float(0.0), Value::Null]),
            &zero_is_null
        ));
    }

    #[test]
    fn string_sentinels_do_not_apply_to_numeric_leaves() {
        let nulls = NullDefinition::default();
        assert!(!nulls.matches_number(&Value::from("NULL")));
        assert!(!nulls.matches_string(&Value::Int64(0)));
    }

    #[test]
    fn absent_and_unsupported_ignore_values() {
        let nulls = NullDefinition::default();
        let values = set(vec![Value::Bool(true)]);
        assert!(is_null_like(LeafClass::Absent, &values, &nulls));
        assert!(!is_null_like(LeafClass::OtherUnsupported, &values, &nulls));
        assert!(!is_null_like(
            LeafClass::OtherUnsupported,
            &ValueSet::new(),
            &nulls
        ));
    }

    #[test]
    fn empty_value_set_is_vacuously_null_like() {
        let nulls = NullDefinition::new(vec![], vec![]);
        assert!(is_null_like(LeafClass::StringLike, &ValueSet::new(), &nulls));
        assert!(is_null_like(LeafClass::NumericLike, &ValueSet::new(), &nulls));
    }

    #[test]
    fn null_definition_deserializes_with_absent_marker() {
        let nulls: NullDefinition =
            serde_json::from_str(r#"{"strings": ["", "N/A", null], "numbers": [null, -1]}"#)
                .unwrap();
        assert!(nulls.matches_string(&Value::from("N/A")));
        assert!(nulls.matches_string(&Value::Null));
        assert!(nulls.matches_number(&Value::Int64(-1)));
        assert!(!nulls.matches_string(&Value::from("NULL")));
    }
}
