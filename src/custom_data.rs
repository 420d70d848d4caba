//! Free-form custom data attached to playlists and songs.
//!
//! Wire formats carry arbitrary JSON under `customData`, and any field a
//! handler does not recognize is captured here too. Values are kept as a
//! closed [`CustomValue`] enum instead of raw JSON so that callers can check
//! types (e.g. `AllowDuplicates` must be a bool).

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

/// Custom-data map, ordered by key for stable output.
pub type CustomData = BTreeMap<String, CustomValue>;

/// A single custom-data value.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<CustomValue>),
    Map(CustomData),
}

impl CustomValue {
    /// Convert a JSON value, picking the most specific scalar type.
    ///
    /// `null` has no representation and yields `None`; nulls inside arrays
    /// and objects are dropped.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::String(s) => Some(Self::String(s)),
            Value::Array(items) => Some(Self::List(
                items.into_iter().filter_map(Self::from_json).collect(),
            )),
            Value::Object(map) => Some(Self::Map(data_from_json(map))),
        }
    }

    /// Convert back to JSON. Non-finite floats become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::Number((*i).into()),
            Self::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::String(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Value::Object(data_to_json(map)),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[CustomValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&CustomData> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Short type name, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

impl From<bool> for CustomValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for CustomValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for CustomValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for CustomValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CustomValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<CustomValue>> for CustomValue {
    fn from(value: Vec<CustomValue>) -> Self {
        Self::List(value)
    }
}

/// Convert a JSON object into custom data.
pub fn data_from_json(map: Map<String, Value>) -> CustomData {
    map.into_iter()
        .filter_map(|(key, value)| CustomValue::from_json(value).map(|v| (key, v)))
        .collect()
}

/// Convert custom data into a JSON object.
pub fn data_to_json(data: &CustomData) -> Map<String, Value> {
    data.iter()
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect()
}

/// Merge `incoming` into `target`; keys already in `target` win.
pub fn merge_missing(target: &mut CustomData, incoming: CustomData) {
    for (key, value) in incoming {
        target.entry(key).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_pick_specific_type() {
        assert_eq!(CustomValue::from_json(json!(3)), Some(CustomValue::Integer(3)));
        assert_eq!(CustomValue::from_json(json!(2.5)), Some(CustomValue::Float(2.5)));
        assert_eq!(CustomValue::from_json(json!(true)), Some(CustomValue::Bool(true)));
        assert_eq!(
            CustomValue::from_json(json!("x")),
            Some(CustomValue::String("x".into()))
        );
        assert_eq!(CustomValue::from_json(Value::Null), None);
    }

    #[test]
    fn test_arrays_become_ordered_lists() {
        let value = CustomValue::from_json(json!([1, "two", null, [false]])).unwrap();
        assert_eq!(
            value,
            CustomValue::List(vec![
                CustomValue::Integer(1),
                CustomValue::String("two".into()),
                CustomValue::List(vec![CustomValue::Bool(false)]),
            ])
        );
    }

    #[test]
    fn test_json_roundtrip_of_nested_object() {
        let original = json!({"syncURL": "https://example.com/p", "weights": [1, 2.5], "nested": {"a": true}});
        let Value::Object(map) = original.clone() else {
            unreachable!()
        };
        let data = data_from_json(map);
        assert_eq!(Value::Object(data_to_json(&data)), original);
    }

    #[test]
    fn test_merge_missing_keeps_existing() {
        let mut target = CustomData::new();
        target.insert("AllowDuplicates".into(), false.into());
        let mut incoming = CustomData::new();
        incoming.insert("AllowDuplicates".into(), true.into());
        incoming.insert("extra".into(), "value".into());

        merge_missing(&mut target, incoming);
        assert_eq!(target["AllowDuplicates"], CustomValue::Bool(false));
        assert_eq!(target["extra"].as_str(), Some("value"));
    }
}
