//! Dynamic values held by reactive sources.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Value>),
    /// Insertion-ordered, no duplicates.
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    /// Milliseconds since the epoch.
    Date(i64),
    Object {
        class: Option<String>,
        fields: BTreeMap<String, Value>,
    },
}

impl Value {
    pub fn object(class: Option<&str>, fields: impl IntoIterator<Item = (String, Value)>) -> Self {
        Value::Object {
            class: class.map(str::to_string),
            fields: fields.into_iter().collect(),
        }
    }

    pub fn set_of(items: impl IntoIterator<Item = Value>) -> Self {
        let mut set = Value::Set(Vec::new());
        for item in items {
            set.set_add(item);
        }
        set
    }

    /// Copy pushed into a one-way property. Collections and dates keep their
    /// kind; class instances come back as plain objects.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Array(items) => Value::Array(items.iter().map(Value::deep_copy).collect()),
            Value::Set(items) => Value::Set(items.iter().map(Value::deep_copy).collect()),
            Value::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.deep_copy(), v.deep_copy()))
                    .collect(),
            ),
            Value::Object { fields, .. } => Value::Object {
                class: None,
                fields: fields.iter().map(|(k, v)| (k.clone(), v.deep_copy())).collect(),
            },
            other => other.clone(),
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) | Value::Str(_)
        )
    }

    /// Adds to a set; returns false when the value is not a set or already present.
    pub fn set_add(&mut self, item: Value) -> bool {
        match self {
            Value::Set(items) if !items.contains(&item) => {
                items.push(item);
                true
            }
            _ => false,
        }
    }

    pub fn set_delete(&mut self, item: &Value) -> bool {
        match self {
            Value::Set(items) => {
                let before = items.len();
                items.retain(|existing| existing != item);
                items.len() != before
            }
            _ => false,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object { fields, .. } => fields.get(name),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        match self {
            Value::Object { fields, .. } => fields.get_mut(name),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Array(items) | Value::Set(items) => items.len(),
            Value::Map(entries) => entries.len(),
            Value::Str(s) => s.chars().count(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_copy_drops_class_identity() {
        let point = Value::object(Some("Point"), [("x".to_string(), Value::from(1))]);
        let copy = point.deep_copy();
        assert_eq!(copy, Value::object(None, [("x".to_string(), Value::from(1))]));
    }

    #[test]
    fn test_deep_copy_keeps_collection_kinds() {
        let value = Value::Array(vec![
            Value::set_of([Value::from(1), Value::from(1), Value::from(2)]),
            Value::Map(vec![(Value::from("k"), Value::Date(86_400_000))]),
        ]);
        let copy = value.deep_copy();
        assert_eq!(copy, value);
        match &copy {
            Value::Array(items) => assert_eq!(items[0].len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_set_add_delete() {
        let mut set = Value::set_of([Value::from(0)]);
        assert!(set.set_add(Value::from(1)));
        assert!(!set.set_add(Value::from(1)));
        assert!(set.set_delete(&Value::from(0)));
        assert_eq!(set, Value::Set(vec![Value::from(1)]));
        assert!(!Value::from(3).set_add(Value::from(1)));
    }
}
