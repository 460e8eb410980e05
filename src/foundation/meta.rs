use std::collections::BTreeMap;

use crate::foundation::error::{EditError, EditResult};

/// Typed metadata value.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MetaValue {
    /// UTF-8 string.
    String(String),
    /// Unsigned integer.
    Uint(u64),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Double(f64),
    /// Boolean flag.
    Bool(bool),
}

impl MetaValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Uint(_) => "uint",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::Bool(_) => "bool",
        }
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<u64> for MetaValue {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<u32> for MetaValue {
    fn from(v: u32) -> Self {
        Self::Uint(u64::from(v))
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// String-keyed typed metadata attached to projects, timelines and layers.
///
/// Once a key holds a value of some type, later writes must keep that type.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MetaContainer {
    values: BTreeMap<String, MetaValue>,
}

impl MetaContainer {
    /// Empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, rejecting type changes of an existing entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> EditResult<()> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(EditError::validation("meta key must be non-empty"));
        }
        let value = value.into();
        if let Some(old) = self.values.get(&key)
            && std::mem::discriminant(old) != std::mem::discriminant(&value)
        {
            return Err(EditError::consistency(format!(
                "meta '{key}' holds a {} value, cannot store a {}",
                old.type_name(),
                value.type_name()
            )));
        }
        self.values.insert(key, value);
        Ok(())
    }

    /// Raw access.
    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.values.get(key)
    }

    /// String value of `key`, if present with that type.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(MetaValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Unsigned value of `key`, if present with that type.
    pub fn get_uint(&self, key: &str) -> Option<u64> {
        match self.values.get(key) {
            Some(MetaValue::Uint(v)) => Some(*v),
            _ => None,
        }
    }

    /// Signed value of `key`, if present with that type.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(MetaValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Double value of `key`, if present with that type.
    pub fn get_double(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(MetaValue::Double(v)) => Some(*v),
            _ => None,
        }
    }

    /// Boolean value of `key`, if present with that type.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(MetaValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    /// Remove `key`, returning the previous value.
    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        self.values.remove(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/meta.rs"]
mod tests;
