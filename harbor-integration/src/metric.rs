use serde::{Deserialize, Serialize};

/// Generic representation of a real-time metric.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct Metric {
    pub name: &'static str,
    pub time: u64,
    pub tags: Vec<Tag>,
    pub fields: Vec<Field>,
}

/// Metric [`Tag`] key-value pair.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct Tag {
    pub key: &'static str,
    pub value: String,
}

impl Tag {
    pub fn new<Value>(key: &'static str, value: Value) -> Self
    where
        Value: std::fmt::Display,
    {
        Self {
            key,
            value: value.to_string(),
        }
    }
}

/// Metric [`Field`] key-value pair.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct Field {
    pub key: &'static str,
    pub value: u64,
}

impl Field {
    pub fn new(key: &'static str, value: u64) -> Self {
        Self { key, value }
    }
}
