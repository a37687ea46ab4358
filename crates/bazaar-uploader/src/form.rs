//! Form value graph.
//!
//! A flat JSON object keyed by field name. The uploader only touches the field
//! named by its [`UploadTarget`](bazaar_core::UploadTarget); every other field
//! belongs to the rest of the form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues {
    values: Map<String, Value>,
}

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Form seeded from a loaded record. Non-object records yield an empty form.
    pub fn from_record(record: &Value) -> Self {
        match record {
            Value::Object(map) => Self {
                values: map.clone(),
            },
            _ => Self::default(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    /// Scalar URL field; empty strings and non-strings read as unset.
    pub fn scalar_url(&self, field: &str) -> Option<String> {
        scalar_url_of(self.values.get(field))
    }

    pub fn set_scalar_url(&mut self, field: &str, url: Option<String>) {
        let value = url.map(Value::String).unwrap_or(Value::Null);
        self.values.insert(field.to_string(), value);
    }

    /// List URL field; missing or non-array values read as empty.
    pub fn list_urls(&self, field: &str) -> Vec<String> {
        list_urls_of(self.values.get(field))
    }

    pub fn set_list_urls(&mut self, field: &str, urls: Vec<String>) {
        let value = Value::Array(urls.into_iter().map(Value::String).collect());
        self.values.insert(field.to_string(), value);
    }

    /// Read-modify-write of a list field against its value at call time.
    pub fn update_list<F>(&mut self, field: &str, update: F)
    where
        F: FnOnce(&mut Vec<String>),
    {
        let mut urls = self.list_urls(field);
        update(&mut urls);
        self.set_list_urls(field, urls);
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

pub(crate) fn scalar_url_of(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn list_urls_of(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
