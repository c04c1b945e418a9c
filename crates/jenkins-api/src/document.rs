//! Decoded JSON snapshots of remote resources

use serde_json::{
    Map,
    Value,
};

use crate::error::{
    JenkinsError,
    JenkinsResult,
};

/// An untyped JSON object returned by the server
///
/// Lookups never fail: absent fields and fields of an unexpected type both
/// answer `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteDocument(Map<String, Value>);

impl RemoteDocument {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Returns `None` unless `value` is a JSON object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub(crate) fn decode(bytes: &[u8], resource: &str, url: &str) -> JenkinsResult<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| JenkinsError::decode(resource, url, e))?;

        Self::from_value(value)
            .ok_or_else(|| JenkinsError::decode(resource, url, "response is not a JSON object"))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    pub fn u64(&self, field: &str) -> Option<u64> {
        self.get(field).and_then(Value::as_u64)
    }

    pub fn f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    pub fn bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn object(&self, field: &str) -> Option<&Map<String, Value>> {
        self.get(field).and_then(Value::as_object)
    }

    pub fn array(&self, field: &str) -> Option<&Vec<Value>> {
        self.get(field).and_then(Value::as_array)
    }

    /// Milliseconds converted to whole seconds, truncating
    pub fn millis_as_secs(&self, field: &str) -> Option<i64> {
        millis_to_secs(self.get(field)?)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    pub fn to_json_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

pub(crate) fn millis_to_secs(value: &Value) -> Option<i64> {
    if let Some(ms) = value.as_i64() {
        return Some(ms / 1000);
    }
    value.as_f64().map(|ms| (ms / 1000.0).trunc() as i64)
}

/// Reads `object[field]` as a string, for nested documents such as
/// `currentExecutable` or `task`
pub(crate) fn nested_str<'a>(value: Option<&'a Value>, field: &str) -> Option<&'a str> {
    value?.get(field)?.as_str()
}
