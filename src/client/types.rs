//! Wire types shared across API areas.

use serde::{Deserialize, Serialize};

/// A string wrapped in an object, as the control plane sends AWS enums.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploStringValue {
    pub value: String,
}

impl DuploStringValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// A key/value pair, used for tags and metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploKeyStringValue {
    pub key: String,
    pub value: String,
}

impl DuploKeyStringValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Flatten key/value pairs into `[{key, value}]` state entries.
pub fn key_values_to_state(items: Option<&[DuploKeyStringValue]>) -> serde_json::Value {
    serde_json::Value::Array(
        items
            .unwrap_or_default()
            .iter()
            .map(|kv| serde_json::json!({ "key": kv.key, "value": kv.value }))
            .collect(),
    )
}
