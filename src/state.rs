//! Typed access to a resource's state object.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::{Block, BlockNestingMode};
use crate::ProviderError;

/// A resource or data source state object keyed by attribute name.
///
/// Getters follow the host's zero-value rules: an absent or null string
/// reads as `""`, numbers as `0` and bools as `false`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    values: Map<String, Value>,
}

impl ResourceData {
    /// An empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a state value. Anything other than an object yields an empty state.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }

    /// Unwrap into a state value.
    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }

    /// The raw value of an attribute, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// A string attribute, `""` when unset.
    pub fn get_str(&self, key: &str) -> &str {
        self.values.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// An integer attribute, `0` when unset.
    pub fn get_i64(&self, key: &str) -> i64 {
        self.values.get(key).and_then(Value::as_i64).unwrap_or(0)
    }

    /// A bool attribute, `false` when unset.
    pub fn get_bool(&self, key: &str) -> bool {
        self.values.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// The items of a list attribute or list block, empty when unset.
    pub fn get_list(&self, key: &str) -> &[Value] {
        self.values
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The value of an attribute when it is set to something other than
    /// its zero value.
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !is_zero(v))
    }

    /// A string attribute that must be set and non-empty.
    pub fn required_str(&self, key: &str) -> Result<&str, ProviderError> {
        match self.get_str(key) {
            "" => Err(ProviderError::Validation(format!("{} is required", key))),
            s => Ok(s),
        }
    }

    /// Set an attribute from anything serializable.
    pub fn set(&mut self, key: &str, value: impl Serialize) -> Result<(), ProviderError> {
        self.values.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// The resource identifier, `""` when unset.
    pub fn id(&self) -> &str {
        self.get_str("id")
    }

    /// Set the resource identifier.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.values.insert("id".to_string(), Value::String(id.into()));
    }

    /// True when `key` differs between `prior` and this state.
    pub fn has_change(&self, prior: &ResourceData, key: &str) -> bool {
        let null = Value::Null;
        self.values.get(key).unwrap_or(&null) != prior.values.get(key).unwrap_or(&null)
    }

    /// Fill attribute defaults for anything absent or null, including
    /// inside nested list blocks.
    pub fn apply_defaults(&mut self, block: &Block) {
        apply_block_defaults(&mut self.values, block);
    }
}

fn apply_block_defaults(values: &mut Map<String, Value>, block: &Block) {
    for (name, attr) in &block.attributes {
        if let Some(default) = &attr.default {
            if matches!(values.get(name), None | Some(Value::Null)) {
                values.insert(name.clone(), default.clone());
            }
        }
    }
    for (name, nested) in &block.blocks {
        match (nested.nesting_mode, values.get_mut(name)) {
            (BlockNestingMode::List, Some(Value::Array(items))) => {
                for item in items.iter_mut() {
                    if let Value::Object(m) = item {
                        apply_block_defaults(m, &nested.block);
                    }
                }
            },
            (BlockNestingMode::Single, Some(Value::Object(m))) => {
                apply_block_defaults(m, &nested.block);
            },
            _ => {},
        }
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

impl From<Value> for ResourceData {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl From<ResourceData> for Value {
    fn from(data: ResourceData) -> Self {
        data.into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, NestedBlock};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_zero_value_getters() {
        let d = ResourceData::from_value(json!({"name": "web", "port": 80, "enabled": true, "vpc_id": null}));
        assert_eq!(d.get_str("name"), "web");
        assert_eq!(d.get_i64("port"), 80);
        assert!(d.get_bool("enabled"));
        assert_eq!(d.get_str("vpc_id"), "");
        assert_eq!(d.get_i64("missing"), 0);
        assert!(!d.get_bool("missing"));
        assert!(d.get_list("health_check").is_empty());
    }

    #[test]
    fn test_get_ok_skips_zero_values() {
        let d = ResourceData::from_value(json!({
            "port": 0,
            "protocol": "",
            "vpc_id": "vpc-1",
            "health_check": [],
            "enabled": false
        }));
        assert!(d.get_ok("port").is_none());
        assert!(d.get_ok("protocol").is_none());
        assert!(d.get_ok("health_check").is_none());
        assert!(d.get_ok("enabled").is_none());
        assert!(d.get_ok("missing").is_none());
        assert_eq!(d.get_ok("vpc_id"), Some(&json!("vpc-1")));
    }

    #[test]
    fn test_required_str() {
        let d = ResourceData::from_value(json!({"tenant_id": "t1", "name": ""}));
        assert_eq!(assert_ok!(d.required_str("tenant_id")), "t1");
        let err = assert_err!(d.required_str("name"));
        assert_eq!(err.message(), "name is required");
    }

    #[test]
    fn test_set_and_id() {
        let mut d = ResourceData::new();
        assert_ok!(d.set("tags", vec![json!({"key": "k", "value": "v"})]));
        d.set_id("t1/web");
        assert_eq!(d.id(), "t1/web");
        assert_eq!(
            d.into_value(),
            json!({"id": "t1/web", "tags": [{"key": "k", "value": "v"}]})
        );
    }

    #[test]
    fn test_non_object_state_is_empty() {
        let d = ResourceData::from_value(Value::Null);
        assert_eq!(d, ResourceData::new());
        assert_eq!(d.id(), "");
    }

    #[test]
    fn test_has_change() {
        let prior = ResourceData::from_value(json!({"replicas": 1, "name": "web"}));
        let next = ResourceData::from_value(json!({"replicas": 2, "name": "web", "volumes": null}));
        assert!(next.has_change(&prior, "replicas"));
        assert!(!next.has_change(&prior, "name"));
        assert!(!next.has_change(&prior, "volumes"));
    }

    #[test]
    fn test_apply_defaults_recurses_into_blocks() {
        let block = Block::new()
            .with_attribute("protocol", Attribute::optional_string().with_default(json!("HTTP")))
            .with_attribute("replicas", Attribute::optional_int64().with_default(json!(1)))
            .with_block(
                "health_check",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("enabled", Attribute::optional_bool().with_default(json!(true)))
                        .with_attribute("interval", Attribute::optional_int64().with_default(json!(30))),
                ),
            );

        let mut d = ResourceData::from_value(json!({
            "protocol": null,
            "replicas": 3,
            "health_check": [{"interval": 10}]
        }));
        d.apply_defaults(&block);

        assert_eq!(
            d.into_value(),
            json!({
                "protocol": "HTTP",
                "replicas": 3,
                "health_check": [{"enabled": true, "interval": 10}]
            })
        );
    }
}
