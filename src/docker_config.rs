//! Normalization of a service's `other_docker_config` JSON.
//!
//! Users write this document by hand, in any key casing and with env vars
//! in any order, while the control plane echoes it back in upper camel case
//! with defaults filled in and empty fields dropped. Reducing both sides to
//! the same canonical form lets the plan ignore differences that do not
//! change the deployed container.

use serde_json::{Map, Value};
use tracing::{debug, trace};

const PROBES: [&str; 2] = ["LivenessProbe", "ReadinessProbe"];
const KEY_REFS: [&str; 2] = ["SecretKeyRef", "ConfigMapKeyRef"];

/// Rename lower-camel keys to upper camel.
///
/// An existing upper-camel key is never overwritten; the lower-camel key is
/// dropped either way.
pub fn make_map_upper_camel_case(m: &mut Map<String, Value>) {
    let lower: Vec<String> = m
        .keys()
        .filter(|k| k.chars().next().is_some_and(char::is_lowercase))
        .cloned()
        .collect();

    for key in lower {
        if let Some(value) = m.remove(&key) {
            let upper = upper_first(&key);
            if !m.contains_key(&upper) {
                m.insert(upper, value);
            }
        }
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Drop entries that are null, empty objects or empty arrays.
pub fn reduce_nil_or_empty_map_entries(m: &mut Map<String, Value>) {
    m.retain(|_, v| match v {
        Value::Null => false,
        Value::Object(o) => !o.is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => true,
    });
}

fn env_name(entry: &Value) -> &str {
    entry
        .as_object()
        .and_then(|o| o.get("Name"))
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Sort the `Env` entries by name, upper-casing each entry's keys.
///
/// The sort is stable; entries without a name sort as `""`.
pub fn reorder_env(defn: &mut Map<String, Value>) {
    if let Some(Value::Array(env)) = defn.get_mut("Env") {
        for entry in env.iter_mut() {
            if let Value::Object(m) = entry {
                make_map_upper_camel_case(m);
            }
        }
        env.sort_by(|a, b| env_name(a).cmp(env_name(b)));
    }
}

/// Keep only the last of several env entries sharing a name.
///
/// Expects `Env` to be sorted already. Nameless entries are all kept.
fn dedupe_env(defn: &mut Map<String, Value>) {
    if let Some(Value::Array(env)) = defn.get_mut("Env") {
        let mut deduped: Vec<Value> = Vec::with_capacity(env.len());
        for entry in env.drain(..) {
            let name = env_name(&entry);
            let duplicate = !name.is_empty()
                && deduped.last().is_some_and(|prev| env_name(prev) == name);
            if duplicate {
                trace!(name, "dropping shadowed env entry");
                deduped.pop();
            }
            deduped.push(entry);
        }
        *env = deduped;
    }
}

fn reduce_nested(parent: &mut Map<String, Value>, key: &str) {
    if let Some(Value::Object(child)) = parent.get_mut(key) {
        reduce_nil_or_empty_map_entries(child);
        make_map_upper_camel_case(child);
    }
}

/// Reduce a parsed `other_docker_config` to its canonical content.
pub fn reduce_other_docker_config(defn: &mut Map<String, Value>) {
    make_map_upper_camel_case(defn);
    reorder_env(defn);
    dedupe_env(defn);

    if matches!(defn.get("HostNetwork"), None | Some(Value::Null)) {
        defn.insert("HostNetwork".to_string(), Value::Bool(false));
    }

    for key in PROBES {
        if let Some(Value::Object(probe)) = defn.get_mut(key) {
            make_map_upper_camel_case(probe);
            reduce_nested(probe, "HttpGet");
            reduce_nil_or_empty_map_entries(probe);
        }
    }

    if let Some(Value::Array(env)) = defn.get_mut("Env") {
        for entry in env.iter_mut() {
            let Value::Object(entry) = entry else {
                continue;
            };
            reduce_nil_or_empty_map_entries(entry);
            if let Some(Value::Object(value_from)) = entry.get_mut("ValueFrom") {
                make_map_upper_camel_case(value_from);
                for key in KEY_REFS {
                    reduce_nested(value_from, key);
                }
                reduce_nil_or_empty_map_entries(value_from);
            }
        }
    }

    reduce_nil_or_empty_map_entries(defn);
}

/// Spell integral floats as integers, so `8080.0` and `8080` agree.
fn normalize_numbers(value: &mut Value) {
    match value {
        Value::Number(n) if !n.is_i64() && !n.is_u64() => {
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    *value = Value::from(f as i64);
                }
            }
        },
        Value::Array(items) => items.iter_mut().for_each(normalize_numbers),
        Value::Object(m) => m.values_mut().for_each(normalize_numbers),
        _ => {},
    }
}

fn to_canonical(defn: Map<String, Value>) -> String {
    let mut value = Value::Object(defn);
    normalize_numbers(&mut value);
    // serde_json maps are ordered by key, so this is already sorted.
    let canonical = value.to_string();
    if canonical == "{}" {
        String::new()
    } else {
        canonical
    }
}

/// Parse, reduce and serialize `encoded` with sorted keys.
///
/// Blank input is treated as `{}`. A JSON value that is not an object is
/// returned unchanged.
pub fn canonicalize_other_docker_config(encoded: &str) -> Result<String, serde_json::Error> {
    let source = if encoded.trim().is_empty() { "{}" } else { encoded };
    match serde_json::from_str::<Value>(source)? {
        Value::Object(mut defn) => {
            reduce_other_docker_config(&mut defn);
            Ok(to_canonical(defn))
        },
        _ => Ok(encoded.to_string()),
    }
}

/// True when two `other_docker_config` documents reduce to the same thing.
///
/// Unparsable input is never equivalent to anything.
pub fn other_docker_configs_equivalent(old: &str, new: &str) -> bool {
    let (Ok(old_canonical), Ok(new_canonical)) = (
        canonicalize_other_docker_config(old),
        canonicalize_other_docker_config(new),
    ) else {
        return false;
    };

    let equal = old_canonical == new_canonical;
    if !equal {
        debug!(first = %old_canonical, second = %new_canonical, "canonical docker configs differ");
    }
    equal
}

/// The form stored in state: env sorted and keys ordered, nothing reduced.
///
/// Input that does not parse as a JSON object is stored as given.
pub fn normalize_other_docker_config(encoded: &str) -> String {
    match serde_json::from_str::<Value>(encoded) {
        Ok(Value::Object(mut defn)) => {
            reorder_env(&mut defn);
            to_canonical(defn)
        },
        _ => encoded.to_string(),
    }
}
