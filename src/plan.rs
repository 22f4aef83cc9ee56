//! Turning a proposed state into a plan.

use serde_json::Value;

use crate::resources::ResourceHandler;
use crate::schema::Block;
use crate::state::ResourceData;
use crate::types::{AttributeChange, PlanResult};
use crate::ProviderError;

/// Plan a resource change.
///
/// A null `proposed` with prior state plans a delete. Otherwise defaults and
/// the handler's normalization are applied, computed values the user left
/// unset carry over from prior state, and each remaining difference becomes
/// a change. A changed force-new attribute requires replacement.
pub fn plan_resource(
    handler: &dyn ResourceHandler,
    prior: Option<Value>,
    proposed: Value,
) -> Result<PlanResult, ProviderError> {
    let prior = prior.filter(|p| !p.is_null()).map(ResourceData::from_value);

    if proposed.is_null() {
        return Ok(match prior {
            Some(prior) => plan_delete(prior),
            None => PlanResult::no_change(Value::Null),
        });
    }
    if !proposed.is_object() {
        return Err(ProviderError::Validation(format!(
            "proposed state for {} must be an object",
            handler.type_name()
        )));
    }

    let schema = handler.schema();
    let mut planned = ResourceData::from_value(proposed);
    planned.apply_defaults(&schema.block);
    handler.normalize(&mut planned)?;

    let mut keys: Vec<(&String, bool, bool)> = schema
        .block
        .attributes
        .iter()
        .map(|(name, attr)| (name, attr.flags.computed, attr.force_new))
        .collect();
    // Nested blocks are filled in by the provider when left unset.
    keys.extend(schema.block.blocks.keys().map(|name| (name, true, false)));
    keys.sort_by(|a, b| a.0.cmp(b.0));

    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (key, computed, force_new) in keys {
        let new = planned.get(key).cloned().unwrap_or(Value::Null);
        let Some(prior) = &prior else {
            if !new.is_null() {
                changes.push(AttributeChange::added(key.as_str(), new));
            }
            continue;
        };

        let old = prior.get(key).cloned().unwrap_or(Value::Null);
        if computed && new.is_null() {
            planned.set(key, &old)?;
            continue;
        }
        let new = match schema.block.blocks.get(key.as_str()) {
            Some(nested) => {
                let merged = carry_nested_computed(new, &old, &nested.block);
                planned.set(key, &merged)?;
                merged
            },
            None => new,
        };
        if old == new {
            continue;
        }
        if handler.suppress_diff(key, &old, &new, &planned) {
            planned.set(key, &old)?;
            continue;
        }
        if force_new {
            requires_replace = true;
        }
        changes.push(AttributeChange::modified(key.as_str(), old, new));
    }

    if let Some(prior) = &prior {
        if !prior.id().is_empty() {
            planned.set_id(prior.id());
        }
    }

    Ok(PlanResult::with_changes(
        planned.into_value(),
        changes,
        requires_replace,
    ))
}

/// Fill computed attributes left unset in each nested item from the prior
/// item at the same position.
fn carry_nested_computed(new: Value, old: &Value, block: &Block) -> Value {
    match (new, old) {
        (Value::Array(items), Value::Array(old_items)) if items.len() == old_items.len() => Value::Array(
            items
                .into_iter()
                .zip(old_items)
                .map(|(item, old_item)| carry_nested_computed(item, old_item, block))
                .collect(),
        ),
        (Value::Object(mut item), Value::Object(old_item)) => {
            for (name, attr) in &block.attributes {
                let unset = matches!(item.get(name), None | Some(Value::Null));
                if attr.flags.computed && unset {
                    if let Some(old_value) = old_item.get(name) {
                        item.insert(name.clone(), old_value.clone());
                    }
                }
            }
            Value::Object(item)
        },
        (new, _) => new,
    }
}

fn plan_delete(prior: ResourceData) -> PlanResult {
    let Value::Object(values) = prior.into_value() else {
        return PlanResult::no_change(Value::Null);
    };
    let mut keys: Vec<_> = values.into_iter().collect();
    keys.sort_by(|a, b| a.0.cmp(&b.0));
    let changes = keys
        .into_iter()
        .map(|(key, value)| AttributeChange::removed(key, value))
        .collect();
    PlanResult::with_changes(Value::Null, changes, false)
}
