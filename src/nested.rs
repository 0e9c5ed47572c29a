use std::sync::Arc;

use crate::value::{Value, ValueMap};

/// Stamps `leaf` on every leaf of `tree`, keeping its map/list shape.
///
/// Used on submit to mark the whole form touched: `{friends: [{name: ""}]}`
/// becomes `{friends: [{name: true}]}`.
pub fn set_nested_values(tree: &Value, leaf: &Value) -> Value {
    match tree {
        Value::Map(entries) => Value::Map(Arc::new(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), stamp(value, leaf)))
                .collect(),
        )),
        Value::List(items) => Value::List(Arc::new(
            items.iter().map(|value| stamp(value, leaf)).collect(),
        )),
        _ => Value::map(),
    }
}

fn stamp(value: &Value, leaf: &Value) -> Value {
    if value.is_container() {
        set_nested_values(value, leaf)
    } else {
        leaf.clone()
    }
}

/// Replaces every empty-string leaf with "absent" before schema validation.
///
/// Map entries holding `""` are dropped; list slots become `Null` so that
/// positions are preserved.
pub fn prepare_for_validation(values: &Value) -> Value {
    normalize(values).unwrap_or(Value::Null)
}

fn normalize(value: &Value) -> Option<Value> {
    match value {
        Value::String(text) if text.is_empty() => None,
        Value::Map(entries) => Some(Value::Map(Arc::new(
            entries
                .iter()
                .filter_map(|(key, value)| normalize(value).map(|value| (key.clone(), value)))
                .collect(),
        ))),
        Value::List(items) => Some(Value::List(Arc::new(
            items
                .iter()
                .map(|value| normalize(value).unwrap_or(Value::Null))
                .collect(),
        ))),
        other => Some(other.clone()),
    }
}

/// Merges `source` over `target`.
///
/// Maps merge key by key, lists merge index by index, and anywhere else the
/// source wins. A `Null` slot in a list counts as a hole on either side: a
/// target hole takes the source element, a source hole keeps the target's.
pub fn deep_merge(target: &Value, source: &Value) -> Value {
    match (target, source) {
        (Value::Map(target), Value::Map(source)) => {
            let mut merged: ValueMap = (**target).clone();
            for (key, value) in source.iter() {
                let next = match merged.get(key) {
                    Some(existing) if value.is_container() => deep_merge(existing, value),
                    _ => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Map(Arc::new(merged))
        }
        (Value::List(target), Value::List(source)) => {
            let mut merged = (**target).clone();
            for (index, value) in source.iter().enumerate() {
                if index >= merged.len() {
                    merged.resize(index, Value::Null);
                    merged.push(value.clone());
                    continue;
                }
                if value.is_null() {
                    continue;
                }
                merged[index] = if merged[index].is_null() || !value.is_container() {
                    value.clone()
                } else {
                    deep_merge(&merged[index], value)
                };
            }
            Value::List(Arc::new(merged))
        }
        (_, source) => source.clone(),
    }
}

/// Folds [`deep_merge`] over `sources`, later sources taking precedence.
pub fn merge_all<'a>(sources: impl IntoIterator<Item = &'a Value>) -> Value {
    sources
        .into_iter()
        .fold(Value::map(), |merged, source| deep_merge(&merged, source))
}
