use serde_json::{Map, Value};

use crate::raw::id_string;

pub(crate) type Change = (String, Value, Value);

// Objects recurse; anything else in `source`, null and arrays included,
// replaces the target value.
pub(crate) fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(t), Value::Object(s)) => {
            for (k, v) in s {
                match t.get_mut(k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        t.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (t, s) => {
            *t = s.clone();
        }
    }
}

pub(crate) fn find_by_id_mut<'a>(collection: &'a mut Value, id: &str) -> Option<&'a mut Value> {
    collection
        .as_array_mut()?
        .iter_mut()
        .find(|item| item.get("id").and_then(id_string).as_deref() == Some(id))
}

pub(crate) fn strip_keys(obj: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        obj.remove(*key);
    }
}

fn keyed(items: &[Value]) -> Option<Vec<(String, &Value)>> {
    items
        .iter()
        .map(|item| item.get("id").and_then(id_string).map(|id| (id, item)))
        .collect()
}

fn child_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Arrays whose entries all carry an `id` are diffed per id (`zones[1].rh`);
/// other arrays are compared whole.
pub(crate) fn diff_json(previous: &Value, current: &Value, path_prefix: &str, changes: &mut Vec<Change>) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = child_path(path_prefix, key);
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None => {
                        if curr_val.is_object() {
                            diff_json(&Value::Object(Map::new()), curr_val, &path, changes);
                        } else {
                            changes.push((path, Value::Null, curr_val.clone()));
                        }
                    }
                }
            }
        }
        (Value::Array(prev_items), Value::Array(curr_items)) if prev_items != curr_items => {
            match (keyed(prev_items), keyed(curr_items)) {
                (Some(prev_keyed), Some(curr_keyed)) => {
                    for (id, curr_item) in curr_keyed {
                        let path = format!("{path_prefix}[{id}]");
                        match prev_keyed.iter().find(|(prev_id, _)| *prev_id == id) {
                            Some((_, prev_item)) => diff_json(prev_item, curr_item, &path, changes),
                            None => changes.push((path, Value::Null, curr_item.clone())),
                        }
                    }
                }
                _ => changes.push((path_prefix.to_string(), previous.clone(), current.clone())),
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}
