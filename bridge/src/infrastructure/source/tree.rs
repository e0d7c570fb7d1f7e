//! Applies Firebase streaming `put`/`patch` events to a cached snapshot.
//!
//! Event paths are relative to the subscribed location (`/` is the location
//! itself). Writing `null` deletes, and objects left empty by a delete vanish
//! the same way they do server-side.

use serde_json::{Map, Value};

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Replaces the value at `path` below `root` with `value`.
pub fn put(root: &mut Value, path: &str, value: Value) {
    let segs = segments(path);
    if value.is_null() {
        remove_at(root, &segs);
    } else {
        set_at(root, &segs, value);
    }
}

/// Writes every child of `children` below `path`, leaving siblings alone.
pub fn patch(root: &mut Value, path: &str, children: Value) {
    let Value::Object(children) = children else {
        put(root, path, children);
        return;
    };
    let base = path.trim_end_matches('/');
    for (key, value) in children {
        put(root, &format!("{base}/{key}"), value);
    }
}

fn set_at(node: &mut Value, segs: &[&str], value: Value) {
    let Some((first, rest)) = segs.split_first() else {
        *node = value;
        return;
    };
    if let Value::Array(items) = node {
        if let Ok(idx) = first.parse::<usize>() {
            if idx < items.len() {
                set_at(&mut items[idx], rest, value);
                return;
            }
            if idx == items.len() {
                let mut child = Value::Null;
                set_at(&mut child, rest, value);
                items.push(child);
                return;
            }
        }
        let items = std::mem::take(items);
        *node = array_to_object(items);
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(first.to_string()).or_insert(Value::Null);
        set_at(child, rest, value);
    }
}

fn remove_at(node: &mut Value, segs: &[&str]) {
    let Some((first, rest)) = segs.split_first() else {
        *node = Value::Null;
        return;
    };
    match node {
        Value::Object(map) => {
            if rest.is_empty() {
                map.remove(*first);
            } else if let Some(child) = map.get_mut(*first) {
                remove_at(child, rest);
                if is_empty(child) {
                    map.remove(*first);
                }
            }
            if map.is_empty() {
                *node = Value::Null;
            }
        }
        Value::Array(items) => {
            let Ok(idx) = first.parse::<usize>() else {
                return;
            };
            if idx >= items.len() {
                return;
            }
            if rest.is_empty() {
                items[idx] = Value::Null;
            } else {
                remove_at(&mut items[idx], rest);
            }
            while items.last().is_some_and(is_empty) {
                items.pop();
            }
            if items.is_empty() {
                *node = Value::Null;
            }
        }
        _ => {}
    }
}

fn array_to_object(items: Vec<Value>) -> Value {
    Value::Object(
        items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_put_replaces_snapshot() {
        let mut root = json!({"old": true});
        put(&mut root, "/", json!({"title": "foo"}));
        assert_eq!(root, json!({"title": "foo"}));
    }

    #[test]
    fn nested_put_creates_intermediate_objects() {
        let mut root = Value::Null;
        put(&mut root, "/a/b", json!(1));
        assert_eq!(root, json!({"a": {"b": 1}}));
        put(&mut root, "/a/c", json!(2));
        assert_eq!(root, json!({"a": {"b": 1, "c": 2}}));
    }

    #[test]
    fn null_put_deletes_and_prunes_empty_parents() {
        let mut root = json!({"a": {"b": 1}, "keep": 0});
        put(&mut root, "/a/b", Value::Null);
        assert_eq!(root, json!({"keep": 0}));
        put(&mut root, "/keep", Value::Null);
        assert_eq!(root, Value::Null);
    }

    #[test]
    fn patch_merges_children_only() {
        let mut root = json!({"title": "foo", "score": 1, "by": "pg"});
        patch(&mut root, "/", json!({"score": 5, "by": null}));
        assert_eq!(root, json!({"title": "foo", "score": 5}));
    }

    #[test]
    fn patch_keys_may_be_paths() {
        let mut root = json!({"a": {"x": 1}});
        patch(&mut root, "/a", json!({"y/z": 2}));
        assert_eq!(root, json!({"a": {"x": 1, "y": {"z": 2}}}));
    }

    #[test]
    fn array_slots_update_in_place() {
        let mut root = json!([1, 2, 3]);
        put(&mut root, "/1", json!(20));
        put(&mut root, "/3", json!(4));
        assert_eq!(root, json!([1, 20, 3, 4]));
        put(&mut root, "/3", Value::Null);
        assert_eq!(root, json!([1, 20, 3]));
    }

    #[test]
    fn sparse_array_write_becomes_object() {
        let mut root = json!(["a"]);
        put(&mut root, "/5", json!("f"));
        assert_eq!(root, json!({"0": "a", "5": "f"}));
    }
}
