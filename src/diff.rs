use serde_json::Value;

/// One leaf-level difference between two JSON documents. `Null` on either
/// side means the leaf was absent there.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct JsonChange {
    pub path: String,
    pub old: Value,
    pub new: Value,
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Records every leaf of `current` that differs from `previous`, then every
/// key of `previous` that `current` no longer has. Arrays compare whole.
pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<JsonChange>,
) {
    let (Value::Object(prev_map), Value::Object(curr_map)) = (previous, current) else {
        if previous != current {
            changes.push(JsonChange {
                path: path_prefix.to_string(),
                old: previous.clone(),
                new: current.clone(),
            });
        }
        return;
    };

    for (key, curr_val) in curr_map {
        let path = join(path_prefix, key);
        let prev_val = prev_map.get(key).unwrap_or(&Value::Null);
        if prev_val.is_null() && curr_val.is_object() {
            diff_json(&Value::Object(Default::default()), curr_val, &path, changes);
        } else {
            diff_json(prev_val, curr_val, &path, changes);
        }
    }

    for (key, prev_val) in prev_map {
        if !curr_map.contains_key(key) {
            changes.push(JsonChange {
                path: join(path_prefix, key),
                old: prev_val.clone(),
                new: Value::Null,
            });
        }
    }
}
