//! Layer merging
//!
//! Objects merge key by key, arrays and scalars are replaced by the later
//! layer. `null` in a later layer clears the value.

use serde_json::Value;

/// Merge `overlay` onto `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        // Arrays never concatenate, so `excludes` in a later layer is the full list.
        (_, overlay) => overlay,
    }
}

/// Merge layers in precedence order (last wins)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_override() {
        let result = deep_merge(json!({"compression": "zip"}), json!({"compression": "tgz"}));
        assert_eq!(result["compression"], "tgz");
    }

    #[test]
    fn test_nested_tables_merge() {
        let base = json!({"timeouts": {"credential_seconds": 60, "upload_seconds": 900}});
        let overlay = json!({"timeouts": {"upload_seconds": 120}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["timeouts"]["credential_seconds"], 60);
        assert_eq!(result["timeouts"]["upload_seconds"], 120);
    }

    #[test]
    fn test_excludes_replaced() {
        let base = json!({"excludes": ["*.log", "tmp/**"]});
        let overlay = json!({"excludes": ["*.bak"]});
        let result = deep_merge(base, overlay);

        assert_eq!(result["excludes"], json!(["*.bak"]));
    }

    #[test]
    fn test_null_clears_value() {
        let result = deep_merge(json!({"region": "eu-west-1"}), json!({"region": null}));
        assert!(result["region"].is_null());
    }

    #[test]
    fn test_four_layers() {
        let builtin = json!({"compression": "zip", "max_parallel": 1});
        let host = json!({"max_parallel": 4, "region": "us-east-1"});
        let workspace = json!({"compression": "tar"});
        let cli = json!({"compression": "tgz"});

        let result = merge_layers(vec![builtin, host, workspace, cli]);

        assert_eq!(result["compression"], "tgz");
        assert_eq!(result["max_parallel"], 4);
        assert_eq!(result["region"], "us-east-1");
    }
}
