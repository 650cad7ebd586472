//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Compression mode (default: "zip")
    pub compression: String,

    /// Artifacts processed at once (default: 1, sequential)
    pub max_parallel: usize,

    /// Job-details call timeout in seconds (default: 60)
    pub credential_seconds: u64,

    /// Per-artifact upload timeout in seconds (default: 900 = 15 minutes)
    pub upload_seconds: u64,

    /// Archive symlink targets instead of links (default: false)
    pub dereference_symlinks: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            compression: "zip".to_string(),
            max_parallel: 1,
            credential_seconds: 60,
            upload_seconds: 900,
            dereference_symlinks: false,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "compression": self.compression,
            "max_parallel": self.max_parallel,
            "dereference_symlinks": self.dereference_symlinks,
            "excludes": [],
            "timeouts": {
                "credential_seconds": self.credential_seconds,
                "upload_seconds": self.upload_seconds
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.compression, "zip");
        assert_eq!(defaults.max_parallel, 1);
        assert_eq!(defaults.credential_seconds, 60);
        assert_eq!(defaults.upload_seconds, 900);
        assert!(!defaults.dereference_symlinks);
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["compression"], "zip");
        assert_eq!(value["timeouts"]["upload_seconds"], 900);
        assert!(value.get("encryption").is_none());
        assert!(value["excludes"].as_array().unwrap().is_empty());
    }
}
