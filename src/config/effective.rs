//! Effective configuration with provenance
//!
//! The effective config is the merged configuration plus where each layer
//! came from. Secrets are redacted in the serialized form; the unredacted
//! merge is kept in memory only, for typed extraction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;

/// Schema version for effective_config
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "artifact-publisher/effective_config@1";

/// Placeholder written over secret values
pub const REDACTED: &str = "[REDACTED]";

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Host,
    Workspace,
    Cli,
}

/// A contributing config source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Merged configuration with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_version: u32,
    pub schema_id: String,
    pub created_at: DateTime<Utc>,

    /// Publish call this config was used for (set later)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_id: Option<String>,

    /// Merged configuration, secrets redacted
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,

    /// Redacted key paths
    pub redactions: Vec<String>,

    #[serde(skip)]
    unredacted: Value,
}

/// Key fragments that mark a value as secret
const SECRET_KEYS: &[&str] = &[
    "password",
    "token",
    "secret",
    "private_key",
    "api_key",
    "credential",
];

/// Full key paths that are always secret
const SECRET_PATHS: &[&str] = &["encryption.key"];

impl EffectiveConfig {
    /// Build effective config from layers: builtin, host file, workspace file, CLI.
    pub fn build(
        host_config_path: Option<&Path>,
        workspace_config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        for (origin, path) in [
            (ConfigOrigin::Host, host_config_path),
            (ConfigOrigin::Workspace, workspace_config_path),
        ] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let (value, digest) = Self::load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let unredacted = merge_layers(layers);
        if !unredacted.is_object() {
            return Err(ConfigError::ValidationError(
                "configuration must be a table".to_string(),
            ));
        }

        let mut config = unredacted.clone();
        let redactions = Self::redact_secrets(&mut config);

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            publish_id: None,
            config,
            sources,
            redactions,
            unredacted,
        })
    }

    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let digest = hex::encode(Sha256::digest(&bytes));

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents).map_err(|e| {
            ConfigError::ParseError(format!("{}: TOML parse error: {}", path.display(), e))
        })?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Self::toml_to_json).collect())
            }
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    fn redact_secrets(value: &mut Value) -> Vec<String> {
        let mut redactions = Vec::new();
        Self::redact_recursive(value, String::new(), &mut redactions);
        redactions
    }

    fn redact_recursive(value: &mut Value, path: String, redactions: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let current_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };

                    let is_secret = SECRET_PATHS.contains(&current_path.as_str())
                        || SECRET_KEYS.iter().any(|s| key_lower.contains(s));

                    if is_secret && !val.is_object() && !val.is_array() && !val.is_null() {
                        *val = Value::String(REDACTED.to_string());
                        redactions.push(current_path);
                    } else {
                        Self::redact_recursive(val, current_path, redactions);
                    }
                }
            }
            Value::Array(arr) => {
                for (i, val) in arr.iter_mut().enumerate() {
                    Self::redact_recursive(val, format!("{}[{}]", path, i), redactions);
                }
            }
            _ => {}
        }
    }

    /// Merged values including secrets. Never serialized.
    pub(crate) fn unredacted(&self) -> &Value {
        &self.unredacted
    }

    pub fn with_publish_id(mut self, publish_id: impl Into<String>) -> Self {
        self.publish_id = Some(publish_id.into());
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)
    }

    /// Get a (redacted) config value by dot-separated path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_build_with_defaults_only() {
        let config = EffectiveConfig::build(None, None, None).unwrap();

        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.get_str("compression"), Some("zip"));
        assert_eq!(config.get_u64("timeouts.credential_seconds"), Some(60));
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].origin, ConfigOrigin::Builtin);
    }

    #[test]
    fn test_cli_override_wins() {
        let cli = serde_json::json!({"compression": "tar", "max_parallel": 3});
        let config = EffectiveConfig::build(None, None, Some(cli)).unwrap();

        assert_eq!(config.get_str("compression"), Some("tar"));
        assert_eq!(config.get_u64("max_parallel"), Some(3));
        assert_eq!(config.sources.last().unwrap().origin, ConfigOrigin::Cli);
    }

    #[test]
    fn test_encryption_key_redacted() {
        let cli = serde_json::json!({"encryption": {"key": "hunter2"}, "region": "eu-west-1"});
        let config = EffectiveConfig::build(None, None, Some(cli)).unwrap();

        assert_eq!(config.get_str("encryption.key"), Some(REDACTED));
        assert_eq!(config.get_str("region"), Some("eu-west-1"));
        assert_eq!(config.redactions, vec!["encryption.key".to_string()]);
        assert_eq!(config.unredacted()["encryption"]["key"], "hunter2");
        assert!(!config.to_json().unwrap().contains("hunter2"));
    }

    #[test]
    fn test_secret_like_keys_redacted() {
        let cli = serde_json::json!({
            "proxy": {"host": "proxy.local", "port": 3128, "password": "pw"},
            "api_key": "k"
        });
        let config = EffectiveConfig::build(None, None, Some(cli)).unwrap();

        assert_eq!(config.get_str("proxy.password"), Some(REDACTED));
        assert_eq!(config.get_str("proxy.host"), Some("proxy.local"));
        assert_eq!(config.get_str("api_key"), Some(REDACTED));
    }

    #[test]
    fn test_file_layers_with_digests() {
        let mut host = NamedTempFile::new().unwrap();
        writeln!(host, "compression = \"tar\"").unwrap();
        writeln!(host, "[timeouts]").unwrap();
        writeln!(host, "upload_seconds = 60").unwrap();

        let mut workspace = NamedTempFile::new().unwrap();
        writeln!(workspace, "compression = \"tgz\"").unwrap();

        let config =
            EffectiveConfig::build(Some(host.path()), Some(workspace.path()), None).unwrap();

        assert_eq!(config.get_str("compression"), Some("tgz"));
        assert_eq!(config.get_u64("timeouts.upload_seconds"), Some(60));
        assert_eq!(config.get_u64("timeouts.credential_seconds"), Some(60));
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[1].origin, ConfigOrigin::Host);
        assert_eq!(config.sources[2].origin, ConfigOrigin::Workspace);
        assert_eq!(config.sources[1].digest.as_ref().unwrap().len(), 64);
    }

    #[test]
    fn test_missing_files_skipped() {
        let config = EffectiveConfig::build(
            Some(Path::new("/nonexistent/host.toml")),
            Some(Path::new("/nonexistent/ws.toml")),
            None,
        )
        .unwrap();
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "compression = ").unwrap();

        let err = EffectiveConfig::build(Some(file.path()), None, None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_publish_id_context() {
        let config = EffectiveConfig::build(None, None, None)
            .unwrap()
            .with_publish_id("01HZX");
        assert_eq!(config.publish_id.as_deref(), Some("01HZX"));
    }
}
