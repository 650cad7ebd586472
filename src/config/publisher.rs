//! Typed publisher configuration
//!
//! Extracted from an `EffectiveConfig` and validated once. The encryption
//! key is parsed (and a passphrase stretched) here, not per artifact.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::effective::{ConfigError, EffectiveConfig};
use crate::compress::{CompressionMode, ExcludeRules};
use crate::encrypt::EncryptionKey;
use crate::timeout::TimeoutConfig;

/// Upper bound for `max_parallel`
pub const MAX_PARALLEL_LIMIT: usize = 64;

/// HTTP proxy used by the service and store clients
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
        }
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "proxy.host must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::ValidationError(
                "proxy.port must be in [1, 65535]".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RawEncryption {
    #[serde(default)]
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    compression: CompressionMode,
    max_parallel: usize,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    temp_dir: Option<PathBuf>,
    #[serde(default)]
    excludes: Vec<String>,
    #[serde(default)]
    dereference_symlinks: bool,
    #[serde(default)]
    encryption: Option<RawEncryption>,
    #[serde(default)]
    proxy: Option<ProxyConfig>,
    timeouts: TimeoutConfig,
}

/// Validated configuration for one `Publisher`
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub compression: CompressionMode,
    pub encryption_key: Option<EncryptionKey>,
    pub proxy: Option<ProxyConfig>,
    pub region: Option<String>,
    pub timeouts: TimeoutConfig,
    pub max_parallel: usize,
    pub excludes: ExcludeRules,
    pub temp_dir: Option<PathBuf>,
    pub dereference_symlinks: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            compression: CompressionMode::default(),
            encryption_key: None,
            proxy: None,
            region: None,
            timeouts: TimeoutConfig::default(),
            max_parallel: 1,
            excludes: ExcludeRules::default(),
            temp_dir: None,
            dereference_symlinks: false,
        }
    }
}

impl PublisherConfig {
    /// Extract and validate the typed config from merged layers.
    pub fn from_effective(effective: &EffectiveConfig) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_value(effective.unredacted().clone())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        let encryption_key = match raw.encryption.and_then(|e| e.key) {
            Some(value) if !value.trim().is_empty() => Some(
                EncryptionKey::from_config_value(&value)
                    .map_err(|e| ConfigError::ValidationError(format!("encryption.key: {}", e)))?,
            ),
            _ => None,
        };

        let excludes = ExcludeRules::new(&raw.excludes)
            .map_err(|e| ConfigError::ValidationError(format!("excludes: {}", e)))?;

        let region = raw.region.filter(|r| !r.trim().is_empty());

        let config = Self {
            compression: raw.compression,
            encryption_key,
            proxy: raw.proxy,
            region,
            timeouts: raw.timeouts,
            max_parallel: raw.max_parallel,
            excludes,
            temp_dir: raw.temp_dir,
            dereference_symlinks: raw.dereference_symlinks,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel == 0 || self.max_parallel > MAX_PARALLEL_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "max_parallel must be in [1, {}], got {}",
                MAX_PARALLEL_LIMIT, self.max_parallel
            )));
        }

        self.timeouts
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if let Some(proxy) = &self.proxy {
            proxy.validate()?;
        }

        if let Some(dir) = &self.temp_dir {
            if !dir.is_dir() {
                return Err(ConfigError::ValidationError(format!(
                    "temp_dir is not a directory: {}",
                    dir.display()
                )));
            }
        }

        Ok(())
    }

    pub fn with_compression(mut self, compression: CompressionMode) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_encryption_key(mut self, key: EncryptionKey) -> Self {
        self.encryption_key = Some(key);
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_excludes(mut self, excludes: ExcludeRules) -> Self {
        self.excludes = excludes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(cli: serde_json::Value) -> Result<PublisherConfig, ConfigError> {
        let effective = EffectiveConfig::build(None, None, Some(cli))?;
        PublisherConfig::from_effective(&effective)
    }

    #[test]
    fn test_defaults() {
        let config = build(json!({})).unwrap();

        assert_eq!(config.compression, CompressionMode::Zip);
        assert_eq!(config.max_parallel, 1);
        assert!(config.encryption_key.is_none());
        assert_eq!(config.timeouts.upload_seconds, 900);
    }

    #[test]
    fn test_compression_aliases() {
        let config = build(json!({"compression": "tar.gz"})).unwrap();
        assert_eq!(config.compression, CompressionMode::TarGz);

        assert!(build(json!({"compression": "rar"})).is_err());
    }

    #[test]
    fn test_encryption_key_parsed_once() {
        let config = build(json!({"encryption": {"key": "base64:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="}}))
            .unwrap();
        let key = config.encryption_key.unwrap();
        assert_eq!(key.fingerprint(), EncryptionKey::from_bytes([0u8; 32]).fingerprint());
    }

    #[test]
    fn test_blank_encryption_key_means_none() {
        let config = build(json!({"encryption": {"key": ""}})).unwrap();
        assert!(config.encryption_key.is_none());
    }

    #[test]
    fn test_bad_encryption_key_rejected() {
        let err = build(json!({"encryption": {"key": "base64:AAAA"}})).unwrap_err();
        assert!(err.to_string().contains("encryption.key"));
    }

    #[test]
    fn test_max_parallel_bounds() {
        assert!(build(json!({"max_parallel": 0})).is_err());
        assert!(build(json!({"max_parallel": 65})).is_err());
        assert_eq!(build(json!({"max_parallel": 8})).unwrap().max_parallel, 8);
    }

    #[test]
    fn test_timeout_bounds() {
        let err = build(json!({"timeouts": {"upload_seconds": 0}})).unwrap_err();
        assert!(err.to_string().contains("upload_seconds"));
    }

    #[test]
    fn test_proxy_validation() {
        let config = build(json!({"proxy": {"host": "proxy.local", "port": 3128}})).unwrap();
        assert_eq!(config.proxy.unwrap().address(), "proxy.local:3128");

        assert!(build(json!({"proxy": {"host": "", "port": 3128}})).is_err());
        assert!(build(json!({"proxy": {"host": "p", "port": 0}})).is_err());
    }

    #[test]
    fn test_invalid_exclude_rejected() {
        let err = build(json!({"excludes": ["a[b"]})).unwrap_err();
        assert!(err.to_string().contains("excludes"));
    }

    #[test]
    fn test_proxy_debug_redacts_password() {
        let mut proxy = ProxyConfig::new("p", 1);
        proxy.password = Some("pw-value".to_string());
        assert!(!format!("{:?}", proxy).contains("pw-value"));
    }
}
