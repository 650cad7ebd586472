//! Configuration layering tests
//!
//! Builtin defaults → host file → workspace file → CLI overrides, later wins.

use std::fs;

use artifact_publisher::compress::CompressionMode;
use artifact_publisher::config::{
    workspace_config_path, ConfigOrigin, EffectiveConfig, PublisherConfig, REDACTED,
};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_builtin_defaults_only() {
    let effective = EffectiveConfig::build(None, None, None).unwrap();
    let config = PublisherConfig::from_effective(&effective).unwrap();

    assert_eq!(config.compression, CompressionMode::Zip);
    assert_eq!(config.max_parallel, 1);
    assert_eq!(config.timeouts.credential_seconds, 60);
    assert_eq!(config.timeouts.upload_seconds, 900);
    assert!(config.encryption_key.is_none());
    assert_eq!(effective.sources.len(), 1);
}

#[test]
fn test_later_layers_win() {
    let dir = TempDir::new().unwrap();
    let host = dir.path().join("host.toml");
    fs::write(
        &host,
        r#"
compression = "tar"
max_parallel = 2
region = "eu-west-1"

[timeouts]
upload_seconds = 120
"#,
    )
    .unwrap();

    let workspace = dir.path().join("ws");
    fs::create_dir_all(&workspace).unwrap();
    let ws_config = workspace_config_path(&workspace);
    fs::write(
        &ws_config,
        r#"
compression = "tgz"
excludes = ["*.log"]

[timeouts]
credential_seconds = 30
"#,
    )
    .unwrap();

    let effective =
        EffectiveConfig::build(Some(&host), Some(&ws_config), Some(json!({"max_parallel": 8})))
            .unwrap();
    let config = PublisherConfig::from_effective(&effective).unwrap();

    assert_eq!(config.compression, CompressionMode::TarGz);
    assert_eq!(config.max_parallel, 8);
    assert_eq!(config.region.as_deref(), Some("eu-west-1"));
    // Tables merge key by key across layers.
    assert_eq!(config.timeouts.upload_seconds, 120);
    assert_eq!(config.timeouts.credential_seconds, 30);

    let origins: Vec<ConfigOrigin> = effective.sources.iter().map(|s| s.origin.clone()).collect();
    assert_eq!(
        origins,
        vec![
            ConfigOrigin::Builtin,
            ConfigOrigin::Host,
            ConfigOrigin::Workspace,
            ConfigOrigin::Cli
        ]
    );
    assert_eq!(effective.sources[1].digest.as_ref().map(|d| d.len()), Some(64));
}

#[test]
fn test_missing_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    let effective = EffectiveConfig::build(
        Some(&dir.path().join("absent.toml")),
        Some(&dir.path().join("also-absent.toml")),
        None,
    )
    .unwrap();

    assert_eq!(effective.sources.len(), 1);
}

#[test]
fn test_encryption_key_redacted_but_usable() {
    let dir = TempDir::new().unwrap();
    let ws_config = dir.path().join(".artifact-publisher.toml");
    fs::write(
        &ws_config,
        r#"
[encryption]
key = "a long and secret passphrase"

[proxy]
host = "proxy.internal"
port = 3128
password = "hunter2"
"#,
    )
    .unwrap();

    let effective = EffectiveConfig::build(None, Some(&ws_config), None).unwrap();

    let json = effective.to_json().unwrap();
    assert!(!json.contains("a long and secret passphrase"));
    assert!(!json.contains("hunter2"));
    assert_eq!(effective.get_str("encryption.key"), Some(REDACTED));
    assert!(effective.redactions.contains(&"encryption.key".to_string()));
    assert!(effective.redactions.contains(&"proxy.password".to_string()));

    let config = PublisherConfig::from_effective(&effective).unwrap();
    assert!(config.encryption_key.is_some());
    assert_eq!(config.proxy.unwrap().address(), "proxy.internal:3128");
}

#[test]
fn test_invalid_values_rejected() {
    for overrides in [
        json!({"compression": "rar"}),
        json!({"max_parallel": 0}),
        json!({"timeouts": {"upload_seconds": 0}}),
        json!({"encryption": {"key": "base64:c2hvcnQ="}}),
    ] {
        let effective = EffectiveConfig::build(None, None, Some(overrides.clone())).unwrap();
        assert!(
            PublisherConfig::from_effective(&effective).is_err(),
            "accepted {}",
            overrides
        );
    }
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "compression = ").unwrap();

    let err = EffectiveConfig::build(None, Some(&path), None).unwrap_err();
    assert!(err.to_string().contains("TOML parse error"));
}
