//! Configuration layering
//!
//! Four layers, later wins:
//! 1. Built-in defaults
//! 2. Host config (~/.config/artifact-publisher/config.toml)
//! 3. Workspace config (<workspace>/.artifact-publisher.toml)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;
mod publisher;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, REDACTED};
pub use merge::{deep_merge, merge_layers};
pub use publisher::{ProxyConfig, PublisherConfig, MAX_PARALLEL_LIMIT};

use std::path::{Path, PathBuf};

/// Workspace config file name
pub const WORKSPACE_CONFIG_FILE: &str = ".artifact-publisher.toml";

/// Default host config path, if a home directory is known
pub fn default_host_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("artifact-publisher")
            .join("config.toml")
    })
}

/// Workspace config path for `workspace`
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(WORKSPACE_CONFIG_FILE)
}
