//! Client construction
//!
//! The pipeline never builds clients itself. A `ClientFactory` turns the
//! region/proxy settings into a job-details service and an artifact store.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ProxyConfig, PublisherConfig};
use crate::credentials::JobDetailsService;
use crate::service::FileJobDetailsService;
use crate::store::FsArtifactStore;
use crate::upload::ArtifactStore;

/// Connection settings shared by both clients
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSettings {
    pub region: Option<String>,
    pub proxy: Option<ProxyConfig>,
}

impl ClientSettings {
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self {
            region: config.region.clone(),
            proxy: config.proxy.clone(),
        }
    }
}

/// Connected clients for one publish call
#[derive(Clone)]
pub struct Clients {
    pub job_service: Arc<dyn JobDetailsService>,
    pub store: Arc<dyn ArtifactStore>,
}

/// Errors building clients
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("job details source not found: {}", .0.display())]
    JobDetailsMissing(PathBuf),

    #[error("artifact store root unusable: {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("unsupported client setting: {0}")]
    Unsupported(String),
}

/// Builds clients from settings.
pub trait ClientFactory: Send + Sync {
    fn connect(&self, settings: &ClientSettings) -> Result<Clients, ConnectError>;
}

/// Hands out pre-built clients, ignoring settings.
pub struct StaticClientFactory {
    clients: Clients,
}

impl StaticClientFactory {
    pub fn new(job_service: Arc<dyn JobDetailsService>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            clients: Clients { job_service, store },
        }
    }
}

impl ClientFactory for StaticClientFactory {
    fn connect(&self, _settings: &ClientSettings) -> Result<Clients, ConnectError> {
        Ok(self.clients.clone())
    }
}

/// Local clients: job details from JSON files, objects in a directory tree.
///
/// Both live on the local filesystem, so a proxy cannot apply and is
/// rejected rather than silently ignored.
#[derive(Debug, Clone)]
pub struct LocalClientFactory {
    job_details: PathBuf,
    store_root: PathBuf,
}

impl LocalClientFactory {
    pub fn new(job_details: impl Into<PathBuf>, store_root: impl Into<PathBuf>) -> Self {
        Self {
            job_details: job_details.into(),
            store_root: store_root.into(),
        }
    }
}

impl ClientFactory for LocalClientFactory {
    fn connect(&self, settings: &ClientSettings) -> Result<Clients, ConnectError> {
        if let Some(proxy) = &settings.proxy {
            return Err(ConnectError::Unsupported(format!(
                "proxy {} cannot be used with local clients",
                proxy.address()
            )));
        }

        if !self.job_details.exists() {
            return Err(ConnectError::JobDetailsMissing(self.job_details.clone()));
        }

        fs::create_dir_all(&self.store_root).map_err(|e| ConnectError::StoreUnavailable {
            path: self.store_root.clone(),
            reason: e.to_string(),
        })?;

        Ok(Clients {
            job_service: Arc::new(FileJobDetailsService::new(&self.job_details)),
            store: Arc::new(FsArtifactStore::new(&self.store_root)),
        })
    }
}
