//! Upload of packaged files to the artifact store
//!
//! The `ArtifactStore` trait hides the store's transfer protocol. The
//! `Uploader` builds a `PutRequest` from a packaged file and the artifact's
//! declared identity, calls the store under the upload timeout, and maps
//! store errors onto a small set of failure kinds.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use publish_protocol::{ExpectedOutputArtifact, StoreLocation};
use serde::{Deserialize, Serialize};

use crate::compress::PackagedFile;
use crate::credentials::TemporaryCredentials;
use crate::timeout::call_with_timeout;

/// Metadata keys attached to every upload
pub mod metadata_keys {
    pub const ARTIFACT_NAME: &str = "artifact-name";
    pub const COMPRESSION: &str = "compression";
    pub const ENCRYPTED: &str = "encrypted";
    pub const PROJECT: &str = "project";
    pub const JOB_ID: &str = "job-id";
    pub const REGION: &str = "region";
    pub const SHA256: &str = "sha256";
}

/// Remote object store client.
pub trait ArtifactStore: Send + Sync {
    /// Store the body at `request.location`.
    fn put(
        &self,
        request: PutRequest,
        credentials: &TemporaryCredentials,
    ) -> Result<PutReceipt, StoreError>;
}

/// One object to store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub location: StoreLocation,
    /// Local file holding the body
    pub body_path: PathBuf,
    pub content_length: u64,
    /// Hex SHA-256 of the body
    pub sha256: String,
    pub content_type: String,
    pub metadata: BTreeMap<String, String>,
}

/// Store acknowledgement of a successful put
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutReceipt {
    pub location: StoreLocation,
    pub etag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub content_length: u64,
    pub sha256: String,
    pub encrypted: bool,
}

/// Errors reported by an `ArtifactStore`
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("credentials expired or rejected: {0}")]
    AuthExpired(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("store rejected request ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Why an upload did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadFailureKind {
    AuthorizationExpired,
    Network,
    StoreRejected,
    Timeout,
    LocalIo,
}

impl fmt::Display for UploadFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadFailureKind::AuthorizationExpired => "authorization_expired",
            UploadFailureKind::Network => "network",
            UploadFailureKind::StoreRejected => "store_rejected",
            UploadFailureKind::Timeout => "timeout",
            UploadFailureKind::LocalIo => "local_io",
        };
        write!(f, "{}", s)
    }
}

/// Upload failure with its kind and the underlying message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct UploadFailure {
    pub kind: UploadFailureKind,
    pub message: String,
}

impl UploadFailure {
    pub fn new(kind: UploadFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<StoreError> for UploadFailure {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::AuthExpired(_) => UploadFailureKind::AuthorizationExpired,
            StoreError::Network(_) => UploadFailureKind::Network,
            StoreError::Rejected { .. } => UploadFailureKind::StoreRejected,
            StoreError::Io(_) => UploadFailureKind::LocalIo,
        };
        Self::new(kind, err.to_string())
    }
}

/// Identity of the publish call, copied into upload metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadContext {
    pub project_name: String,
    pub job_id: String,
    pub region: Option<String>,
}

/// Pushes packaged files to an `ArtifactStore`.
///
/// A timed-out put is abandoned, not aborted: the store call keeps running on
/// its helper thread and may still commit the object after the artifact is
/// reported as `UploadFailed(Timeout)`. The body file is removed once the wait
/// ends, so a put that has not opened it yet fails instead of committing.
/// Stores should treat a later put to the same location as an overwrite.
pub struct Uploader {
    store: Arc<dyn ArtifactStore>,
    timeout: Duration,
}

impl Uploader {
    pub fn new(store: Arc<dyn ArtifactStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Build the store request for `file`.
    pub fn request_for(
        file: &PackagedFile,
        artifact: &ExpectedOutputArtifact,
        context: &UploadContext,
    ) -> PutRequest {
        let mut metadata = BTreeMap::new();
        metadata.insert(metadata_keys::ARTIFACT_NAME.to_string(), artifact.name.clone());
        metadata.insert(metadata_keys::COMPRESSION.to_string(), file.mode().to_string());
        metadata.insert(metadata_keys::ENCRYPTED.to_string(), file.is_encrypted().to_string());
        metadata.insert(metadata_keys::PROJECT.to_string(), context.project_name.clone());
        metadata.insert(metadata_keys::JOB_ID.to_string(), context.job_id.clone());
        metadata.insert(metadata_keys::SHA256.to_string(), file.sha256().to_string());
        if let Some(region) = &context.region {
            metadata.insert(metadata_keys::REGION.to_string(), region.clone());
        }

        PutRequest {
            location: artifact.location.clone(),
            body_path: file.path().to_path_buf(),
            content_length: file.len(),
            sha256: file.sha256().to_string(),
            content_type: file.mode().content_type().to_string(),
            metadata,
        }
    }

    /// Upload `file` for `artifact`. The file is deleted once this returns.
    pub fn upload(
        &self,
        file: PackagedFile,
        artifact: &ExpectedOutputArtifact,
        context: &UploadContext,
        credentials: &Arc<TemporaryCredentials>,
    ) -> Result<PutReceipt, UploadFailure> {
        if credentials.is_expired() {
            return Err(UploadFailure::new(
                UploadFailureKind::AuthorizationExpired,
                "temporary credentials expired before upload",
            ));
        }

        let request = Self::request_for(&file, artifact, context);
        let store = Arc::clone(&self.store);
        let creds = Arc::clone(credentials);
        let result = call_with_timeout(self.timeout, move || store.put(request, &creds));

        // The store has finished reading the body (or we stopped waiting).
        drop(file);

        match result {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(err)) => Err(err.into()),
            Err(timed_out) => Err(UploadFailure::new(
                UploadFailureKind::Timeout,
                timed_out.to_string(),
            )),
        }
    }
}
