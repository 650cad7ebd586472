//! Filesystem-backed artifact store
//!
//! Objects land at `<root>/<bucket>/<object_key>`, with a JSON sidecar
//! `<object_key>.meta.json` next to each. Bodies are copied to a partial
//! file, checked against the declared length and digest, then renamed into
//! place.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use publish_protocol::StoreLocation;

use crate::credentials::TemporaryCredentials;
use crate::upload::{metadata_keys, ArtifactStore, PutReceipt, PutRequest, StoreError};

/// Schema version for object sidecars
pub const SIDECAR_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for object sidecars
pub const SIDECAR_SCHEMA_ID: &str = "artifact-publisher/object_meta@1";

/// Suffix of the metadata sidecar
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// Metadata written next to each stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSidecar {
    pub schema_version: u32,
    pub schema_id: String,
    pub location: StoreLocation,
    pub content_type: String,
    pub content_length: u64,
    pub sha256: String,
    pub version_id: String,
    pub stored_at: DateTime<Utc>,
    /// Access key that performed the put (never the secret)
    pub access_key_id: String,
    pub metadata: BTreeMap<String, String>,
}

/// Artifact store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an object is (or would be) stored at
    pub fn object_path(&self, location: &StoreLocation) -> Result<PathBuf, StoreError> {
        let bucket = safe_relative(&location.bucket, "bucket")?;
        let key = safe_relative(&location.object_key, "object key")?;
        if bucket.components().count() != 1 {
            return Err(rejected("INVALID_BUCKET", format!("bucket must be a single segment: {}", location.bucket)));
        }
        Ok(self.root.join(bucket).join(key))
    }

    /// Read a stored object's sidecar
    pub fn read_sidecar(&self, location: &StoreLocation) -> Result<ObjectSidecar, StoreError> {
        let path = sidecar_path(&self.object_path(location)?);
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| StoreError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    fn check_credentials(credentials: &TemporaryCredentials) -> Result<(), StoreError> {
        if credentials.access_key_id().is_empty()
            || credentials.secret_access_key().is_empty()
            || credentials.session_token().is_empty()
        {
            return Err(StoreError::AuthExpired("incomplete credentials".to_string()));
        }
        if let Some(expires_at) = credentials.expires_at() {
            if credentials.is_expired() {
                return Err(StoreError::AuthExpired(format!("credentials expired at {}", expires_at)));
            }
        }
        Ok(())
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(
        &self,
        request: PutRequest,
        credentials: &TemporaryCredentials,
    ) -> Result<PutReceipt, StoreError> {
        Self::check_credentials(credentials)?;

        let target = self.object_path(&request.location)?;
        let parent = target
            .parent()
            .ok_or_else(|| rejected("INVALID_KEY", "object key has no parent"))?;
        fs::create_dir_all(parent)?;

        let version_id = ulid::Ulid::new().to_string();
        let partial = parent.join(format!(".partial-{}", version_id));

        let (written, digest) = match copy_with_digest(&request.body_path, &partial) {
            Ok(result) => result,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                return Err(e.into());
            }
        };

        if written != request.content_length {
            let _ = fs::remove_file(&partial);
            return Err(rejected(
                "LENGTH_MISMATCH",
                format!("declared {} bytes, received {}", request.content_length, written),
            ));
        }
        if !request.sha256.is_empty() && digest != request.sha256 {
            let _ = fs::remove_file(&partial);
            return Err(rejected(
                "BAD_DIGEST",
                format!("declared sha256 {}, received {}", request.sha256, digest),
            ));
        }

        if let Err(e) = fs::rename(&partial, &target) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }

        let sidecar = ObjectSidecar {
            schema_version: SIDECAR_SCHEMA_VERSION,
            schema_id: SIDECAR_SCHEMA_ID.to_string(),
            location: request.location.clone(),
            content_type: request.content_type.clone(),
            content_length: written,
            sha256: digest.clone(),
            version_id: version_id.clone(),
            stored_at: Utc::now(),
            access_key_id: credentials.access_key_id().to_string(),
            metadata: request.metadata.clone(),
        };
        let json = serde_json::to_string_pretty(&sidecar)
            .map_err(|e| StoreError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        fs::write(sidecar_path(&target), json)?;

        let encrypted = request
            .metadata
            .get(metadata_keys::ENCRYPTED)
            .is_some_and(|v| v == "true");

        Ok(PutReceipt {
            location: request.location,
            etag: digest[..32].to_string(),
            version_id: Some(version_id),
            content_length: written,
            sha256: digest,
            encrypted,
        })
    }
}

fn rejected(code: &str, message: impl Into<String>) -> StoreError {
    StoreError::Rejected {
        code: code.to_string(),
        message: message.into(),
    }
}

fn safe_relative(value: &str, what: &str) -> Result<PathBuf, StoreError> {
    let path = Path::new(value);
    if value.trim().is_empty() {
        return Err(rejected("INVALID_KEY", format!("{} must not be empty", what)));
    }
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(rejected("INVALID_KEY", format!("unsafe {}: {}", what, value)));
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(rejected("INVALID_KEY", format!("unsafe {}: {}", what, value)));
    }
    Ok(out)
}

fn sidecar_path(object: &Path) -> PathBuf {
    let mut name = object.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

fn copy_with_digest(from: &Path, to: &Path) -> io::Result<(u64, String)> {
    let mut input = File::open(from)?;
    let mut output = File::create(to)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut written = 0u64;

    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        output.write_all(&buf[..n])?;
        written += n as u64;
    }
    output.sync_all()?;

    Ok((written, hex::encode(hasher.finalize())))
}
