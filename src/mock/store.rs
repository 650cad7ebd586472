//! In-process artifact store

use std::fs;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use sha2::{Digest, Sha256};

use super::failure::{FailureConfig, FailureInjector, MockOperation};
use crate::credentials::TemporaryCredentials;
use crate::upload::{metadata_keys, ArtifactStore, PutReceipt, PutRequest, StoreError};

/// A put the mock accepted
#[derive(Debug, Clone)]
pub struct RecordedPut {
    pub request: PutRequest,
    /// Body bytes as read at put time
    pub body: Vec<u8>,
    pub access_key_id: String,
}

/// Artifact store that records puts in memory
#[derive(Debug, Default)]
pub struct MockArtifactStore {
    puts: Mutex<Vec<RecordedPut>>,
    injector: Mutex<FailureInjector>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every put according to `config`
    pub fn inject(&self, op: MockOperation, config: FailureConfig) {
        self.injector
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .inject(op, config);
    }

    /// Fail puts to `object_key` according to `config`
    pub fn inject_for(&self, object_key: &str, config: FailureConfig) {
        self.injector
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .inject_for(MockOperation::Put, object_key, config);
    }

    /// Accepted puts, in completion order
    pub fn puts(&self) -> Vec<RecordedPut> {
        self.puts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of put calls, accepted or not
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of puts running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn put_inner(
        &self,
        request: PutRequest,
        credentials: &TemporaryCredentials,
    ) -> Result<PutReceipt, StoreError> {
        let failure = self
            .injector
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .check(MockOperation::Put, &request.location.object_key);

        if let Some(config) = failure {
            if let Some(delay) = config.delay {
                thread::sleep(delay);
            }
            if config.error_code.is_some() {
                let message = config.message().to_string();
                return Err(match config.code() {
                    "AUTH_EXPIRED" => StoreError::AuthExpired(message),
                    "NETWORK" => StoreError::Network(message),
                    "IO" => StoreError::Io(io::Error::other(message)),
                    code => StoreError::Rejected {
                        code: code.to_string(),
                        message,
                    },
                });
            }
        }

        let body = fs::read(&request.body_path)?;
        let sha256 = hex::encode(Sha256::digest(&body));
        let encrypted = request
            .metadata
            .get(metadata_keys::ENCRYPTED)
            .is_some_and(|v| v == "true");

        let receipt = PutReceipt {
            location: request.location.clone(),
            etag: sha256[..32].to_string(),
            version_id: None,
            content_length: body.len() as u64,
            sha256,
            encrypted,
        };

        self.puts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedPut {
                request,
                body,
                access_key_id: credentials.access_key_id().to_string(),
            });

        Ok(receipt)
    }
}

impl ArtifactStore for MockArtifactStore {
    fn put(
        &self,
        request: PutRequest,
        credentials: &TemporaryCredentials,
    ) -> Result<PutReceipt, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.put_inner(request, credentials);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use publish_protocol::StoreLocation;
    use std::collections::BTreeMap;
    use tempfile::NamedTempFile;

    fn request(body: &NamedTempFile, key: &str) -> PutRequest {
        PutRequest {
            location: StoreLocation::new("builds", key),
            body_path: body.path().to_path_buf(),
            content_length: 0,
            sha256: String::new(),
            content_type: "application/zip".to_string(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_records_put() {
        let body = NamedTempFile::new().unwrap();
        fs::write(body.path(), b"abc").unwrap();
        let store = MockArtifactStore::new();
        let creds = TemporaryCredentials::new("AKID", "s", "t");

        let receipt = store.put(request(&body, "a.zip"), &creds).unwrap();
        assert_eq!(receipt.content_length, 3);
        assert_eq!(store.puts()[0].body, b"abc");
        assert_eq!(store.puts()[0].access_key_id, "AKID");
        assert_eq!(store.peak_concurrency(), 1);
    }

    #[test]
    fn test_targeted_failure() {
        let body = NamedTempFile::new().unwrap();
        let store = MockArtifactStore::new();
        store.inject_for("bad.zip", FailureConfig::error("AccessDenied", "nope"));
        let creds = TemporaryCredentials::new("a", "s", "t");

        assert!(matches!(
            store.put(request(&body, "bad.zip"), &creds),
            Err(StoreError::Rejected { .. })
        ));
        assert!(store.put(request(&body, "good.zip"), &creds).is_ok());
        assert_eq!(store.call_count(), 2);
        assert_eq!(store.puts().len(), 1);
    }
}
