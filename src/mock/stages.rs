//! Compressor and encryptor doubles
//!
//! Both wrap the real implementation and record calls, so tests can assert
//! which stages ran for which artifact.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use super::failure::{FailureConfig, FailureInjector, MockOperation};
use crate::compress::{ArchiveCompressor, CompressError, CompressionMode, Compressor, PackagedFile};
use crate::encrypt::{AesGcmEncryptor, EncryptError, EncryptionKey, Encryptor};

/// Compressor that records locations and can fail on demand
pub struct MockCompressor {
    inner: Box<dyn Compressor>,
    injector: Mutex<FailureInjector>,
    calls: Mutex<Vec<String>>,
}

impl Default for MockCompressor {
    fn default() -> Self {
        Self::wrap(ArchiveCompressor::new())
    }
}

impl MockCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrap(inner: impl Compressor + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            injector: Mutex::new(FailureInjector::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Apply `config` to every compression
    pub fn inject(&self, config: FailureConfig) {
        self.injector
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .inject(MockOperation::Compress, config);
    }

    /// Apply `config` to compressions of `location`
    pub fn inject_for(&self, location: &str, config: FailureConfig) {
        self.injector
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .inject_for(MockOperation::Compress, location, config);
    }

    /// Locations passed to `compress`, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Compressor for MockCompressor {
    fn compress(
        &self,
        workspace: &Path,
        location: &str,
        mode: CompressionMode,
    ) -> Result<PackagedFile, CompressError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(location.to_string());

        let failure = self
            .injector
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .check(MockOperation::Compress, location);
        if let Some(config) = failure {
            if let Some(delay) = config.delay {
                thread::sleep(delay);
            }
            if config.error_code.is_some() {
                return Err(CompressError::Io(io::Error::other(config.message().to_string())));
            }
        }

        self.inner.compress(workspace, location, mode)
    }
}

/// Encryptor that counts calls and can fail on demand
#[derive(Default)]
pub struct MockEncryptor {
    inner: AesGcmEncryptor,
    injector: Mutex<FailureInjector>,
    calls: AtomicUsize,
}

impl MockEncryptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encryptor whose every call fails with `message`
    pub fn failing(message: &str) -> Self {
        let encryptor = Self::default();
        encryptor.inject(FailureConfig::error("CIPHER", message));
        encryptor
    }

    pub fn inject(&self, config: FailureConfig) {
        self.injector
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .inject(MockOperation::Encrypt, config);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Encryptor for MockEncryptor {
    fn encrypt(&self, file: PackagedFile, key: &EncryptionKey) -> Result<PackagedFile, EncryptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let target = file.path().to_string_lossy().to_string();
        let failure = self
            .injector
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .check(MockOperation::Encrypt, &target);
        if let Some(config) = failure {
            if config.error_code.is_some() {
                return Err(EncryptError::Cipher(config.message().to_string()));
            }
        }

        self.inner.encrypt(file, key)
    }
}
