//! Timeout enforcement for blocking service calls
//!
//! Two limits apply to every publish call:
//! - `credential_seconds`: maximum wait for the job-details service
//! - `upload_seconds`: maximum wait for a single artifact upload
//!
//! Clients are synchronous, so the limit is enforced from the caller side:
//! the call runs on a helper thread and the caller stops waiting once the
//! limit passes. A call that outlives its limit is abandoned, not killed.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Maximum wait for credential resolution (default: 60)
    pub credential_seconds: u64,

    /// Maximum wait per artifact upload (default: 900 = 15 min)
    pub upload_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            credential_seconds: 60,
            upload_seconds: 900,
        }
    }
}

impl TimeoutConfig {
    /// Validate bounds
    pub fn validate(&self) -> Result<(), TimeoutValidationError> {
        // credential_seconds must be in (0, 600]
        if self.credential_seconds == 0 || self.credential_seconds > 600 {
            return Err(TimeoutValidationError::CredentialOutOfBounds {
                value: self.credential_seconds,
            });
        }

        // upload_seconds must be in (0, 86400]
        if self.upload_seconds == 0 || self.upload_seconds > 86400 {
            return Err(TimeoutValidationError::UploadOutOfBounds {
                value: self.upload_seconds,
            });
        }

        Ok(())
    }

    /// Create TimeoutConfig from optional config values
    pub fn from_config(credential: Option<u64>, upload: Option<u64>) -> Self {
        let defaults = Self::default();
        Self {
            credential_seconds: credential.unwrap_or(defaults.credential_seconds),
            upload_seconds: upload.unwrap_or(defaults.upload_seconds),
        }
    }

    pub fn credential_limit(&self) -> Duration {
        Duration::from_secs(self.credential_seconds)
    }

    pub fn upload_limit(&self) -> Duration {
        Duration::from_secs(self.upload_seconds)
    }
}

/// Timeout validation errors
#[derive(Debug, thiserror::Error)]
pub enum TimeoutValidationError {
    #[error("credential_seconds must be in (0, 600], got {value}")]
    CredentialOutOfBounds { value: u64 },

    #[error("upload_seconds must be in (0, 86400], got {value}")]
    UploadOutOfBounds { value: u64 },
}

/// The call did not finish within its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("call did not complete within {limit:?}")]
pub struct TimedOut {
    pub limit: Duration,
}

/// Run `f` on a helper thread and wait at most `limit` for its result.
///
/// If `f` panics the channel closes early and `Err(TimedOut)` is returned
/// without waiting out the limit.
pub fn call_with_timeout<T, F>(limit: Duration, f: F) -> Result<T, TimedOut>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // Receiver may be gone after a timeout.
        let _ = tx.send(f());
    });

    rx.recv_timeout(limit).map_err(|_| TimedOut { limit })
}
