//! Credential resolution
//!
//! Exchanges a job identifier for the short-lived credentials the artifact
//! store accepts. Resolution happens once per publish call and any failure
//! is fatal for the whole call: nothing can be uploaded without credentials.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use publish_protocol::{ArtifactCredentials, JobDetails, ServiceError};

use crate::timeout::call_with_timeout;

/// Client for the job-details service.
pub trait JobDetailsService: Send + Sync {
    /// Fetch the details of a job, including its artifact credentials.
    fn get_job_details(&self, job_id: &str) -> Result<JobDetails, ServiceError>;
}

/// Credentials scoped to one job's artifact store access.
///
/// Read-only after resolution; shared across artifact chains behind an `Arc`.
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl TemporaryCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the credentials have expired as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Convert the wire form, rejecting empty fields.
    pub fn from_wire(wire: ArtifactCredentials) -> Result<Self, CredentialError> {
        for (field, value) in [
            ("access_key_id", &wire.access_key_id),
            ("secret_access_key", &wire.secret_access_key),
            ("session_token", &wire.session_token),
        ] {
            if value.trim().is_empty() {
                return Err(CredentialError::Incomplete { field });
            }
        }

        Ok(Self {
            access_key_id: wire.access_key_id,
            secret_access_key: wire.secret_access_key,
            session_token: wire.session_token,
            expires_at: wire.expires_at,
        })
    }
}

impl fmt::Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Credential resolution errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("job id must not be empty")]
    EmptyJobId,

    #[error("job-details service error: {0}")]
    Service(#[from] ServiceError),

    #[error("job-details service did not answer within {limit:?}")]
    Timeout { limit: Duration },

    #[error("artifact credentials are missing {field}")]
    Incomplete { field: &'static str },

    #[error("artifact credentials expired at {expires_at}")]
    Expired { expires_at: DateTime<Utc> },

    #[error("job-details service answered for job '{returned}' instead of '{requested}'")]
    JobMismatch { requested: String, returned: String },
}

/// Resolves temporary credentials through the job-details service.
pub struct CredentialResolver {
    service: Arc<dyn JobDetailsService>,
    timeout: Duration,
}

impl CredentialResolver {
    pub fn new(service: Arc<dyn JobDetailsService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Resolve credentials for `job_id`. Not retried.
    pub fn resolve(&self, job_id: &str) -> Result<TemporaryCredentials, CredentialError> {
        let job_id = job_id.trim();
        if job_id.is_empty() {
            return Err(CredentialError::EmptyJobId);
        }

        let service = Arc::clone(&self.service);
        let requested = job_id.to_string();
        let details = call_with_timeout(self.timeout, move || {
            service.get_job_details(&requested)
        })
        .map_err(|_| CredentialError::Timeout {
            limit: self.timeout,
        })??;

        if details.job_id != job_id {
            return Err(CredentialError::JobMismatch {
                requested: job_id.to_string(),
                returned: details.job_id,
            });
        }

        let credentials = TemporaryCredentials::from_wire(details.artifact_credentials)?;
        if let Some(expires_at) = credentials.expires_at() {
            if credentials.is_expired() {
                return Err(CredentialError::Expired { expires_at });
            }
        }

        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockJobService;
    use chrono::Duration as ChronoDuration;

    fn wire(secret: &str) -> ArtifactCredentials {
        ArtifactCredentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: secret.to_string(),
            session_token: "token".to_string(),
            expires_at: None,
        }
    }

    fn resolver(service: MockJobService) -> CredentialResolver {
        CredentialResolver::new(Arc::new(service), Duration::from_secs(5))
    }

    #[test]
    fn test_resolve_returns_triplet() {
        let service = MockJobService::new();
        service.insert_job("job-1", vec![], wire("secret"));

        let creds = resolver(service).resolve("job-1").unwrap();
        assert_eq!(creds.access_key_id(), "AKID");
        assert_eq!(creds.secret_access_key(), "secret");
        assert_eq!(creds.session_token(), "token");
    }

    #[test]
    fn test_empty_job_id_skips_service() {
        let service = Arc::new(MockJobService::new());
        let resolver = CredentialResolver::new(service.clone(), Duration::from_secs(5));

        assert!(matches!(resolver.resolve(" "), Err(CredentialError::EmptyJobId)));
        assert_eq!(service.call_count(), 0);
    }

    #[test]
    fn test_unknown_job_is_service_error() {
        let err = resolver(MockJobService::new()).resolve("nope").unwrap_err();
        match err {
            CredentialError::Service(e) => {
                assert_eq!(e.code, publish_protocol::ServiceErrorCode::JobNotFound)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_secret_is_incomplete() {
        let service = MockJobService::new();
        service.insert_job("job-1", vec![], wire(""));

        let err = resolver(service).resolve("job-1").unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Incomplete { field: "secret_access_key" }
        ));
    }

    #[test]
    fn test_expired_credentials_rejected() {
        let service = MockJobService::new();
        let mut creds = wire("secret");
        creds.expires_at = Some(Utc::now() - ChronoDuration::minutes(5));
        service.insert_job("job-1", vec![], creds);

        let err = resolver(service).resolve("job-1").unwrap_err();
        assert!(matches!(err, CredentialError::Expired { .. }));
    }

    #[test]
    fn test_slow_service_times_out() {
        let service = MockJobService::new();
        service.insert_job("job-1", vec![], wire("secret"));
        service.set_delay(Duration::from_secs(3));

        let resolver = CredentialResolver::new(Arc::new(service), Duration::from_millis(50));
        let err = resolver.resolve("job-1").unwrap_err();
        assert!(matches!(err, CredentialError::Timeout { .. }));
        assert_eq!(err.to_string(), "job-details service did not answer within 50ms");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = TemporaryCredentials::new("AKID", "s3cr3t", "tok3n");
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("s3cr3t"));
        assert!(!rendered.contains("tok3n"));
    }

    #[test]
    fn test_expiry_check() {
        let now = Utc::now();
        let creds = TemporaryCredentials::new("a", "b", "c").with_expiry(now);
        assert!(creds.is_expired_at(now));
        assert!(!creds.is_expired_at(now - ChronoDuration::seconds(1)));
        assert!(!TemporaryCredentials::new("a", "b", "c").is_expired());
    }
}
