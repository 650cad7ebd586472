//! In-process job-details service

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use publish_protocol::{
    ArtifactCredentials, ExpectedOutputArtifact, JobDetails, ServiceError, ServiceErrorCode,
};

use super::failure::{FailureConfig, FailureInjector, MockOperation};
use crate::credentials::JobDetailsService;

/// Job-details service backed by an in-memory map
#[derive(Debug, Default)]
pub struct MockJobService {
    jobs: Mutex<HashMap<String, JobDetails>>,
    injector: Mutex<FailureInjector>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockJobService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job
    pub fn insert_job(
        &self,
        job_id: &str,
        output_artifacts: Vec<ExpectedOutputArtifact>,
        artifact_credentials: ArtifactCredentials,
    ) {
        let details = JobDetails {
            job_id: job_id.to_string(),
            output_artifacts,
            artifact_credentials,
        };
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job_id.to_string(), details);
    }

    /// Delay every call by `delay`
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }

    /// Fail calls according to `config`
    pub fn inject(&self, config: FailureConfig) {
        self.injector
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .inject(MockOperation::GetJobDetails, config);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn service_code(code: &str) -> ServiceErrorCode {
    serde_json::from_value(serde_json::Value::String(code.to_string()))
        .unwrap_or(ServiceErrorCode::Internal)
}

impl JobDetailsService for MockJobService {
    fn get_job_details(&self, job_id: &str) -> Result<JobDetails, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let failure = self
            .injector
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .check(MockOperation::GetJobDetails, job_id);
        if let Some(config) = failure {
            if let Some(delay) = config.delay {
                thread::sleep(delay);
            }
            if config.error_code.is_some() {
                return Err(ServiceError::new(service_code(config.code()), config.message()));
            }
        }

        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(job_id)
            .cloned()
            .ok_or_else(|| ServiceError::job_not_found(job_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> ArtifactCredentials {
        ArtifactCredentials {
            access_key_id: "a".to_string(),
            secret_access_key: "b".to_string(),
            session_token: "c".to_string(),
            expires_at: None,
        }
    }

    #[test]
    fn test_lookup_and_count() {
        let service = MockJobService::new();
        service.insert_job("job-1", vec![], creds());

        assert!(service.get_job_details("job-1").is_ok());
        assert_eq!(
            service.get_job_details("job-2").unwrap_err().code,
            ServiceErrorCode::JobNotFound
        );
        assert_eq!(service.call_count(), 2);
    }

    #[test]
    fn test_injected_error_code() {
        let service = MockJobService::new();
        service.insert_job("job-1", vec![], creds());
        service.inject(FailureConfig::error("ACCESS_DENIED", "no"));

        let err = service.get_job_details("job-1").unwrap_err();
        assert_eq!(err.code, ServiceErrorCode::AccessDenied);
        assert_eq!(err.message, "no");
    }

    #[test]
    fn test_unknown_code_is_internal() {
        assert_eq!(service_code("WHATEVER"), ServiceErrorCode::Internal);
        assert_eq!(service_code("THROTTLED"), ServiceErrorCode::Throttled);
    }
}
