//! File-backed job-details service
//!
//! Serves `JobDetails` documents from disk: either a directory holding one
//! `<job_id>.json` per job, or a single JSON file describing one job.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use publish_protocol::{JobDetails, ServiceError};

use crate::credentials::JobDetailsService;

/// Job-details service reading JSON documents from the filesystem
#[derive(Debug, Clone)]
pub struct FileJobDetailsService {
    path: PathBuf,
}

impl FileJobDetailsService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn document_path(&self, job_id: &str) -> Result<PathBuf, ServiceError> {
        if self.path.is_dir() {
            if job_id.contains(['/', '\\']) || job_id.starts_with('.') {
                return Err(ServiceError::invalid_request(format!(
                    "job id is not a valid file name: {}",
                    job_id
                )));
            }
            Ok(self.path.join(format!("{}.json", job_id)))
        } else {
            Ok(self.path.clone())
        }
    }
}

impl JobDetailsService for FileJobDetailsService {
    fn get_job_details(&self, job_id: &str) -> Result<JobDetails, ServiceError> {
        let path = self.document_path(job_id)?;

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ServiceError::job_not_found(job_id));
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(ServiceError::access_denied(format!("{}: {}", path.display(), e)));
            }
            Err(e) => return Err(ServiceError::internal(format!("{}: {}", path.display(), e))),
        };

        let details: JobDetails = serde_json::from_str(&contents).map_err(|e| {
            ServiceError::internal(format!("invalid job details in {}: {}", path.display(), e))
        })?;

        if details.job_id != job_id {
            return Err(ServiceError::job_not_found(job_id));
        }

        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use publish_protocol::{ArtifactCredentials, ExpectedOutputArtifact, ServiceErrorCode, StoreLocation};
    use tempfile::TempDir;

    fn details(job_id: &str) -> JobDetails {
        JobDetails {
            job_id: job_id.to_string(),
            output_artifacts: vec![ExpectedOutputArtifact::new(
                "app",
                StoreLocation::new("builds", "app.zip"),
            )],
            artifact_credentials: ArtifactCredentials {
                access_key_id: "AKID".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: "token".to_string(),
                expires_at: None,
            },
        }
    }

    #[test]
    fn test_directory_lookup() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("job-1.json"),
            serde_json::to_string(&details("job-1")).unwrap(),
        )
        .unwrap();

        let service = FileJobDetailsService::new(dir.path());
        let found = service.get_job_details("job-1").unwrap();
        assert_eq!(found.output_artifacts.len(), 1);

        let err = service.get_job_details("job-2").unwrap_err();
        assert_eq!(err.code, ServiceErrorCode::JobNotFound);
    }

    #[test]
    fn test_single_file_lookup() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("details.json");
        fs::write(&file, serde_json::to_string(&details("job-1")).unwrap()).unwrap();

        let service = FileJobDetailsService::new(&file);
        assert!(service.get_job_details("job-1").is_ok());
        assert_eq!(
            service.get_job_details("other").unwrap_err().code,
            ServiceErrorCode::JobNotFound
        );
    }

    #[test]
    fn test_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let service = FileJobDetailsService::new(dir.path());

        let err = service.get_job_details("../secrets").unwrap_err();
        assert_eq!(err.code, ServiceErrorCode::InvalidRequest);
    }

    #[test]
    fn test_malformed_document() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("job-1.json"), "{not json").unwrap();

        let err = FileJobDetailsService::new(dir.path())
            .get_job_details("job-1")
            .unwrap_err();
        assert_eq!(err.code, ServiceErrorCode::Internal);
    }
}
