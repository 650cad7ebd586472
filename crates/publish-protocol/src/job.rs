//! Job-details payload returned by the job service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an output artifact lives in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLocation {
    /// Bucket (or container) name.
    pub bucket: String,
    /// Object key within the bucket.
    pub object_key: String,
}

impl StoreLocation {
    /// Create a store location.
    pub fn new(bucket: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object_key: object_key.into(),
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.object_key)
    }
}

/// An output artifact the job expects to receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedOutputArtifact {
    /// Artifact name, matched against declared outputs.
    pub name: String,
    /// Destination in the remote store.
    pub location: StoreLocation,
}

impl ExpectedOutputArtifact {
    /// Create an expected output artifact.
    pub fn new(name: impl Into<String>, location: StoreLocation) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }
}

/// Short-lived credentials scoped to the job's artifact store access.
///
/// `Debug` never prints the secret or the session token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    /// Expiry reported by the service, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for ArtifactCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Response of the job service's `get_job_details` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetails {
    pub job_id: String,
    /// Output artifacts in declaration order.
    #[serde(default)]
    pub output_artifacts: Vec<ExpectedOutputArtifact>,
    pub artifact_credentials: ArtifactCredentials,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> ArtifactCredentials {
        ArtifactCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "very-secret".to_string(),
            session_token: "session-token".to_string(),
            expires_at: None,
        }
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let rendered = format!("{:?}", credentials());
        assert!(rendered.contains("AKIDEXAMPLE"));
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("session-token"));
    }

    #[test]
    fn test_job_details_parse_without_artifacts() {
        let json = r#"{
            "job_id": "job-1",
            "artifact_credentials": {
                "access_key_id": "a",
                "secret_access_key": "b",
                "session_token": "c"
            }
        }"#;
        let details: JobDetails = serde_json::from_str(json).unwrap();
        assert!(details.output_artifacts.is_empty());
        assert!(details.artifact_credentials.expires_at.is_none());
    }

    #[test]
    fn test_store_location_display() {
        let location = StoreLocation::new("bucket", "builds/app.zip");
        assert_eq!(location.to_string(), "bucket/builds/app.zip");
    }
}
