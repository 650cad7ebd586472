//! Error types reported by the job-details service and the artifact store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes returned by remote services.
///
/// These codes are stable and used for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceErrorCode {
    /// Caller is not authorized, or its credentials have expired.
    AccessDenied,
    /// The referenced job does not exist.
    JobNotFound,
    /// The job exists but is not in a state that allows the request.
    InvalidJobState,
    /// Request rate exceeded; the caller may retry later.
    Throttled,
    /// The service could not be reached.
    Network,
    /// Malformed request or response.
    InvalidRequest,
    /// Unclassified service-side failure.
    Internal,
}

impl ServiceErrorCode {
    /// Whether this code signals an authorization problem.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AccessDenied)
    }
}

impl fmt::Display for ServiceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessDenied => write!(f, "ACCESS_DENIED"),
            Self::JobNotFound => write!(f, "JOB_NOT_FOUND"),
            Self::InvalidJobState => write!(f, "INVALID_JOB_STATE"),
            Self::Throttled => write!(f, "THROTTLED"),
            Self::Network => write!(f, "NETWORK"),
            Self::InvalidRequest => write!(f, "INVALID_REQUEST"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Service error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    /// Error code from the registry.
    pub code: ServiceErrorCode,
    /// Human-readable, single-line error message.
    /// Must not contain credentials.
    pub message: String,
}

impl ServiceError {
    /// Create a new service error.
    pub fn new(code: ServiceErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create an ACCESS_DENIED error.
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCode::AccessDenied, message)
    }

    /// Create a JOB_NOT_FOUND error.
    pub fn job_not_found(job_id: &str) -> Self {
        Self::new(
            ServiceErrorCode::JobNotFound,
            format!("job '{}' not found", job_id),
        )
    }

    /// Create a NETWORK error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCode::Network, message)
    }

    /// Create an INVALID_REQUEST error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCode::InvalidRequest, message)
    }

    /// Create an INTERNAL error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorCode::Internal, message)
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}
