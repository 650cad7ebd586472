//! Publish Protocol Types
//!
//! Defines the serializable task descriptor handed to a publisher and the
//! job-details payload returned by the job service.

pub mod error;
pub mod job;
pub mod task;

pub use error::{ServiceError, ServiceErrorCode};
pub use job::{ArtifactCredentials, ExpectedOutputArtifact, JobDetails, StoreLocation};
pub use task::{Job, OutputArtifactSpec, PublishTask, TaskError};

/// Schema version of the publish task descriptor.
pub const TASK_SCHEMA_VERSION: u32 = 1;

/// Schema identifier of the publish task descriptor.
pub const TASK_SCHEMA_ID: &str = "artifact-publisher/task@1";
