//! Publish task descriptor.
//!
//! A `PublishTask` is a pure input value: everything a publisher needs to
//! know about one build's outputs, with no handles or shared state attached.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::job::ExpectedOutputArtifact;
use crate::{TASK_SCHEMA_ID, TASK_SCHEMA_VERSION};

/// A user-declared output: artifact name and workspace-relative location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifactSpec {
    pub artifact_name: String,
    /// Path relative to the workspace root. Empty means the whole workspace.
    #[serde(default)]
    pub location: String,
}

impl OutputArtifactSpec {
    /// Create a declared output.
    pub fn new(artifact_name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            artifact_name: artifact_name.into(),
            location: location.into(),
        }
    }
}

/// The job a task publishes for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Expected output artifacts in declaration order.
    #[serde(default)]
    pub output_artifacts: Vec<ExpectedOutputArtifact>,
}

/// Serialized task descriptor for one publish call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishTask {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default = "default_schema_id")]
    pub schema_id: String,
    /// Project name, used to name packaged files.
    pub project_name: String,
    pub job: Job,
    /// Declared outputs, in any order.
    #[serde(default)]
    pub outputs: Vec<OutputArtifactSpec>,
}

fn default_schema_version() -> u32 {
    TASK_SCHEMA_VERSION
}

fn default_schema_id() -> String {
    TASK_SCHEMA_ID.to_string()
}

/// Errors for task descriptors
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported task schema {schema_id}@{schema_version}")]
    UnsupportedSchema { schema_id: String, schema_version: u32 },

    #[error("job id must not be empty")]
    EmptyJobId,

    #[error("project name must not be empty")]
    EmptyProjectName,
}

impl PublishTask {
    /// Create a task with the current schema.
    pub fn new(
        project_name: impl Into<String>,
        job: Job,
        outputs: Vec<OutputArtifactSpec>,
    ) -> Self {
        Self {
            schema_version: TASK_SCHEMA_VERSION,
            schema_id: TASK_SCHEMA_ID.to_string(),
            project_name: project_name.into(),
            job,
            outputs,
        }
    }

    /// Parse and validate a task from JSON.
    pub fn from_json(json: &str) -> Result<Self, TaskError> {
        let task: Self = serde_json::from_str(json)?;
        task.validate()?;
        Ok(task)
    }

    /// Load and validate a task from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, TaskError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Check schema and required fields.
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.schema_id != TASK_SCHEMA_ID || self.schema_version != TASK_SCHEMA_VERSION {
            return Err(TaskError::UnsupportedSchema {
                schema_id: self.schema_id.clone(),
                schema_version: self.schema_version,
            });
        }
        if self.job.id.trim().is_empty() {
            return Err(TaskError::EmptyJobId);
        }
        if self.project_name.trim().is_empty() {
            return Err(TaskError::EmptyProjectName);
        }
        Ok(())
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
