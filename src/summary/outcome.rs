//! Per-artifact outcomes

use serde::{Deserialize, Serialize};

use publish_protocol::StoreLocation;

use crate::upload::{PutReceipt, UploadFailure};

/// Outcome kind, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Uploaded,
    NoMatchingSpec,
    CompressionFailed,
    EncryptionFailed,
    UploadFailed,
    Cancelled,
}

impl OutcomeKind {
    pub fn description(&self) -> &'static str {
        match self {
            OutcomeKind::Uploaded => "uploaded",
            OutcomeKind::NoMatchingSpec => "no matching output",
            OutcomeKind::CompressionFailed => "compression failed",
            OutcomeKind::EncryptionFailed => "encryption failed",
            OutcomeKind::UploadFailed => "upload failed",
            OutcomeKind::Cancelled => "cancelled",
        }
    }
}

/// What happened to one expected artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishOutcome {
    Uploaded { receipt: PutReceipt },
    NoMatchingSpec,
    CompressionFailed { reason: String },
    EncryptionFailed { reason: String },
    UploadFailed { failure: UploadFailure },
    Cancelled,
}

impl PublishOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            PublishOutcome::Uploaded { .. } => OutcomeKind::Uploaded,
            PublishOutcome::NoMatchingSpec => OutcomeKind::NoMatchingSpec,
            PublishOutcome::CompressionFailed { .. } => OutcomeKind::CompressionFailed,
            PublishOutcome::EncryptionFailed { .. } => OutcomeKind::EncryptionFailed,
            PublishOutcome::UploadFailed { .. } => OutcomeKind::UploadFailed,
            PublishOutcome::Cancelled => OutcomeKind::Cancelled,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, PublishOutcome::Uploaded { .. })
    }

    /// Failure detail, if any
    pub fn reason(&self) -> Option<String> {
        match self {
            PublishOutcome::CompressionFailed { reason }
            | PublishOutcome::EncryptionFailed { reason } => Some(reason.clone()),
            PublishOutcome::UploadFailed { failure } => Some(failure.to_string()),
            PublishOutcome::Uploaded { .. }
            | PublishOutcome::NoMatchingSpec
            | PublishOutcome::Cancelled => None,
        }
    }
}

/// Outcome record for one expected artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactOutcome {
    /// Position in the job's declaration order
    pub index: usize,
    pub artifact_name: String,
    /// Declared workspace location, if matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Destination in the store
    pub target: StoreLocation,
    pub outcome: PublishOutcome,
    pub duration_ms: u64,
}

impl ArtifactOutcome {
    pub fn kind(&self) -> OutcomeKind {
        self.outcome.kind()
    }

    /// One-line description for operator logs
    pub fn describe(&self) -> String {
        match self.outcome.reason() {
            Some(reason) => format!(
                "{}: {} ({})",
                self.artifact_name,
                self.kind().description(),
                reason
            ),
            None => format!("{}: {}", self.artifact_name, self.kind().description()),
        }
    }
}
