//! Publish report (publish_report.json)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use super::outcome::{ArtifactOutcome, OutcomeKind};

/// Schema version for publish_report.json
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for publish_report.json
pub const REPORT_SCHEMA_ID: &str = "artifact-publisher/publish_report@1";

/// Aggregate status of a publish call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Every expected artifact was uploaded
    Success,
    /// At least one artifact was not uploaded
    Failed,
    /// Cancellation stopped at least one artifact
    Cancelled,
}

impl Status {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Status::Success => ExitCode::Success,
            Status::Failed => ExitCode::ArtifactsFailed,
            Status::Cancelled => ExitCode::Cancelled,
        }
    }
}

/// Stable process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitCode {
    /// All artifacts uploaded
    Success = 0,
    /// Configuration or usage error
    Config = 1,
    /// Credential resolution failed
    Credentials = 2,
    /// One or more artifacts not uploaded
    ArtifactsFailed = 3,
    /// Cancelled by signal
    Cancelled = 80,
}

impl ExitCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(ExitCode::Success),
            1 => Some(ExitCode::Config),
            2 => Some(ExitCode::Credentials),
            3 => Some(ExitCode::ArtifactsFailed),
            80 => Some(ExitCode::Cancelled),
            _ => None,
        }
    }
}

/// Number of outcomes per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub uploaded: usize,
    pub no_matching_spec: usize,
    pub compression_failed: usize,
    pub encryption_failed: usize,
    pub upload_failed: usize,
    pub cancelled: usize,
}

impl OutcomeCounts {
    pub fn add(&mut self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Uploaded => self.uploaded += 1,
            OutcomeKind::NoMatchingSpec => self.no_matching_spec += 1,
            OutcomeKind::CompressionFailed => self.compression_failed += 1,
            OutcomeKind::EncryptionFailed => self.encryption_failed += 1,
            OutcomeKind::UploadFailed => self.upload_failed += 1,
            OutcomeKind::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.uploaded
            + self.no_matching_spec
            + self.compression_failed
            + self.encryption_failed
            + self.upload_failed
            + self.cancelled
    }

    /// Outcomes other than `Uploaded`
    pub fn not_uploaded(&self) -> usize {
        self.total() - self.uploaded
    }
}

/// Result of one publish call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReport {
    pub schema_version: u32,
    pub schema_id: String,
    pub publish_id: String,
    pub job_id: String,
    pub project_name: String,
    pub created_at: DateTime<Utc>,
    pub status: Status,
    pub exit_code: i32,
    pub counts: OutcomeCounts,
    /// One entry per expected artifact, in declaration order
    pub outcomes: Vec<ArtifactOutcome>,
    pub duration_ms: u64,
    pub human_summary: String,
}

impl PublishReport {
    /// Aggregate outcomes. `outcomes` must already be in declaration order.
    pub fn from_outcomes(
        publish_id: impl Into<String>,
        job_id: impl Into<String>,
        project_name: impl Into<String>,
        outcomes: Vec<ArtifactOutcome>,
        duration_ms: u64,
    ) -> Self {
        let mut counts = OutcomeCounts::default();
        for outcome in &outcomes {
            counts.add(outcome.kind());
        }

        let status = if counts.cancelled > 0 {
            Status::Cancelled
        } else if counts.not_uploaded() > 0 {
            Status::Failed
        } else {
            Status::Success
        };

        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            schema_id: REPORT_SCHEMA_ID.to_string(),
            publish_id: publish_id.into(),
            job_id: job_id.into(),
            project_name: project_name.into(),
            created_at: Utc::now(),
            status,
            exit_code: status.exit_code().as_i32(),
            counts,
            outcomes,
            duration_ms,
            human_summary: Self::generate_human_summary(status, &counts),
        }
    }

    fn generate_human_summary(status: Status, counts: &OutcomeCounts) -> String {
        let total = counts.total();
        if total == 0 {
            return "No output artifacts expected".to_string();
        }

        let mut details = Vec::new();
        for (n, kind) in [
            (counts.no_matching_spec, OutcomeKind::NoMatchingSpec),
            (counts.compression_failed, OutcomeKind::CompressionFailed),
            (counts.encryption_failed, OutcomeKind::EncryptionFailed),
            (counts.upload_failed, OutcomeKind::UploadFailed),
            (counts.cancelled, OutcomeKind::Cancelled),
        ] {
            if n > 0 {
                details.push(format!("{} {}", n, kind.description()));
            }
        }

        match status {
            Status::Success => format!("Published {}/{} artifacts", counts.uploaded, total),
            Status::Failed => format!(
                "Publish incomplete: {}/{} artifacts uploaded, {}",
                counts.uploaded,
                total,
                details.join(", ")
            ),
            Status::Cancelled => format!(
                "Publish cancelled: {}/{} artifacts uploaded, {}",
                counts.uploaded,
                total,
                details.join(", ")
            ),
        }
    }

    /// Whether every expected artifact was uploaded
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Outcomes that did not end in an upload
    pub fn failures(&self) -> Vec<&ArtifactOutcome> {
        self.outcomes
            .iter()
            .filter(|o| !o.outcome.is_uploaded())
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::PublishOutcome;
    use crate::upload::PutReceipt;
    use publish_protocol::StoreLocation;

    fn outcome(index: usize, name: &str, outcome: PublishOutcome) -> ArtifactOutcome {
        ArtifactOutcome {
            index,
            artifact_name: name.to_string(),
            location: None,
            target: StoreLocation::new("builds", format!("{name}.zip")),
            outcome,
            duration_ms: 1,
        }
    }

    fn uploaded(index: usize, name: &str) -> ArtifactOutcome {
        let receipt = PutReceipt {
            location: StoreLocation::new("builds", format!("{name}.zip")),
            etag: "e".to_string(),
            version_id: None,
            content_length: 10,
            sha256: "00".repeat(32),
            encrypted: false,
        };
        outcome(index, name, PublishOutcome::Uploaded { receipt })
    }

    #[test]
    fn test_all_uploaded() {
        let report = PublishReport::from_outcomes(
            "p1",
            "job-1",
            "demo",
            vec![uploaded(0, "a"), uploaded(1, "b")],
            12,
        );

        assert!(report.is_success());
        assert_eq!(report.exit_code, 0);
        assert_eq!(report.counts.uploaded, 2);
        assert_eq!(report.human_summary, "Published 2/2 artifacts");
        assert!(report.failures().is_empty());
    }

    #[test]
    fn test_unmatched_counts_as_not_uploaded() {
        let report = PublishReport::from_outcomes(
            "p1",
            "job-1",
            "demo",
            vec![uploaded(0, "a"), outcome(1, "b", PublishOutcome::NoMatchingSpec)],
            12,
        );

        assert_eq!(report.status, Status::Failed);
        assert_eq!(report.exit_code, 3);
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].artifact_name, "b");
        assert_eq!(
            report.human_summary,
            "Publish incomplete: 1/2 artifacts uploaded, 1 no matching output"
        );
    }

    #[test]
    fn test_cancelled_takes_precedence() {
        let report = PublishReport::from_outcomes(
            "p1",
            "job-1",
            "demo",
            vec![
                outcome(0, "a", PublishOutcome::CompressionFailed { reason: "x".into() }),
                outcome(1, "b", PublishOutcome::Cancelled),
            ],
            3,
        );

        assert_eq!(report.status, Status::Cancelled);
        assert_eq!(report.exit_code, ExitCode::Cancelled.as_i32());
    }

    #[test]
    fn test_empty_job() {
        let report = PublishReport::from_outcomes("p1", "job-1", "demo", vec![], 0);
        assert!(report.is_success());
        assert_eq!(report.human_summary, "No output artifacts expected");
    }

    #[test]
    fn test_json_round_trip_and_file() {
        let report = PublishReport::from_outcomes("p1", "job-1", "demo", vec![uploaded(0, "a")], 1);
        let parsed = PublishReport::from_json(&report.to_json().unwrap()).unwrap();
        assert_eq!(parsed.schema_id, REPORT_SCHEMA_ID);
        assert_eq!(parsed.outcomes, report.outcomes);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        report.write_to_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_exit_code_round_trip() {
        for code in [0, 1, 2, 3, 80] {
            assert_eq!(ExitCode::from_i32(code).unwrap().as_i32(), code);
        }
        assert!(ExitCode::from_i32(7).is_none());
    }
}
