//! Outcome records and the publish report

mod outcome;
mod report;

pub use outcome::{ArtifactOutcome, OutcomeKind, PublishOutcome};
pub use report::{
    ExitCode, OutcomeCounts, PublishReport, Status, REPORT_SCHEMA_ID, REPORT_SCHEMA_VERSION,
};
