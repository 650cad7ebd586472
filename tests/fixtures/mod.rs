//! Shared fixtures for integration tests
//!
//! - a small build workspace on disk
//! - a job with credentials registered in a `MockJobService`
//! - a `Publisher` wired to mock clients and an in-memory log

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use artifact_publisher::client::StaticClientFactory;
use artifact_publisher::config::PublisherConfig;
use artifact_publisher::log::MemoryLogSink;
use artifact_publisher::mock::{MockArtifactStore, MockJobService};
use artifact_publisher::pipeline::Publisher;
use publish_protocol::{
    ArtifactCredentials, ExpectedOutputArtifact, Job, OutputArtifactSpec, PublishTask,
    StoreLocation,
};
use tempfile::TempDir;

pub const JOB_ID: &str = "job-42";
pub const PROJECT: &str = "demo-app";
pub const BUCKET: &str = "build-outputs";

/// Workspace layout:
///
/// ```text
/// dist/app.js
/// dist/assets/logo.svg
/// reports/junit.xml
/// README.md
/// ```
pub fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("dist/assets")).unwrap();
    fs::create_dir_all(root.join("reports")).unwrap();
    fs::write(root.join("dist/app.js"), "console.log('hi');\n").unwrap();
    fs::write(root.join("dist/assets/logo.svg"), "<svg/>").unwrap();
    fs::write(root.join("reports/junit.xml"), "<testsuites/>").unwrap();
    fs::write(root.join("README.md"), "# demo\n").unwrap();
    dir
}

pub fn credentials() -> ArtifactCredentials {
    ArtifactCredentials {
        access_key_id: "ASIATESTKEY".to_string(),
        secret_access_key: "test-secret".to_string(),
        session_token: "test-session-token".to_string(),
        expires_at: None,
    }
}

pub fn expected(name: &str) -> ExpectedOutputArtifact {
    ExpectedOutputArtifact::new(
        name,
        StoreLocation::new(BUCKET, format!("{}/{}/{}", PROJECT, JOB_ID, name)),
    )
}

pub fn spec(name: &str, location: &str) -> OutputArtifactSpec {
    OutputArtifactSpec::new(name, location)
}

pub fn task(expected: Vec<ExpectedOutputArtifact>, outputs: Vec<OutputArtifactSpec>) -> PublishTask {
    PublishTask::new(
        PROJECT,
        Job {
            id: JOB_ID.to_string(),
            output_artifacts: expected,
        },
        outputs,
    )
}

/// Number of entries directly inside `dir`
pub fn entry_count(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

/// Mock clients plus the log a publisher writes to
pub struct Harness {
    pub service: Arc<MockJobService>,
    pub store: Arc<MockArtifactStore>,
    pub log: Arc<MemoryLogSink>,
}

impl Harness {
    pub fn new() -> Self {
        let service = MockJobService::new();
        service.insert_job(JOB_ID, vec![], credentials());
        Self {
            service: Arc::new(service),
            store: Arc::new(MockArtifactStore::new()),
            log: Arc::new(MemoryLogSink::new()),
        }
    }

    pub fn publisher(&self, config: PublisherConfig) -> Publisher {
        let factory = StaticClientFactory::new(self.service.clone(), self.store.clone());
        Publisher::new(config, Arc::new(factory))
            .unwrap()
            .with_log_sink(self.log.clone())
    }
}
