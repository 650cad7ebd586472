//! Publish pipeline orchestration
//!
//! One `Publisher::publish` call takes a `PublishTask` and a workspace and:
//! - connects clients through the `ClientFactory`
//! - resolves temporary credentials (fatal on error)
//! - matches declared outputs against the job's expected artifacts
//! - runs match → compress → encrypt → upload per artifact
//! - aggregates one outcome per expected artifact into a `PublishReport`
//!
//! A failure inside one artifact chain only ends that chain. Chains run
//! sequentially by default, or on a bounded pool of scoped threads when
//! `max_parallel > 1`; the report is always in declaration order.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use publish_protocol::{ExpectedOutputArtifact, PublishTask, TaskError};
use thiserror::Error;
use ulid::Ulid;

use crate::cancel::CancellationToken;
use crate::client::{ClientFactory, ClientSettings, ConnectError};
use crate::compress::{ArchiveCompressor, CompressionMode, Compressor};
use crate::config::{ConfigError, PublisherConfig};
use crate::credentials::{CredentialError, CredentialResolver, TemporaryCredentials};
use crate::encrypt::{maybe_encrypt, AesGcmEncryptor, EncryptionKey, Encryptor};
use crate::log::{LogSink, NullLogSink};
use crate::matcher::{match_artifacts, MatchEntry};
use crate::state::{PublishState, PublishStateError, PublishStateMachine};
use crate::summary::{ArtifactOutcome, ExitCode, PublishOutcome, PublishReport};
use crate::upload::{UploadContext, Uploader};

/// Errors that end a publish call without a report
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid task: {0}")]
    InvalidTask(#[from] TaskError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("client error: {0}")]
    Connect(#[from] ConnectError),

    #[error("credential resolution failed: {0}")]
    Credentials(#[from] CredentialError),

    #[error("state error: {0}")]
    State(#[from] PublishStateError),
}

impl PublishError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            PublishError::Credentials(_) => ExitCode::Credentials,
            PublishError::InvalidTask(_)
            | PublishError::Config(_)
            | PublishError::Connect(_)
            | PublishError::State(_) => ExitCode::Config,
        }
    }
}

/// Result type for publish operations
pub type PublishResult<T> = Result<T, PublishError>;

/// Publishes declared outputs for one job at a time.
pub struct Publisher {
    config: PublisherConfig,
    clients: Arc<dyn ClientFactory>,
    /// Replaces the per-artifact `ArchiveCompressor` when set
    compressor: Option<Arc<dyn Compressor>>,
    encryptor: Arc<dyn Encryptor>,
    log: Arc<dyn LogSink>,
}

impl Publisher {
    /// Create a publisher. The configuration is validated here, once.
    pub fn new(config: PublisherConfig, clients: Arc<dyn ClientFactory>) -> PublishResult<Self> {
        config.validate()?;

        let mut encryptor = AesGcmEncryptor::new();
        if let Some(dir) = &config.temp_dir {
            encryptor = encryptor.with_temp_dir(dir);
        }

        Ok(Self {
            config,
            clients,
            compressor: None,
            encryptor: Arc::new(encryptor),
            log: Arc::new(NullLogSink),
        })
    }

    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn with_encryptor(mut self, encryptor: Arc<dyn Encryptor>) -> Self {
        self.encryptor = encryptor;
        self
    }

    pub fn with_log_sink(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Publish every expected artifact of `task` from `workspace`.
    ///
    /// Returns `Err` only when the call cannot start: invalid task, client
    /// construction failure or credential resolution failure. Per-artifact
    /// failures are outcomes in the report.
    pub fn publish(
        &self,
        task: &PublishTask,
        workspace: &Path,
        cancel: Option<&CancellationToken>,
    ) -> PublishResult<PublishReport> {
        let mut machine = PublishStateMachine::new();
        let result = self.run(&mut machine, task, workspace, cancel);
        machine.finish();
        result
    }

    fn run(
        &self,
        machine: &mut PublishStateMachine,
        task: &PublishTask,
        workspace: &Path,
        cancel: Option<&CancellationToken>,
    ) -> PublishResult<PublishReport> {
        let started = Instant::now();
        let publish_id = Ulid::new().to_string();

        // Start
        task.validate()?;
        let clients = self
            .clients
            .connect(&ClientSettings::from_config(&self.config))?;

        let resolver = CredentialResolver::new(
            Arc::clone(&clients.job_service),
            self.config.timeouts.credential_limit(),
        );
        let credentials = match resolver.resolve(&task.job.id) {
            Ok(credentials) => Arc::new(credentials),
            Err(e) => {
                self.log.log(&format!(
                    "Failed to resolve artifact credentials for job '{}': {}",
                    task.job.id, e
                ));
                return Err(e.into());
            }
        };
        machine.transition(PublishState::CredentialsReady)?;

        // CredentialsReady
        let plan = match_artifacts(&task.outputs, &task.job.output_artifacts);
        for shadowed in &plan.shadowed {
            self.log.log(&format!(
                "Output artifact '{}' declared more than once; using '{}' instead of '{}'",
                shadowed.artifact_name, shadowed.winning_location, shadowed.replaced_location
            ));
        }
        machine.transition(PublishState::Matching)?;

        // Matching
        let archive = self.archive_compressor();
        let uploader = Uploader::new(Arc::clone(&clients.store), self.config.timeouts.upload_limit());
        let context = UploadContext {
            project_name: task.project_name.clone(),
            job_id: task.job.id.clone(),
            region: self.config.region.clone(),
        };
        let chain = ArtifactChain {
            workspace,
            project_name: &task.project_name,
            compression: self.config.compression,
            custom_compressor: self.compressor.as_deref(),
            archive: &archive,
            encryptor: self.encryptor.as_ref(),
            key: self.config.encryption_key.as_ref(),
            uploader: &uploader,
            context: &context,
            credentials: &credentials,
            cancel,
            log: self.log.as_ref(),
        };

        let workers = self.config.max_parallel.min(plan.len());
        let outcomes = if workers > 1 {
            run_pooled(&chain, &plan.entries, workers)
        } else {
            plan.entries.iter().map(|entry| chain.run(entry)).collect()
        };
        machine.transition(PublishState::Draining)?;

        // Draining
        let report = PublishReport::from_outcomes(
            publish_id,
            &task.job.id,
            &task.project_name,
            outcomes,
            started.elapsed().as_millis() as u64,
        );
        self.log.log(&report.human_summary);
        machine.transition(PublishState::Done)?;

        Ok(report)
    }

    fn archive_compressor(&self) -> ArchiveCompressor {
        let mut compressor = ArchiveCompressor::new()
            .with_excludes(self.config.excludes.clone())
            .with_dereference_symlinks(self.config.dereference_symlinks);
        if let Some(dir) = &self.config.temp_dir {
            compressor = compressor.with_temp_dir(dir);
        }
        compressor
    }
}

/// Temp file prefix for one artifact: `<project>-<artifact>-`
fn temp_prefix(project_name: &str, artifact_name: &str) -> String {
    fn clean(s: &str) -> String {
        s.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
    format!("{}-{}-", clean(project_name), clean(artifact_name))
}

/// Everything one artifact chain needs, borrowed for the duration of a call.
struct ArtifactChain<'a> {
    workspace: &'a Path,
    project_name: &'a str,
    compression: CompressionMode,
    custom_compressor: Option<&'a dyn Compressor>,
    archive: &'a ArchiveCompressor,
    encryptor: &'a dyn Encryptor,
    key: Option<&'a EncryptionKey>,
    uploader: &'a Uploader,
    context: &'a UploadContext,
    credentials: &'a Arc<TemporaryCredentials>,
    cancel: Option<&'a CancellationToken>,
    log: &'a dyn LogSink,
}

impl ArtifactChain<'_> {
    fn run(&self, entry: &MatchEntry) -> ArtifactOutcome {
        let started = Instant::now();
        let outcome = self.outcome_for(entry);
        self.record(entry, outcome, started.elapsed().as_millis() as u64)
    }

    fn record(&self, entry: &MatchEntry, outcome: PublishOutcome, duration_ms: u64) -> ArtifactOutcome {
        ArtifactOutcome {
            index: entry.index(),
            artifact_name: entry.artifact().name.clone(),
            location: entry.location().map(str::to_string),
            target: entry.artifact().location.clone(),
            outcome,
            duration_ms,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|token| token.is_cancelled())
    }

    fn cancelled(&self, artifact: &ExpectedOutputArtifact, stage: &str) -> PublishOutcome {
        self.log.log(&format!(
            "Publish cancelled before {} for output artifact '{}'",
            stage, artifact.name
        ));
        PublishOutcome::Cancelled
    }

    fn outcome_for(&self, entry: &MatchEntry) -> PublishOutcome {
        let artifact = entry.artifact();
        let Some(location) = entry.location() else {
            self.log.log(&format!(
                "No defined output artifact matched the job's output artifact '{}'",
                artifact.name
            ));
            return PublishOutcome::NoMatchingSpec;
        };

        if self.is_cancelled() {
            return self.cancelled(artifact, "compression");
        }

        let compressed = match self.custom_compressor {
            Some(compressor) => compressor.compress(self.workspace, location, self.compression),
            None => self
                .archive
                .clone()
                .with_temp_prefix(temp_prefix(self.project_name, &artifact.name))
                .compress(self.workspace, location, self.compression),
        };
        let packaged = match compressed {
            Ok(file) => file,
            Err(e) => {
                self.log.log(&format!(
                    "Failed to compress file and upload file: {}: {}",
                    artifact.name, e
                ));
                return PublishOutcome::CompressionFailed {
                    reason: e.to_string(),
                };
            }
        };

        if self.is_cancelled() {
            return self.cancelled(artifact, "encryption");
        }

        let packaged = match maybe_encrypt(self.encryptor, packaged, self.key) {
            Ok(file) => file,
            Err(e) => {
                self.log.log(&format!(
                    "Failed to encrypt output artifact '{}': {}",
                    artifact.name, e
                ));
                return PublishOutcome::EncryptionFailed {
                    reason: e.to_string(),
                };
            }
        };

        if self.is_cancelled() {
            return self.cancelled(artifact, "upload");
        }

        match self
            .uploader
            .upload(packaged, artifact, self.context, self.credentials)
        {
            Ok(receipt) => {
                self.log.log(&format!(
                    "Uploaded output artifact '{}' to {} ({} bytes)",
                    artifact.name, receipt.location, receipt.content_length
                ));
                PublishOutcome::Uploaded { receipt }
            }
            Err(failure) => {
                self.log.log(&format!(
                    "Failed to upload output artifact '{}': {}",
                    artifact.name, failure
                ));
                PublishOutcome::UploadFailed { failure }
            }
        }
    }
}

/// Run chains on `workers` scoped threads pulling from a shared index.
fn run_pooled(chain: &ArtifactChain<'_>, entries: &[MatchEntry], workers: usize) -> Vec<ArtifactOutcome> {
    let next = AtomicUsize::new(0);
    let slots: Vec<Mutex<Option<ArtifactOutcome>>> = entries.iter().map(|_| Mutex::new(None)).collect();

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(entry) = entries.get(index) else {
                    break;
                };
                let outcome = chain.run(entry);
                *slots[index].lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome);
            });
        }
    });

    // The scope re-raises worker panics, so every slot is filled here.
    slots
        .into_iter()
        .filter_map(|slot| slot.into_inner().unwrap_or_else(|e| e.into_inner()))
        .collect()
}
