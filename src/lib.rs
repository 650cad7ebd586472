//! Artifact Publisher - publish declared build outputs to an artifact store
//!
//! Given a build workspace and a set of declared `name → location` outputs,
//! this crate resolves short-lived upload credentials for the job, matches the
//! declarations against the job's expected output artifacts, packages each
//! matched location, optionally encrypts it and uploads it. Every expected
//! artifact gets exactly one outcome; only credential resolution is fatal.

pub mod cancel;
pub mod client;
pub mod compress;
pub mod config;
pub mod credentials;
pub mod encrypt;
pub mod log;
pub mod matcher;
pub mod mock;
pub mod pipeline;
pub mod service;
pub mod signal;
pub mod state;
pub mod store;
pub mod summary;
pub mod timeout;
pub mod upload;

pub use cancel::CancellationToken;
pub use client::{ClientFactory, ClientSettings, Clients, LocalClientFactory, StaticClientFactory};
pub use compress::{ArchiveCompressor, CompressError, CompressionMode, Compressor, PackagedFile};
pub use config::{EffectiveConfig, PublisherConfig};
pub use credentials::{CredentialError, CredentialResolver, JobDetailsService, TemporaryCredentials};
pub use encrypt::{AesGcmEncryptor, EncryptError, EncryptionKey, Encryptor};
pub use log::{LogSink, MemoryLogSink, StderrLogSink};
pub use matcher::{match_artifacts, MatchEntry, MatchPlan};
pub use pipeline::{PublishError, Publisher};
pub use summary::{ArtifactOutcome, ExitCode, PublishOutcome, PublishReport, Status};
pub use upload::{ArtifactStore, PutReceipt, PutRequest, StoreError, UploadFailure};

pub use publish_protocol::{
    ExpectedOutputArtifact, Job, OutputArtifactSpec, PublishTask, StoreLocation,
};
