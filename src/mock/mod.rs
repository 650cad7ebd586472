//! Test doubles
//!
//! In-process implementations of the pipeline's collaborators, each with
//! failure injection:
//!
//! - `MockJobService`: job details from an in-memory map
//! - `MockArtifactStore`: records puts and peak concurrency
//! - `MockCompressor` / `MockEncryptor`: wrap the real stages and record calls

mod failure;
mod job_service;
mod stages;
mod store;

pub use failure::{FailureConfig, FailureInjector, MockOperation};
pub use job_service::MockJobService;
pub use stages::{MockCompressor, MockEncryptor};
pub use store::{MockArtifactStore, RecordedPut};
