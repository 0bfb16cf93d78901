// SYNOID Stitch Modules
// Copyright (c) 2026 Xing_The_Creator | SYNOID

pub mod expiry;
pub mod intake;
pub mod janitor;
pub mod manifest;
pub mod orderer;
pub mod pipeline;
pub mod processor;
pub mod publisher;

use std::fmt;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// One multipart file part after it has been written to scratch storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub field_name: String,
    pub storage_path: PathBuf,
    pub size_bytes: u64,
}

/// A validated request: exactly one audio track, segments in playback order.
#[derive(Debug, Clone)]
pub struct StitchRequest {
    pub audio: UploadedFile,
    pub segments: Vec<UploadedFile>,
}

/// The rendered file, still in scratch storage.
#[derive(Debug, Clone)]
pub struct ProcessedArtifact {
    pub local_path: PathBuf,
}

/// Unique per job. Every scratch path a job creates carries it, so
/// concurrent jobs sharing one temp directory never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobToken(String);

impl JobToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// `<dir>/<unix-millis>-<token>-<suffix>`
    pub fn scratch_path(&self, dir: &Path, suffix: &str) -> PathBuf {
        let millis = chrono::Utc::now().timestamp_millis();
        dir.join(format!("{}-{}-{}", millis, self.0, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
