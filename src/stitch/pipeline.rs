// SYNOID Stitch Pipeline
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// intake -> order -> manifest -> ffmpeg -> publish -> cleanup
//
// Stages of one job run strictly in sequence. Jobs are independent of each
// other: each one owns a JobToken and a janitor, and nothing else is shared
// apart from the publisher.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Multipart;
use tracing::{error, info, warn};

use crate::error::StitchError;
use crate::stitch::intake::{self, SegmentArity};
use crate::stitch::janitor::TempFileJanitor;
use crate::stitch::manifest::write_manifest;
use crate::stitch::processor::{MediaProcessor, ProcessJob};
use crate::stitch::publisher::{ArtifactPublisher, Publication, RequestOrigin};
use crate::stitch::{JobToken, ProcessedArtifact, StitchRequest};

pub struct StitchPipeline {
    temp_dir: PathBuf,
    arity: SegmentArity,
    processor: Arc<dyn MediaProcessor>,
    publisher: Arc<dyn ArtifactPublisher>,
}

impl StitchPipeline {
    pub fn new(
        temp_dir: PathBuf,
        arity: SegmentArity,
        processor: Arc<dyn MediaProcessor>,
        publisher: Arc<dyn ArtifactPublisher>,
    ) -> Self {
        Self {
            temp_dir,
            arity,
            processor,
            publisher,
        }
    }

    /// Run one job end to end. Every scratch file is gone when this returns,
    /// whatever the outcome.
    pub async fn run(
        &self,
        multipart: &mut Multipart,
        origin: &RequestOrigin,
    ) -> Result<Publication, StitchError> {
        let token = JobToken::new();
        let started = Instant::now();
        let mut janitor = TempFileJanitor::new();

        let result = self.execute(multipart, origin, &token, &mut janitor).await;
        janitor.cleanup().await;

        match &result {
            Ok(publication) => info!(
                job = %token,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "[STITCH] Published {}",
                publication.url
            ),
            Err(StitchError::Validation(reason)) => {
                warn!(job = %token, "[STITCH] Rejected: {}", reason)
            }
            Err(StitchError::Processing {
                message,
                diagnostics,
            }) => error!(job = %token, "[STITCH] {} | {}", message, diagnostics),
            Err(e) => error!(job = %token, "[STITCH] {}", e),
        }
        result
    }

    async fn execute(
        &self,
        multipart: &mut Multipart,
        origin: &RequestOrigin,
        token: &JobToken,
        janitor: &mut TempFileJanitor,
    ) -> Result<Publication, StitchError> {
        let files = intake::receive(multipart, &self.temp_dir, token, self.arity, janitor).await?;
        let request = StitchRequest::assemble(files, self.arity)?;
        self.stitch(&request, origin, token, janitor).await
    }

    /// Everything after intake, for a request whose files are already on disk.
    /// New scratch paths are tracked by `janitor`; the caller cleans up.
    pub async fn stitch(
        &self,
        request: &StitchRequest,
        origin: &RequestOrigin,
        token: &JobToken,
        janitor: &mut TempFileJanitor,
    ) -> Result<Publication, StitchError> {
        let manifest = token.scratch_path(&self.temp_dir, "concat.txt");
        janitor.track(&manifest);
        write_manifest(&request.segment_paths(), &manifest).await?;

        let output = token.scratch_path(&self.temp_dir, "stitched.mp4");
        janitor.track(&output);

        let job = ProcessJob {
            manifest,
            audio: request.audio.storage_path.clone(),
            output: output.clone(),
        };
        self.processor.process(&job).await?;

        let artifact = ProcessedArtifact { local_path: output };
        self.publisher.publish(&artifact, origin).await
    }
}
