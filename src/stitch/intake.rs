// SYNOID Upload Intake
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Streams the multipart parts of a /stitch request to scratch files, then
// validates the set of files as a whole. Later stages only ever see paths.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::StitchError;
use crate::stitch::janitor::TempFileJanitor;
use crate::stitch::manifest::is_embeddable;
use crate::stitch::orderer::{order_segments, segment_index};
use crate::stitch::{JobToken, StitchRequest, UploadedFile};

pub const AUDIO_FIELD: &str = "audio";

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "webm"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a"];

/// How many segments a request must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentArity {
    /// One or more
    Any,
    Exactly(usize),
}

impl SegmentArity {
    /// Fails as soon as `count` segments is already too many.
    pub fn admit(&self, count: usize) -> Result<(), StitchError> {
        match *self {
            SegmentArity::Exactly(n) if count > n => Err(StitchError::validation(format!(
                "expected {} segments, received more",
                n
            ))),
            _ => Ok(()),
        }
    }

    pub fn check(&self, count: usize) -> Result<(), StitchError> {
        if count == 0 {
            return Err(StitchError::validation("no segments received"));
        }
        match *self {
            SegmentArity::Exactly(n) if n != count => Err(StitchError::validation(format!(
                "expected {} segments, received {}",
                n, count
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldRole {
    Audio,
    Segment,
}

fn classify(field_name: &str) -> Result<FieldRole, StitchError> {
    if field_name == AUDIO_FIELD {
        Ok(FieldRole::Audio)
    } else if segment_index(field_name).is_some() {
        Ok(FieldRole::Segment)
    } else {
        Err(StitchError::validation(format!(
            "unexpected file field '{}'",
            field_name
        )))
    }
}

/// Pick the scratch file extension: the client's own if it is a known media
/// type, otherwise a sensible default for the role.
fn storage_extension(role: FieldRole, client_name: Option<&str>) -> &'static str {
    let (allowed, fallback) = match role {
        FieldRole::Audio => (AUDIO_EXTENSIONS, "mp3"),
        FieldRole::Segment => (VIDEO_EXTENSIONS, "mp4"),
    };
    client_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .and_then(|e| allowed.iter().copied().find(|a| *a == e))
        .unwrap_or(fallback)
}

async fn persist_field(mut field: Field<'_>, target: &Path) -> Result<u64, StitchError> {
    let mut file = tokio::fs::File::create(target).await.map_err(|e| {
        StitchError::processing("could not create upload file", e.to_string())
    })?;

    let mut size: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| StitchError::validation(format!("malformed upload: {}", e)))?
    {
        size += chunk.len() as u64;
        file.write_all(&chunk).await.map_err(|e| {
            StitchError::processing("could not write upload file", e.to_string())
        })?;
    }
    file.flush()
        .await
        .map_err(|e| StitchError::processing("could not flush upload file", e.to_string()))?;
    Ok(size)
}

/// Stream every file part of the request into `temp_dir`.
///
/// Each file is tracked by `janitor` before it is created, so an error
/// half-way through still leaves nothing behind. Parts without a file name
/// are plain form fields and are skipped. A segment past a fixed count is
/// rejected before any of it is written.
pub async fn receive(
    multipart: &mut Multipart,
    temp_dir: &Path,
    token: &JobToken,
    arity: SegmentArity,
    janitor: &mut TempFileJanitor,
) -> Result<Vec<UploadedFile>, StitchError> {
    let mut files = Vec::new();
    let mut segment_count = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| StitchError::validation(format!("malformed multipart body: {}", e)))?
    {
        let Some(field_name) = field.name().map(str::to_string) else {
            return Err(StitchError::validation("multipart part without a name"));
        };
        if field.file_name().is_none() {
            debug!("[INTAKE] Skipping form field '{}'", field_name);
            continue;
        }

        let role = classify(&field_name)?;
        if role == FieldRole::Segment {
            segment_count += 1;
            arity.admit(segment_count)?;
        }
        let ext = storage_extension(role, field.file_name());
        let storage_path = token.scratch_path(temp_dir, &format!("{}.{}", field_name, ext));

        janitor.track(&storage_path);
        let size_bytes = persist_field(field, &storage_path).await?;

        debug!(
            "[INTAKE] Stored '{}' ({} bytes) at {:?}",
            field_name, size_bytes, storage_path
        );
        files.push(UploadedFile {
            field_name,
            storage_path,
            size_bytes,
        });
    }

    info!("[INTAKE] Job {} received {} files", token, files.len());
    Ok(files)
}

impl StitchRequest {
    /// Validate a set of stored uploads and put the segments in playback order.
    pub fn assemble(files: Vec<UploadedFile>, arity: SegmentArity) -> Result<Self, StitchError> {
        let mut audio: Option<UploadedFile> = None;
        let mut segments = Vec::new();
        let mut seen = HashSet::new();

        for file in files {
            if !seen.insert(file.field_name.clone()) {
                return Err(StitchError::validation(format!(
                    "field '{}' was sent more than once",
                    file.field_name
                )));
            }
            if file.size_bytes == 0 {
                return Err(StitchError::validation(format!(
                    "field '{}' is empty",
                    file.field_name
                )));
            }
            if !is_embeddable(&file.storage_path) {
                return Err(StitchError::validation(format!(
                    "field '{}' has an unusable storage path",
                    file.field_name
                )));
            }
            match classify(&file.field_name)? {
                FieldRole::Audio => audio = Some(file),
                FieldRole::Segment => segments.push(file),
            }
        }

        let audio = audio.ok_or_else(|| StitchError::validation("missing audio file"))?;
        arity.check(segments.len())?;

        Ok(Self {
            audio,
            segments: order_segments(segments),
        })
    }

    pub fn segment_paths(&self) -> Vec<PathBuf> {
        self.segments
            .iter()
            .map(|s| s.storage_path.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(field: &str) -> UploadedFile {
        UploadedFile {
            field_name: field.to_string(),
            storage_path: PathBuf::from(format!("/tmp/1700000000000-job-{}.bin", field)),
            size_bytes: 128,
        }
    }

    #[test]
    fn test_assemble_orders_segments() {
        let request = StitchRequest::assemble(
            vec![upload("segment_2"), upload("audio"), upload("segment_1")],
            SegmentArity::Any,
        )
        .unwrap();

        assert_eq!(request.audio.field_name, "audio");
        let names: Vec<&str> = request
            .segments
            .iter()
            .map(|s| s.field_name.as_str())
            .collect();
        assert_eq!(names, vec!["segment_1", "segment_2"]);
    }

    #[test]
    fn test_missing_audio_is_rejected() {
        let err = StitchRequest::assemble(vec![upload("segment_1")], SegmentArity::Any).unwrap_err();
        assert!(matches!(err, StitchError::Validation(ref m) if m.contains("audio")));
    }

    #[test]
    fn test_zero_segments_is_rejected() {
        let err = StitchRequest::assemble(vec![upload("audio")], SegmentArity::Any).unwrap_err();
        assert!(matches!(err, StitchError::Validation(ref m) if m.contains("no segments")));
    }

    #[test]
    fn test_fixed_arity() {
        let files = || {
            vec![
                upload("audio"),
                upload("segment_1"),
                upload("segment_2"),
                upload("segment_3"),
            ]
        };
        assert!(StitchRequest::assemble(files(), SegmentArity::Exactly(3)).is_ok());
        let err = StitchRequest::assemble(files(), SegmentArity::Exactly(4)).unwrap_err();
        assert!(matches!(err, StitchError::Validation(ref m) if m.contains("expected 4")));
    }

    #[test]
    fn test_admit_stops_past_fixed_count() {
        assert!(SegmentArity::Any.admit(1000).is_ok());
        assert!(SegmentArity::Exactly(2).admit(2).is_ok());
        let err = SegmentArity::Exactly(2).admit(3).unwrap_err();
        assert!(matches!(err, StitchError::Validation(ref m) if m.contains("received more")));
    }

    #[test]
    fn test_duplicate_and_unknown_fields() {
        let dup = StitchRequest::assemble(
            vec![upload("audio"), upload("audio"), upload("segment_1")],
            SegmentArity::Any,
        );
        assert!(dup.is_err());

        let unknown = StitchRequest::assemble(
            vec![upload("audio"), upload("segment_1"), upload("thumbnail")],
            SegmentArity::Any,
        );
        assert!(unknown.is_err());
    }

    #[test]
    fn test_empty_part_is_rejected() {
        let mut empty = upload("segment_1");
        empty.size_bytes = 0;
        assert!(StitchRequest::assemble(vec![upload("audio"), empty], SegmentArity::Any).is_err());
    }

    #[test]
    fn test_quoted_storage_path_is_rejected() {
        let mut bad = upload("segment_1");
        bad.storage_path = PathBuf::from("/tmp/it's.mp4");
        assert!(StitchRequest::assemble(vec![upload("audio"), bad], SegmentArity::Any).is_err());
    }

    #[test]
    fn test_storage_extension() {
        assert_eq!(storage_extension(FieldRole::Segment, Some("clip.MOV")), "mov");
        assert_eq!(storage_extension(FieldRole::Segment, Some("clip.exe")), "mp4");
        assert_eq!(storage_extension(FieldRole::Segment, None), "mp4");
        assert_eq!(storage_extension(FieldRole::Audio, Some("voice.wav")), "wav");
        assert_eq!(storage_extension(FieldRole::Audio, Some("voice.mp4")), "mp3");
    }
}
