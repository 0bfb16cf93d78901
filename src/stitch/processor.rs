// SYNOID Media Processor - FFmpeg Concat + Audio
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// One FFmpeg run per job: the concat demuxer supplies the video, a second
// input supplies the audio track. The flag set below is the output contract;
// changing it changes every published video, so bump FFMPEG_ARGS_VERSION.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info};

use crate::error::StitchError;

pub const FFMPEG_ARGS_VERSION: &str = "stitch-v1";

const DIAGNOSTIC_TAIL_CHARS: usize = 2000;

/// What happens to the audio already inside the segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioPolicy {
    /// Drop it; the uploaded track is the only audio
    Replace,
    /// Keep it underneath the uploaded track
    Mix {
        original_volume: f32,
        track_volume: f32,
    },
}

#[derive(Debug, Clone)]
pub struct ProcessJob {
    pub manifest: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
}

#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Render `job.output`. Suspends until the tool exits.
    async fn process(&self, job: &ProcessJob) -> Result<(), StitchError>;
}

/// Build the full FFmpeg argument list for a job.
pub fn build_ffmpeg_args(job: &ProcessJob, policy: AudioPolicy) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-y", "-v", "error"]
        .map(OsString::from)
        .to_vec();

    args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsString::from));
    args.push(job.manifest.clone().into_os_string());
    args.push("-i".into());
    args.push(job.audio.clone().into_os_string());

    // Video always comes from the concat stream, and it is not optional:
    // a job without picture fails instead of producing audio-only output.
    match policy {
        AudioPolicy::Replace => {
            args.extend(["-map", "0:v", "-map", "1:a"].map(OsString::from));
        }
        AudioPolicy::Mix {
            original_volume,
            track_volume,
        } => {
            let graph = format!(
                "[0:a]volume={}[orig];[1:a]volume={}[track];[orig][track]amix=inputs=2:duration=shortest[aout]",
                original_volume, track_volume
            );
            args.push("-filter_complex".into());
            args.push(graph.into());
            args.extend(["-map", "0:v", "-map", "[aout]"].map(OsString::from));
        }
    }

    args.extend(
        [
            "-c:v", "libx264",
            "-preset", "fast",
            "-crf", "23",
            "-pix_fmt", "yuv420p",
            "-c:a", "aac",
            "-shortest",
            "-movflags", "+faststart",
        ]
        .map(OsString::from),
    );
    args.push(job.output.clone().into_os_string());
    args
}

/// Last `max` characters of the tool's stderr.
fn diagnostic_tail(stderr: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    text.chars().skip(count - max).collect()
}

pub struct FfmpegProcessor {
    binary: PathBuf,
    timeout: Duration,
    policy: AudioPolicy,
}

impl FfmpegProcessor {
    pub fn new(binary: PathBuf, timeout: Duration, policy: AudioPolicy) -> Self {
        Self {
            binary,
            timeout,
            policy,
        }
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn process(&self, job: &ProcessJob) -> Result<(), StitchError> {
        let args = build_ffmpeg_args(job, self.policy);
        info!(
            "[FFMPEG] Rendering {:?} ({}, {:?})",
            job.output, FFMPEG_ARGS_VERSION, self.policy
        );

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true) // Dropping the future on timeout kills FFmpeg
            .spawn()
            .map_err(|e| StitchError::processing("could not start ffmpeg", e.to_string()))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(StitchError::processing("ffmpeg stream error", e.to_string()));
            }
            Err(_) => {
                error!("[FFMPEG] Timed out after {:?}, process killed", self.timeout);
                return Err(StitchError::processing(
                    format!("ffmpeg timed out after {:?}", self.timeout),
                    "",
                ));
            }
        };

        if !output.status.success() {
            let diagnostics = diagnostic_tail(&output.stderr, DIAGNOSTIC_TAIL_CHARS);
            return Err(StitchError::processing(
                format!("ffmpeg exited with {}", output.status),
                diagnostics,
            ));
        }

        info!("[FFMPEG] Render complete: {:?}", job.output);
        Ok(())
    }
}
