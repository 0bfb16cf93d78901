// SYNOID Stitch Health Checks
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Startup and `doctor` checks for the things a stitch job depends on:
// a runnable FFmpeg and writable scratch/public directories.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::error;

use crate::config::StitchConfig;

/// Result of one dependency check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckStatus {
    Healthy(String),
    Down(String),
}

impl CheckStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, CheckStatus::Healthy(_))
    }
}

/// Run `<ffmpeg> -version` and report its first line.
pub async fn check_ffmpeg(binary: &Path) -> CheckStatus {
    let output = tokio::time::timeout(
        Duration::from_secs(10),
        Command::new(binary)
            .kill_on_drop(true)
            .arg("-version")
            .output(),
    )
    .await;

    match output {
        Ok(Ok(out)) if out.status.success() => {
            let stdout = String::from_utf8_lossy(&out.stdout);
            let first = stdout.lines().next().unwrap_or("ffmpeg").trim().to_string();
            CheckStatus::Healthy(first)
        }
        Ok(Ok(out)) => CheckStatus::Down(format!("{:?} -version exited with {}", binary, out.status)),
        Ok(Err(e)) => CheckStatus::Down(format!("{:?} could not be started: {}", binary, e)),
        Err(_) => CheckStatus::Down(format!("{:?} -version timed out", binary)),
    }
}

/// Can we create and delete a file in `dir`?
pub async fn check_writable(dir: &Path) -> CheckStatus {
    let probe = dir.join(".synoid_stitch_health_check");
    match tokio::fs::write(&probe, b"ok").await {
        Ok(()) => {
            let _ = tokio::fs::remove_file(&probe).await;
            CheckStatus::Healthy(format!("{:?} is writable", dir))
        }
        Err(e) => {
            error!("[HEALTH] Disk write check failed for {:?}: {}", dir, e);
            CheckStatus::Down(format!("{:?} is not writable: {}", dir, e))
        }
    }
}

/// Every check the service needs, labelled.
pub async fn run_checks(config: &StitchConfig) -> Vec<(&'static str, CheckStatus)> {
    let mut checks = vec![
        ("ffmpeg", check_ffmpeg(&config.ffmpeg_path).await),
        ("temp dir", check_writable(&config.temp_dir).await),
    ];
    if config.is_local() {
        checks.push(("public dir", check_writable(&config.public_dir).await));
    }
    checks
}
