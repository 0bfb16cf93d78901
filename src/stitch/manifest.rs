// SYNOID Concat Manifest Writer
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Writes the input list for FFmpeg's concat demuxer (`-f concat`).
// One line per segment, in playback order: `file '<absolute_path>'`.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::StitchError;

/// Whether a path can be placed inside a manifest line.
///
/// Quotes are escapable but line breaks are not; intake is stricter and
/// refuses both so stored uploads never need escaping.
pub fn is_embeddable(path: &Path) -> bool {
    !path.to_string_lossy().contains(['\'', '\n', '\r'])
}

/// Quote a path for the concat demuxer. `'` becomes `'\''`.
fn quote(path: &Path) -> Result<String, StitchError> {
    let text = path.to_string_lossy();
    if text.contains(['\n', '\r']) {
        return Err(StitchError::validation(
            "segment path contains a line break",
        ));
    }
    Ok(format!("'{}'", text.replace('\'', r"'\''")))
}

/// Build the manifest contents from ordered segment paths.
pub fn render_manifest(segments: &[PathBuf]) -> Result<String, StitchError> {
    let lines = segments
        .iter()
        .map(|p| quote(p).map(|q| format!("file {}", q)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

/// Write the manifest for one job. The target path must be unique to the job.
pub async fn write_manifest(segments: &[PathBuf], target: &Path) -> Result<(), StitchError> {
    if segments.is_empty() {
        return Err(StitchError::validation("no segments received"));
    }

    let content = render_manifest(segments)?;
    tokio::fs::write(target, content)
        .await
        .map_err(|e| StitchError::processing("could not write concat manifest", e.to_string()))?;

    info!(
        "[MANIFEST] Written ({} segments): {:?}",
        segments.len(),
        target
    );
    Ok(())
}
