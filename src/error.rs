// SYNOID Stitch Error Taxonomy
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Every way a stitch job or an artifact fetch can fail.
///
/// Variants map one-to-one onto HTTP statuses. Internal diagnostics
/// (ffmpeg stderr, object store messages) are logged, never returned.
#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    #[error("{0}")]
    Validation(String),
    #[error("processing failed: {message}")]
    Processing { message: String, diagnostics: String },
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("file not found")]
    NotFound,
    #[error("link expired")]
    Gone,
}

impl StitchError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn processing(message: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Processing { .. } | Self::Publish(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Gone => StatusCode::GONE,
        }
    }

    /// Message safe to hand to the client.
    pub fn public_message(&self) -> String {
        match self {
            Self::Processing { .. } | Self::Publish(_) => "stitch failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for StitchError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}

/// Startup-time configuration problems. Fatal, never per-request.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("incomplete object store configuration: missing {0}")]
    IncompleteObjectStore(String),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("object store setup failed: {0}")]
    ObjectStore(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(StitchError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            StitchError::processing("exit 1", "boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            StitchError::Publish("s3 down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(StitchError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(StitchError::Gone.status(), StatusCode::GONE);
    }

    #[test]
    fn test_diagnostics_not_leaked() {
        let err = StitchError::processing("ffmpeg exited with 1", "/tmp/secret: Invalid data");
        assert_eq!(err.public_message(), "stitch failed");

        let err = StitchError::Publish("bucket credentials rejected".into());
        assert!(!err.public_message().contains("credentials"));

        let err = StitchError::validation("missing audio file");
        assert_eq!(err.public_message(), "missing audio file");
    }
}
