// SYNOID Artifact Publisher
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Makes a rendered video reachable, either from our own /videos route with a
// TTL or from an object store under a permanent public link. Both publishers
// leave the scratch artifact for the job's janitor to delete.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use chrono::Utc;
use object_store::path::Path as StorePath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StitchError;
use crate::stitch::expiry::{ExpiryRegistry, PUBLISHED_EXTENSION, PUBLISHED_PREFIX};
use crate::stitch::ProcessedArtifact;

pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";
pub const SERVE_PATH: &str = "/videos";

/// Scheme and host the client used to reach us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    /// Honour reverse-proxy headers first, then `Host`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let first_value = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let scheme = first_value("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
        let host = first_value("x-forwarded-host")
            .or_else(|| first_value(header::HOST.as_str()))
            .unwrap_or_else(|| "localhost".to_string());

        Self { scheme, host }
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

/// What the client gets back on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub url: String,
    pub expires_in_minutes: Option<u64>,
}

#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    async fn publish(
        &self,
        artifact: &ProcessedArtifact,
        origin: &RequestOrigin,
    ) -> Result<Publication, StitchError>;
}

fn fresh_stem() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &token[..12])
}

/// Move a file, falling back to copy + delete across filesystems.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            warn!(
                "[PUBLISH] rename failed ({}), copying {:?} instead",
                rename_err, from
            );
            if let Err(e) = tokio::fs::copy(from, to).await {
                let _ = tokio::fs::remove_file(to).await;
                return Err(e);
            }
            tokio::fs::remove_file(from).await
        }
    }
}

/// Serves from the public directory; every file carries an expiry.
pub struct LocalPublisher {
    registry: Arc<ExpiryRegistry>,
    ttl: chrono::Duration,
}

impl LocalPublisher {
    pub fn new(registry: Arc<ExpiryRegistry>, ttl: chrono::Duration) -> Self {
        Self { registry, ttl }
    }
}

#[async_trait]
impl ArtifactPublisher for LocalPublisher {
    async fn publish(
        &self,
        artifact: &ProcessedArtifact,
        origin: &RequestOrigin,
    ) -> Result<Publication, StitchError> {
        let file_name = format!(
            "{}{}.{}",
            PUBLISHED_PREFIX,
            fresh_stem(),
            PUBLISHED_EXTENSION
        );
        let target = self.registry.dir().join(&file_name);
        let expires_at = Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| StitchError::Publish(format!("expiry {} is out of range", self.ttl)))?;
        let ttl_minutes = u64::try_from(self.ttl.num_minutes()).ok();

        move_file(&artifact.local_path, &target)
            .await
            .map_err(|e| StitchError::Publish(format!("could not move artifact: {}", e)))?;

        self.registry.register(&file_name, expires_at);

        let url = format!("{}{}/{}", origin.base_url(), SERVE_PATH, file_name);
        info!("[PUBLISH] Serving {} until {}", file_name, expires_at);

        Ok(Publication {
            url,
            expires_in_minutes: ttl_minutes,
        })
    }
}

/// Uploads to an object store. Links are permanent; lifetime is the store's concern.
pub struct RemotePublisher {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
    key_prefix: String,
}

impl RemotePublisher {
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: String, key_prefix: String) -> Self {
        Self {
            store,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            key_prefix: key_prefix.trim_matches('/').to_string(),
        }
    }

    fn fresh_key(&self) -> String {
        let name = format!("{}.{}", fresh_stem(), PUBLISHED_EXTENSION);
        if self.key_prefix.is_empty() {
            name
        } else {
            format!("{}/{}", self.key_prefix, name)
        }
    }
}

#[async_trait]
impl ArtifactPublisher for RemotePublisher {
    async fn publish(
        &self,
        artifact: &ProcessedArtifact,
        _origin: &RequestOrigin,
    ) -> Result<Publication, StitchError> {
        let bytes = tokio::fs::read(&artifact.local_path)
            .await
            .map_err(|e| StitchError::Publish(format!("could not read artifact: {}", e)))?;
        let size = bytes.len();

        let key = self.fresh_key();
        let options = PutOptions {
            attributes: Attributes::from_iter([(Attribute::ContentType, VIDEO_CONTENT_TYPE)]),
            ..Default::default()
        };

        self.store
            .put_opts(&StorePath::from(key.as_str()), PutPayload::from(bytes), options)
            .await
            .map_err(|e| StitchError::Publish(format!("upload of {} failed: {}", key, e)))?;

        info!("[PUBLISH] Uploaded {} ({} bytes)", key, size);
        Ok(Publication {
            url: format!("{}/{}", self.public_base_url, key),
            expires_in_minutes: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use object_store::memory::InMemory;

    fn origin() -> RequestOrigin {
        RequestOrigin {
            scheme: "https".into(),
            host: "stitch.example.com".into(),
        }
    }

    #[test]
    fn test_origin_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:3000"));
        assert_eq!(
            RequestOrigin::from_headers(&headers).base_url(),
            "http://internal:3000"
        );

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("stitch.example.com"));
        assert_eq!(
            RequestOrigin::from_headers(&headers).base_url(),
            "https://stitch.example.com"
        );
    }

    #[tokio::test]
    async fn test_local_publish_moves_and_registers() {
        let scratch = tempfile::tempdir().unwrap();
        let public = tempfile::tempdir().unwrap();
        let rendered = scratch.path().join("1-abc-stitched.mp4");
        std::fs::write(&rendered, b"rendered").unwrap();

        let registry = Arc::new(ExpiryRegistry::new(public.path().to_path_buf()));
        let publisher = LocalPublisher::new(registry.clone(), chrono::Duration::minutes(30));
        let artifact = ProcessedArtifact {
            local_path: rendered.clone(),
        };

        let publication = publisher.publish(&artifact, &origin()).await.unwrap();

        assert_eq!(publication.expires_in_minutes, Some(30));
        let prefix = "https://stitch.example.com/videos/video-";
        assert!(publication.url.starts_with(prefix));
        let file_name = publication.url.rsplit('/').next().unwrap();
        assert!(public.path().join(file_name).exists());
        assert!(!rendered.exists());

        let expires_at = registry.expires_at(file_name).unwrap();
        let remaining = expires_at - Utc::now();
        assert!(remaining > chrono::Duration::minutes(29));
        assert!(remaining <= chrono::Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_local_publish_failure_is_publish_error() {
        let public = tempfile::tempdir().unwrap();
        let registry = Arc::new(ExpiryRegistry::new(public.path().to_path_buf()));
        let publisher = LocalPublisher::new(registry.clone(), chrono::Duration::minutes(30));
        let artifact = ProcessedArtifact {
            local_path: public.path().join("never-rendered.mp4"),
        };

        let err = publisher.publish(&artifact, &origin()).await.unwrap_err();
        assert!(matches!(err, StitchError::Publish(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unrepresentable_expiry_is_publish_error() {
        let scratch = tempfile::tempdir().unwrap();
        let public = tempfile::tempdir().unwrap();
        let rendered = scratch.path().join("1-abc-stitched.mp4");
        std::fs::write(&rendered, b"rendered").unwrap();

        let registry = Arc::new(ExpiryRegistry::new(public.path().to_path_buf()));
        // Past the last date chrono can represent.
        let ttl = chrono::Duration::try_days(100_000_000).unwrap();
        let publisher = LocalPublisher::new(registry.clone(), ttl);
        let artifact = ProcessedArtifact {
            local_path: rendered.clone(),
        };

        let err = publisher.publish(&artifact, &origin()).await.unwrap_err();
        assert!(matches!(err, StitchError::Publish(_)));
        assert!(registry.is_empty());
        assert!(rendered.exists());
        assert_eq!(std::fs::read_dir(public.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_remote_publish_uploads_with_content_type() {
        let scratch = tempfile::tempdir().unwrap();
        let rendered = scratch.path().join("1-abc-stitched.mp4");
        std::fs::write(&rendered, b"rendered-bytes").unwrap();

        let store = Arc::new(InMemory::new());
        let publisher = RemotePublisher::new(
            store.clone(),
            "https://cdn.example.com/clips/".into(),
            "/videos/".into(),
        );
        let artifact = ProcessedArtifact {
            local_path: rendered,
        };

        let publication = publisher.publish(&artifact, &origin()).await.unwrap();

        assert!(publication.url.starts_with("https://cdn.example.com/clips/videos/"));
        assert_eq!(publication.expires_in_minutes, None);

        let key = publication
            .url
            .strip_prefix("https://cdn.example.com/clips/")
            .unwrap();
        let stored = store.get(&StorePath::from(key)).await.unwrap();
        assert_eq!(
            stored.attributes.get(&Attribute::ContentType).map(AsRef::<str>::as_ref),
            Some(VIDEO_CONTENT_TYPE)
        );
        assert_eq!(stored.bytes().await.unwrap().as_ref(), b"rendered-bytes");
    }

    #[tokio::test]
    async fn test_remote_keys_are_fresh() {
        let publisher = RemotePublisher::new(
            Arc::new(InMemory::new()),
            "https://cdn.example.com".into(),
            "videos".into(),
        );
        assert_ne!(publisher.fresh_key(), publisher.fresh_key());
    }
}
