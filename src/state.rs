// SYNOID Stitch Shared State
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use std::sync::Arc;

use crate::config::{PublishTarget, StitchConfig};
use crate::error::ConfigError;
use crate::stitch::expiry::ExpiryRegistry;
use crate::stitch::pipeline::StitchPipeline;
use crate::stitch::processor::{FfmpegProcessor, MediaProcessor};
use crate::stitch::publisher::{ArtifactPublisher, LocalPublisher, RemotePublisher};

pub struct StitchState {
    pub pipeline: StitchPipeline,
    /// Present only when publishing locally; enables `/videos/:file`.
    pub registry: Option<Arc<ExpiryRegistry>>,
    pub max_upload_bytes: usize,
}

impl StitchState {
    pub fn new(
        config: &StitchConfig,
        processor: Arc<dyn MediaProcessor>,
        publisher: Arc<dyn ArtifactPublisher>,
        registry: Option<Arc<ExpiryRegistry>>,
    ) -> Self {
        Self {
            pipeline: StitchPipeline::new(
                config.temp_dir.clone(),
                config.arity,
                processor,
                publisher,
            ),
            registry,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Wire the production components for a validated configuration.
    pub fn from_config(config: &StitchConfig) -> Result<Self, ConfigError> {
        let processor = Arc::new(FfmpegProcessor::new(
            config.ffmpeg_path.clone(),
            config.ffmpeg_timeout,
            config.audio_policy,
        ));

        match &config.publish {
            PublishTarget::Local => {
                let registry = Arc::new(ExpiryRegistry::new(config.public_dir.clone()));
                let publisher = Arc::new(LocalPublisher::new(
                    registry.clone(),
                    config.expiration,
                ));
                Ok(Self::new(config, processor, publisher, Some(registry)))
            }
            PublishTarget::Remote(store_config) => {
                let publisher = Arc::new(RemotePublisher::new(
                    store_config.build_store()?,
                    store_config.public_base_url.clone(),
                    store_config.key_prefix.clone(),
                ));
                Ok(Self::new(config, processor, publisher, None))
            }
        }
    }
}
