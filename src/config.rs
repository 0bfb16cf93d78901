// SYNOID Stitch Configuration
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Every option is a CLI flag with an environment fallback. Validation happens
// once at startup: a bad or partial configuration never reaches a request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, ValueEnum};
use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;

use crate::error::ConfigError;
use crate::stitch::intake::SegmentArity;
use crate::stitch::processor::AudioPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AudioMode {
    /// Use the uploaded track as the only audio
    Replace,
    /// Blend the uploaded track over the segments' own audio
    Mix,
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Directory published videos are served from
    #[arg(long, env = "PUBLIC_DIR", default_value = "/tmp/public")]
    pub public_dir: PathBuf,

    /// Scratch directory for uploads, manifests and intermediate renders
    #[arg(long, env = "STITCH_TEMP_DIR", default_value = "/tmp")]
    pub temp_dir: PathBuf,

    /// Lifetime of a locally published video
    #[arg(long, env = "EXPIRATION_MINUTES", default_value_t = 30)]
    pub expiration_minutes: u64,

    /// How often expired videos are swept from disk
    #[arg(long, env = "SWEEP_INTERVAL_MINUTES", default_value_t = 5)]
    pub sweep_interval_minutes: u64,

    /// Require exactly this many segments (any non-empty count if unset)
    #[arg(long, env = "SEGMENT_COUNT")]
    pub segment_count: Option<usize>,

    #[arg(long, env = "AUDIO_MODE", value_enum, default_value_t = AudioMode::Replace)]
    pub audio_mode: AudioMode,

    /// Volume of the segments' embedded audio in mix mode
    #[arg(long, env = "ORIGINAL_VOLUME", default_value_t = 0.1)]
    pub original_volume: f32,

    /// Volume of the uploaded track in mix mode
    #[arg(long, env = "TRACK_VOLUME", default_value_t = 0.4)]
    pub track_volume: f32,

    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: PathBuf,

    /// Hard limit on a single ffmpeg run
    #[arg(long, env = "FFMPEG_TIMEOUT_SECS", default_value_t = 600)]
    pub ffmpeg_timeout_secs: u64,

    /// Maximum size of one /stitch request body
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 512)]
    pub max_upload_mb: usize,

    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    #[arg(long, env = "S3_REGION", default_value = "auto")]
    pub s3_region: String,

    #[arg(long, env = "S3_ACCESS_KEY_ID")]
    pub s3_access_key_id: Option<String>,

    #[arg(long, env = "S3_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub s3_secret_access_key: Option<String>,

    /// Base of returned links (defaults to <endpoint>/<bucket>)
    #[arg(long, env = "S3_PUBLIC_BASE_URL")]
    pub s3_public_base_url: Option<String>,

    #[arg(long, env = "S3_KEY_PREFIX", default_value = "videos")]
    pub s3_key_prefix: String,
}

#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub public_base_url: String,
    pub key_prefix: String,
}

impl ObjectStoreConfig {
    pub fn build_store(&self) -> Result<Arc<dyn ObjectStore>, ConfigError> {
        let store = AmazonS3Builder::new()
            .with_bucket_name(&self.bucket)
            .with_endpoint(&self.endpoint)
            .with_region(&self.region)
            .with_access_key_id(&self.access_key_id)
            .with_secret_access_key(&self.secret_access_key)
            .with_allow_http(self.endpoint.starts_with("http://"))
            .build()
            .map_err(|e| ConfigError::ObjectStore(e.to_string()))?;
        Ok(Arc::new(store))
    }
}

#[derive(Debug, Clone)]
pub enum PublishTarget {
    Local,
    Remote(ObjectStoreConfig),
}

#[derive(Debug, Clone)]
pub struct StitchConfig {
    pub port: u16,
    pub public_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub expiration: chrono::Duration,
    pub sweep_interval: Duration,
    pub arity: SegmentArity,
    pub audio_policy: AudioPolicy,
    pub ffmpeg_path: PathBuf,
    pub ffmpeg_timeout: Duration,
    pub max_upload_bytes: usize,
    pub publish: PublishTarget,
}

impl StitchConfig {
    pub fn from_args(args: ServeArgs) -> Result<Self, ConfigError> {
        non_zero("expiration-minutes", args.expiration_minutes)?;
        non_zero("sweep-interval-minutes", args.sweep_interval_minutes)?;
        non_zero("ffmpeg-timeout-secs", args.ffmpeg_timeout_secs)?;
        non_zero("max-upload-mb", args.max_upload_mb as u64)?;

        let arity = match args.segment_count {
            None => SegmentArity::Any,
            Some(0) => {
                return Err(ConfigError::Invalid {
                    field: "segment-count",
                    reason: "must be at least 1".into(),
                })
            }
            Some(n) => SegmentArity::Exactly(n),
        };

        let audio_policy = match args.audio_mode {
            AudioMode::Replace => AudioPolicy::Replace,
            AudioMode::Mix => {
                check_volume("original-volume", args.original_volume)?;
                check_volume("track-volume", args.track_volume)?;
                AudioPolicy::Mix {
                    original_volume: args.original_volume,
                    track_volume: args.track_volume,
                }
            }
        };

        let expiration = ttl_from_minutes("expiration-minutes", args.expiration_minutes)?;
        let sweep_secs = checked_product("sweep-interval-minutes", args.sweep_interval_minutes, 60)?;
        let upload_mb = args.max_upload_mb as u64;
        let max_upload_bytes = usize::try_from(checked_product("max-upload-mb", upload_mb, 1024 * 1024)?)
            .map_err(|_| out_of_range("max-upload-mb", upload_mb))?;

        let publish = object_store_target(&args)?;

        Ok(Self {
            port: args.port,
            public_dir: scratch_dir("public-dir", &args.public_dir)?,
            temp_dir: scratch_dir("temp-dir", &args.temp_dir)?,
            expiration,
            sweep_interval: Duration::from_secs(sweep_secs),
            arity,
            audio_policy,
            ffmpeg_path: args.ffmpeg_path,
            ffmpeg_timeout: Duration::from_secs(args.ffmpeg_timeout_secs),
            max_upload_bytes,
            publish,
        })
    }

    /// Local-serving configuration with every other option at its default.
    pub fn local(public_dir: PathBuf, temp_dir: PathBuf) -> Self {
        Self {
            port: 3000,
            public_dir,
            temp_dir,
            expiration: chrono::Duration::minutes(30),
            sweep_interval: Duration::from_secs(5 * 60),
            arity: SegmentArity::Any,
            audio_policy: AudioPolicy::Replace,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffmpeg_timeout: Duration::from_secs(600),
            max_upload_bytes: 512 * 1024 * 1024,
            publish: PublishTarget::Local,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.publish, PublishTarget::Local)
    }
}

fn non_zero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}

fn out_of_range(field: &'static str, value: u64) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: format!("{} is out of range", value),
    }
}

fn checked_product(field: &'static str, value: u64, unit: u64) -> Result<u64, ConfigError> {
    value
        .checked_mul(unit)
        .ok_or_else(|| out_of_range(field, value))
}

/// Minutes as a TTL that can still be added to the current time.
fn ttl_from_minutes(field: &'static str, minutes: u64) -> Result<chrono::Duration, ConfigError> {
    let ttl = i64::try_from(minutes)
        .ok()
        .and_then(chrono::Duration::try_minutes)
        .ok_or_else(|| out_of_range(field, minutes))?;
    Utc::now()
        .checked_add_signed(ttl)
        .map(|_| ttl)
        .ok_or_else(|| out_of_range(field, minutes))
}

fn check_volume(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=10.0).contains(&value) {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{} is outside 0.0..=10.0", value),
        });
    }
    Ok(())
}

/// Make a directory absolute and make sure it can be embedded in a concat manifest.
fn scratch_dir(field: &'static str, dir: &Path) -> Result<PathBuf, ConfigError> {
    let abs = std::path::absolute(dir)?;
    let text = abs.to_string_lossy();
    if text.contains(['\'', '\n', '\r']) {
        return Err(ConfigError::Invalid {
            field,
            reason: "path must not contain quotes or line breaks".into(),
        });
    }
    Ok(abs)
}

fn object_store_target(args: &ServeArgs) -> Result<PublishTarget, ConfigError> {
    let required = [
        ("s3-bucket", &args.s3_bucket),
        ("s3-endpoint", &args.s3_endpoint),
        ("s3-access-key-id", &args.s3_access_key_id),
        ("s3-secret-access-key", &args.s3_secret_access_key),
    ];

    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| *name)
        .collect();

    if missing.len() == required.len() {
        return Ok(PublishTarget::Local);
    }
    if !missing.is_empty() {
        return Err(ConfigError::IncompleteObjectStore(missing.join(", ")));
    }

    let bucket = args.s3_bucket.clone().unwrap_or_default();
    let endpoint = args.s3_endpoint.clone().unwrap_or_default();
    let public_base_url = args
        .s3_public_base_url
        .clone()
        .unwrap_or_else(|| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));

    Ok(PublishTarget::Remote(ObjectStoreConfig {
        bucket,
        endpoint,
        region: args.s3_region.clone(),
        access_key_id: args.s3_access_key_id.clone().unwrap_or_default(),
        secret_access_key: args.s3_secret_access_key.clone().unwrap_or_default(),
        public_base_url: public_base_url.trim_end_matches('/').to_string(),
        key_prefix: args.s3_key_prefix.trim_matches('/').to_string(),
    }))
}
