use serde::Deserialize;
use tracing::warn;

use crate::config::env::{self, EnvKey};
use crate::pipeline::ladder::{default_ladder, RenditionTier};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub amqp_url: String,
    pub minio_url: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    /// Base URL clients use to fetch artifacts (defaults to the MinIO endpoint).
    pub public_media_url: String,
    pub pipeline: PipelineConfig,
}

/// Tunables for the ingest/transcode pipeline. Nothing in the pipeline
/// modules hard-codes these; they all flow in from here.
#[derive(Clone, Debug, Deserialize)]
pub struct PipelineConfig {
    pub max_upload_bytes: u64,
    pub worker_concurrency: u32,
    pub job_timeout_secs: u64,
    pub lease_secs: u64,
    pub retry_limit: i32,
    pub retry_backoff_secs: u64,
    pub thumbnail_interval_secs: u32,
    pub segment_secs: u32,
    pub ladder: Vec<RenditionTier>,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            redis_url: env::get(EnvKey::RedisUrl)?,
            amqp_url: env::get(EnvKey::AmqpUrl)?,
            minio_url: env::get(EnvKey::MinioUrl)?,
            minio_bucket: env::get(EnvKey::MinioBucket)?,
            minio_access_key: env::get(EnvKey::MinioAccessKey)?,
            minio_secret_key: env::get(EnvKey::MinioSecretKey)?,
            public_media_url: env::get(EnvKey::PublicMediaUrl)
                .unwrap_or_else(|_| env::get_or(EnvKey::MinioUrl, "")),
            pipeline: PipelineConfig::from_env(),
        })
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            // 10 GiB
            max_upload_bytes: env::get_parsed(EnvKey::MaxUploadBytes, 10 * 1024 * 1024 * 1024),
            worker_concurrency: env::get_parsed(EnvKey::WorkerConcurrency, 2),
            job_timeout_secs: env::get_parsed(EnvKey::JobTimeoutSecs, 4 * 3600),
            lease_secs: env::get_parsed(EnvKey::LeaseSecs, 60),
            retry_limit: env::get_parsed(EnvKey::RetryLimit, 3),
            retry_backoff_secs: env::get_parsed(EnvKey::RetryBackoffSecs, 30),
            thumbnail_interval_secs: env::get_parsed(EnvKey::ThumbnailIntervalSecs, 10),
            segment_secs: env::get_parsed(EnvKey::SegmentSecs, 10),
            ladder: Self::ladder_from_env(),
        }
    }

    fn ladder_from_env() -> Vec<RenditionTier> {
        match env::get(EnvKey::RenditionLadder) {
            Ok(raw) => match serde_json::from_str::<Vec<RenditionTier>>(&raw) {
                Ok(ladder) if !ladder.is_empty() => ladder,
                Ok(_) => {
                    warn!("RENDITION_LADDER is empty, falling back to default ladder");
                    default_ladder()
                }
                Err(e) => {
                    warn!("Failed to parse RENDITION_LADDER ({}), falling back to default ladder", e);
                    default_ladder()
                }
            },
            Err(_) => default_ladder(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pipeline_config_has_full_ladder() {
        let config = PipelineConfig::from_env();
        assert!(config.worker_concurrency >= 1);
        assert!(config.retry_limit >= 1);
        assert!(!config.ladder.is_empty());
    }
}
