use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    DatabaseUrl,
    RedisUrl,
    AmqpUrl,
    MinioUrl,
    MinioBucket,
    MinioAccessKey,
    MinioSecretKey,
    PublicMediaUrl,
    MaxUploadBytes,
    WorkerConcurrency,
    JobTimeoutSecs,
    LeaseSecs,
    RetryLimit,
    RetryBackoffSecs,
    ThumbnailIntervalSecs,
    SegmentSecs,
    RenditionLadder,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::AmqpUrl => "AMQP_URL",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioBucket => "MINIO_BUCKET_VIDEOS",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::PublicMediaUrl => "PUBLIC_MEDIA_URL",
            EnvKey::MaxUploadBytes => "MAX_UPLOAD_BYTES",
            EnvKey::WorkerConcurrency => "WORKER_CONCURRENCY",
            EnvKey::JobTimeoutSecs => "JOB_TIMEOUT_SECS",
            EnvKey::LeaseSecs => "JOB_LEASE_SECS",
            EnvKey::RetryLimit => "JOB_RETRY_LIMIT",
            EnvKey::RetryBackoffSecs => "JOB_RETRY_BACKOFF_SECS",
            EnvKey::ThumbnailIntervalSecs => "THUMBNAIL_INTERVAL_SECS",
            EnvKey::SegmentSecs => "HLS_SEGMENT_SECS",
            EnvKey::RenditionLadder => "RENDITION_LADDER",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
