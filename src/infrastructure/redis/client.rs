use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use tracing::{info, warn};

use crate::modules::video::dto::JobStatusResponse;

/// TTL for cached job snapshots. Long enough to absorb a polling client,
/// short enough that a stale cache self-heals from the job row.
const STATUS_TTL_SECS: u64 = 300;

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

impl RedisService {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = Client::open(connection_string)?;

        // Test connection
        let _conn = client.get_multiplexed_async_connection().await?;

        info!("✅ Connected to Redis");
        Ok(Self { client })
    }

    pub async fn get_conn(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn status_key(job_id: uuid::Uuid) -> String {
        format!("job:{job_id}:status")
    }

    /// Publishes a coalesced job snapshot for the poll path. Cache failures
    /// are logged and swallowed; the job row stays authoritative.
    pub async fn set_job_status(&self, status: &JobStatusResponse) {
        let payload = match serde_json::to_string(status) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to serialize job status snapshot: {}", e);
                return;
            }
        };

        match self.get_conn().await {
            Ok(mut conn) => {
                let result: Result<(), redis::RedisError> = conn
                    .set_ex(Self::status_key(status.job_id), payload, STATUS_TTL_SECS)
                    .await;
                if let Err(e) = result {
                    warn!("Failed to cache job status: {}", e);
                }
            }
            Err(e) => warn!("Redis unavailable for status cache: {}", e),
        }
    }

    pub async fn get_job_status(&self, job_id: uuid::Uuid) -> Option<JobStatusResponse> {
        let mut conn = self.get_conn().await.ok()?;
        let payload: Option<String> = conn.get(Self::status_key(job_id)).await.ok()?;
        payload.and_then(|p| serde_json::from_str(&p).ok())
    }
}
