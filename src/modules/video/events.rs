use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TRANSCODE_QUEUE: &str = "transcode_jobs";

/// Queue message handed from the ingest handler to the worker pool. The
/// payload is only a reference; the job row holds the authoritative state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub job_id: Uuid,
    pub asset_id: Uuid,
    pub movie_id: Uuid,
    pub source_key: String,
}
