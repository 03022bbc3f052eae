use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::pipeline::ladder::RenditionTier;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }
}

impl From<&str> for JobState {
    fn from(s: &str) -> Self {
        match s {
            "queued" => JobState::Queued,
            "processing" => JobState::Processing,
            "completed" => JobState::Completed,
            "failed" => JobState::Failed,
            "cancelled" => JobState::Cancelled,
            _ => JobState::Pending,
        }
    }
}

/// One uploaded source file. Immutable once created; deletion cascades to
/// the job rows and cancels anything in flight.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, ToSchema)]
pub struct VideoAsset {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub original_filename: String,
    pub size_bytes: i64,
    /// sha-256 of the uploaded bytes, hex-encoded.
    pub content_hash: String,
    pub source_key: String,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
}

/// One transcoding attempt. The row is the single source of truth for job
/// state; every transition is a conditional write on the prior state.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct ProcessingJob {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub movie_id: Uuid,
    pub state: String,
    pub progress: f32,
    pub error_code: Option<String>,
    pub error_detail: Option<String>,
    /// Requested ladder snapshot, frozen at ingest time.
    pub ladder: Json<Vec<RenditionTier>>,
    pub retry_count: i32,
    pub claimed_by: Option<Uuid>,
    pub lease_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ProcessingJob {
    pub fn job_state(&self) -> JobState {
        JobState::from(self.state.as_str())
    }
}

/// One completed output variant. Rows exist only for encodes that
/// succeeded; a retried job overwrites its own rows, nothing else does.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Rendition {
    pub id: Uuid,
    pub job_id: Uuid,
    pub label: String,
    pub width: i32,
    pub height: i32,
    pub bandwidth: i64,
    pub playlist_key: String,
    pub segment_prefix: String,
    pub encode_seconds: f32,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct ManifestRecord {
    pub job_id: Uuid,
    pub asset_id: Uuid,
    pub storage_key: String,
    pub rendition_count: i32,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
pub struct ThumbnailEntry {
    pub timestamp_secs: u32,
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct ThumbnailSet {
    pub asset_id: Uuid,
    pub job_id: Uuid,
    pub entries: Json<Vec<ThumbnailEntry>>,
    pub created_at: OffsetDateTime,
}

// Object store key layout: `{asset_id}/source.<ext>`,
// `{asset_id}/{label}/playlist.m3u8` + segments, `{asset_id}/master.m3u8`,
// `{asset_id}/thumbnails/{timestamp}.jpg`.

pub fn source_key(asset_id: Uuid, ext: &str) -> String {
    format!("{asset_id}/source.{ext}")
}

pub fn rendition_prefix(asset_id: Uuid, label: &str) -> String {
    format!("{asset_id}/{label}")
}

pub fn playlist_key(asset_id: Uuid, label: &str) -> String {
    format!("{asset_id}/{label}/playlist.m3u8")
}

pub fn master_key(asset_id: Uuid) -> String {
    format!("{asset_id}/master.m3u8")
}

pub fn thumbnail_key(asset_id: Uuid, timestamp_secs: u32) -> String {
    format!("{asset_id}/thumbnails/{timestamp_secs}.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_text() {
        for state in [
            JobState::Pending,
            JobState::Queued,
            JobState::Processing,
            JobState::Completed,
            JobState::Failed,
            JobState::Cancelled,
        ] {
            assert_eq!(JobState::from(state.as_str()), state);
        }
    }

    #[test]
    fn only_final_states_are_terminal() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Processing.is_terminal());
    }

    #[test]
    fn storage_keys_follow_asset_layout() {
        let id = Uuid::nil();
        assert_eq!(source_key(id, "mkv"), format!("{id}/source.mkv"));
        assert_eq!(playlist_key(id, "720p"), format!("{id}/720p/playlist.m3u8"));
        assert_eq!(master_key(id), format!("{id}/master.m3u8"));
        assert_eq!(thumbnail_key(id, 30), format!("{id}/thumbnails/30.jpg"));
    }
}
