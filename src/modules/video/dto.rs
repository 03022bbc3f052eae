use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::model::JobState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub asset_id: Uuid,
    /// Job id of a previous upload that this one superseded, if any.
    pub superseded_job_id: Option<Uuid>,
}

/// Poll-friendly job snapshot. This is also the shape cached in redis so
/// high-frequency polling never touches the write path.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub state: JobState,
    /// 0..=100, rounded for external reporting.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ManifestResponse {
    pub asset_id: Uuid,
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThumbnailItem {
    pub timestamp_secs: u32,
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThumbnailsResponse {
    pub asset_id: Uuid,
    pub thumbnails: Vec<ThumbnailItem>,
}
