use utoipa::OpenApi;

use crate::common::response::ApiResponse;
use crate::modules::video::dto::*;
use crate::modules::video::model::JobState;
use crate::pipeline::ladder::RenditionTier;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::video::handler::upload_video,
        crate::modules::video::handler::get_job_status,
        crate::modules::video::handler::cancel_job,
        crate::modules::video::handler::get_manifest,
        crate::modules::video::handler::get_thumbnails,
        crate::modules::video::handler::delete_video,
    ),
    components(
        schemas(
            ApiResponse<SubmitResponse>,
            SubmitResponse,
            JobStatusResponse,
            JobState,
            ManifestResponse,
            ThumbnailItem,
            ThumbnailsResponse,
            RenditionTier,
        )
    ),
    tags(
        (name = "Video", description = "Video ingestion, transcoding, and streaming")
    )
)]
pub struct ApiDoc;
