use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::modules::video::dto::*;
use crate::modules::video::service::VideoService;
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

/// Ingest boundary. Accepts one multipart `file` field, validates it, and
/// answers with a job handle while transcoding happens in the background.
#[utoipa::path(
    post,
    path = "/api/v1/movies/{movie_id}/upload",
    params(
        ("movie_id" = Uuid, Path, description = "Catalog movie the video belongs to")
    ),
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Upload accepted, job queued", body = ApiResponse<SubmitResponse>),
        (status = 400, description = "Not a recognized video container"),
        (status = 413, description = "Upload exceeds the size limit"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Video"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => break field,
            Ok(Some(_)) => continue,
            Ok(None) => {
                return ApiError(
                    "Multipart field 'file' is required".to_string(),
                    StatusCode::BAD_REQUEST,
                )
                .into_response();
            }
            Err(e) => {
                error!("Malformed multipart request: {}", e);
                return ApiError("Malformed multipart request".to_string(), StatusCode::BAD_REQUEST)
                    .into_response();
            }
        }
    };

    match VideoService::submit(state, movie_id, field).await {
        Ok(res) => ApiSuccess(
            ApiResponse::success(res, "Upload accepted, transcoding queued"),
            StatusCode::ACCEPTED,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), e.status_code()).into_response(),
    }
}

/// Status boundary, safe to poll at high frequency.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{job_id}",
    params(
        ("job_id" = Uuid, Path, description = "Processing job ID")
    ),
    responses(
        (status = 200, description = "Current job status", body = ApiResponse<JobStatusResponse>),
        (status = 404, description = "Job Not Found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Video"
)]
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    match VideoService::status(state, job_id).await {
        Ok(res) => ApiSuccess(
            ApiResponse::success(res, "Job status retrieved"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), e.status_code()).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/jobs/{job_id}/cancel",
    params(
        ("job_id" = Uuid, Path, description = "Processing job ID")
    ),
    responses(
        (status = 200, description = "Job cancelled", body = ApiResponse<JobStatusResponse>),
        (status = 404, description = "Job Not Found"),
        (status = 409, description = "Job already in a terminal state"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Video"
)]
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    match VideoService::cancel(state, job_id).await {
        Ok(res) => ApiSuccess(ApiResponse::success(res, "Job cancelled"), StatusCode::OK)
            .into_response(),
        Err(e) => ApiError(e.to_string(), e.status_code()).into_response(),
    }
}

/// Streaming boundary: master playlist location for the player.
#[utoipa::path(
    get,
    path = "/api/v1/movies/{movie_id}/manifest",
    params(
        ("movie_id" = Uuid, Path, description = "Catalog movie ID")
    ),
    responses(
        (status = 200, description = "Master playlist URL", body = ApiResponse<ManifestResponse>),
        (status = 404, description = "No manifest for this movie"),
        (status = 409, description = "Processing not completed yet"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Video"
)]
pub async fn get_manifest(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> impl IntoResponse {
    match VideoService::manifest(state, movie_id).await {
        Ok(res) => ApiSuccess(
            ApiResponse::success(res, "Manifest retrieved"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), e.status_code()).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/movies/{movie_id}/thumbnails",
    params(
        ("movie_id" = Uuid, Path, description = "Catalog movie ID")
    ),
    responses(
        (status = 200, description = "Ordered preview thumbnails", body = ApiResponse<ThumbnailsResponse>),
        (status = 404, description = "No thumbnails for this movie"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Video"
)]
pub async fn get_thumbnails(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> impl IntoResponse {
    match VideoService::thumbnails(state, movie_id).await {
        Ok(res) => ApiSuccess(
            ApiResponse::success(res, "Thumbnails retrieved"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), e.status_code()).into_response(),
    }
}

/// Owner deletion; cascades to cancel any in-flight job.
#[utoipa::path(
    delete,
    path = "/api/v1/movies/{movie_id}/video",
    params(
        ("movie_id" = Uuid, Path, description = "Catalog movie ID")
    ),
    responses(
        (status = 200, description = "Video deleted"),
        (status = 404, description = "No video for this movie"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Video"
)]
pub async fn delete_video(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> impl IntoResponse {
    match VideoService::delete_video(state, movie_id).await {
        Ok(()) => ApiSuccess(
            ApiResponse::success((), "Video deleted"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError(e.to_string(), e.status_code()).into_response(),
    }
}
