use axum::extract::multipart::Field;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{
    JobStatusResponse, ManifestResponse, SubmitResponse, ThumbnailItem, ThumbnailsResponse,
};
use super::error::PipelineError;
use super::events::{TranscodeJob, TRANSCODE_QUEUE};
use super::model;
use super::repository::VideoRepository;
use crate::common::upload::stream_to_s3;
use crate::pipeline::progress::display_percentage;
use crate::state::AppState;

/// Container formats the ingest boundary accepts, mapped to the extension
/// used in the content-addressed source key.
const ACCEPTED_CONTAINERS: &[(&str, &str)] = &[
    ("video/mp4", "mp4"),
    ("video/x-matroska", "mkv"),
    ("video/quicktime", "mov"),
    ("video/webm", "webm"),
    ("video/mpeg", "mpg"),
    ("video/x-msvideo", "avi"),
];

/// Maps a declared content type to a source-file extension, rejecting
/// anything that is not a recognized video container.
pub fn source_extension(content_type: &str) -> Result<&'static str, PipelineError> {
    let mime: mime::Mime = content_type
        .parse()
        .map_err(|_| PipelineError::InvalidContentType(content_type.to_string()))?;

    if mime.type_() != mime::VIDEO {
        return Err(PipelineError::InvalidContentType(content_type.to_string()));
    }

    let essence = mime.essence_str();
    ACCEPTED_CONTAINERS
        .iter()
        .find(|(ct, _)| *ct == essence)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| PipelineError::InvalidContentType(content_type.to_string()))
}

pub struct VideoService;

impl VideoService {
    /// The ingest boundary: validate, persist the source, create the job in
    /// `pending`, enqueue, and return a handle. Never blocks on transcoding.
    ///
    /// A movie has at most one job in flight; an upload for a movie with an
    /// active job supersedes it (the old job is cancelled first, its
    /// artifacts orphaned for GC).
    pub async fn submit(
        state: AppState,
        movie_id: Uuid,
        field: Field<'_>,
    ) -> Result<SubmitResponse, PipelineError> {
        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .ok_or_else(|| PipelineError::InvalidContentType("missing".to_string()))?;
        let ext = source_extension(&content_type)?;

        let original_filename = field
            .file_name()
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("upload.{ext}"));

        // Supersede before the new job exists, so the partial unique index
        // on active jobs can never see two of them.
        let mut superseded_job_id = None;
        if let Some(active) = VideoRepository::find_active_job_for_movie(&state.db, movie_id)
            .await
            .map_err(|e| PipelineError::storage_io(e.to_string()))?
        {
            info!(job_id = %active.id, %movie_id, "Superseding active job with new upload");
            if VideoRepository::cancel_job(&state.db, active.id)
                .await
                .map_err(|e| PipelineError::storage_io(e.to_string()))?
            {
                superseded_job_id = Some(active.id);
                Self::publish_status_snapshot(&state, active.id).await;
            }
        }

        let asset_id = Uuid::new_v4();
        let key = model::source_key(asset_id, ext);
        let uploaded = stream_to_s3(
            &state.storage,
            field,
            key,
            &content_type,
            state.config.pipeline.max_upload_bytes,
        )
        .await?;

        let asset = VideoRepository::create_asset(
            &state.db,
            movie_id,
            &original_filename,
            uploaded.size_bytes as i64,
            &uploaded.content_hash,
            &uploaded.key,
        )
        .await
        .map_err(|e| PipelineError::storage_io(e.to_string()))?;

        let job = VideoRepository::create_job(
            &state.db,
            asset.id,
            movie_id,
            &state.config.pipeline.ladder,
        )
        .await
        .map_err(|e| PipelineError::storage_io(e.to_string()))?;

        let message = TranscodeJob {
            job_id: job.id,
            asset_id: asset.id,
            movie_id,
            source_key: uploaded.key.clone(),
        };
        let payload = serde_json::to_vec(&message)
            .map_err(|e| PipelineError::queue_unavailable(e.to_string()))?;
        state
            .queue
            .publish(TRANSCODE_QUEUE, &payload)
            .await
            .map_err(|e| PipelineError::queue_unavailable(e.to_string()))?;

        VideoRepository::mark_queued(&state.db, job.id)
            .await
            .map_err(|e| PipelineError::storage_io(e.to_string()))?;
        Self::publish_status_snapshot(&state, job.id).await;

        info!(job_id = %job.id, asset_id = %asset.id, %movie_id, "Accepted upload, job queued");

        Ok(SubmitResponse {
            job_id: job.id,
            asset_id: asset.id,
            superseded_job_id,
        })
    }

    /// The status boundary. Reads the redis snapshot first so polling never
    /// contends with in-flight progress writes; falls back to the job row.
    pub async fn status(state: AppState, job_id: Uuid) -> Result<JobStatusResponse, PipelineError> {
        if let Some(snapshot) = state.redis.get_job_status(job_id).await {
            return Ok(snapshot);
        }

        let job = VideoRepository::get_job(&state.db, job_id)
            .await
            .map_err(|e| PipelineError::storage_io(e.to_string()))?
            .ok_or(PipelineError::NotFound("job"))?;

        Ok(Self::snapshot_of(&job))
    }

    pub async fn cancel(state: AppState, job_id: Uuid) -> Result<JobStatusResponse, PipelineError> {
        let job = VideoRepository::get_job(&state.db, job_id)
            .await
            .map_err(|e| PipelineError::storage_io(e.to_string()))?
            .ok_or(PipelineError::NotFound("job"))?;

        if job.job_state().is_terminal() {
            return Err(PipelineError::Conflict(format!(
                "job is already {}",
                job.state
            )));
        }

        // In-flight workers observe this at the next rendition boundary and
        // kill the encoder subprocess.
        VideoRepository::cancel_job(&state.db, job_id)
            .await
            .map_err(|e| PipelineError::storage_io(e.to_string()))?;
        let snapshot = Self::publish_status_snapshot(&state, job_id).await;

        info!(%job_id, "Job cancelled by request");
        snapshot.ok_or(PipelineError::NotFound("job"))
    }

    /// The streaming boundary: master playlist URL, valid only once the
    /// latest job for the movie has completed.
    pub async fn manifest(state: AppState, movie_id: Uuid) -> Result<ManifestResponse, PipelineError> {
        let job = VideoRepository::latest_completed_job_for_movie(&state.db, movie_id)
            .await
            .map_err(|e| PipelineError::storage_io(e.to_string()))?
            .ok_or_else(|| {
                PipelineError::Conflict("no completed processing job for this movie".to_string())
            })?;

        let manifest = VideoRepository::get_manifest_for_job(&state.db, job.id)
            .await
            .map_err(|e| PipelineError::storage_io(e.to_string()))?
            .ok_or(PipelineError::NotFound("manifest"))?;

        Ok(ManifestResponse {
            asset_id: manifest.asset_id,
            url: state.storage.public_url(&manifest.storage_key),
        })
    }

    pub async fn thumbnails(
        state: AppState,
        movie_id: Uuid,
    ) -> Result<ThumbnailsResponse, PipelineError> {
        let asset = VideoRepository::latest_asset_for_movie(&state.db, movie_id)
            .await
            .map_err(|e| PipelineError::storage_io(e.to_string()))?
            .ok_or(PipelineError::NotFound("video asset"))?;

        let set = VideoRepository::get_thumbnail_set(&state.db, asset.id)
            .await
            .map_err(|e| PipelineError::storage_io(e.to_string()))?
            .ok_or(PipelineError::NotFound("thumbnail set"))?;

        let thumbnails = set
            .entries
            .0
            .iter()
            .map(|entry| ThumbnailItem {
                timestamp_secs: entry.timestamp_secs,
                url: state.storage.public_url(&entry.key),
            })
            .collect();

        Ok(ThumbnailsResponse {
            asset_id: asset.id,
            thumbnails,
        })
    }

    /// Owner-initiated deletion: cancels any in-flight job, drops the rows,
    /// and garbage-collects the orphaned artifacts best-effort.
    pub async fn delete_video(state: AppState, movie_id: Uuid) -> Result<(), PipelineError> {
        if let Some(active) = VideoRepository::find_active_job_for_movie(&state.db, movie_id)
            .await
            .map_err(|e| PipelineError::storage_io(e.to_string()))?
        {
            VideoRepository::cancel_job(&state.db, active.id)
                .await
                .map_err(|e| PipelineError::storage_io(e.to_string()))?;
            Self::publish_status_snapshot(&state, active.id).await;
        }

        let asset_ids = VideoRepository::delete_assets_for_movie(&state.db, movie_id)
            .await
            .map_err(|e| PipelineError::storage_io(e.to_string()))?;
        if asset_ids.is_empty() {
            return Err(PipelineError::NotFound("video asset"));
        }

        for asset_id in asset_ids {
            match state.storage.delete_prefix(&format!("{asset_id}/")).await {
                Ok(count) => info!(%asset_id, count, "Deleted orphaned artifacts"),
                Err(e) => warn!(%asset_id, "Artifact GC failed, leaving orphans: {}", e),
            }
        }

        Ok(())
    }

    pub fn snapshot_of(job: &super::model::ProcessingJob) -> JobStatusResponse {
        JobStatusResponse {
            job_id: job.id,
            state: job.job_state(),
            progress: display_percentage(job.progress),
            error_code: job.error_code.clone(),
            error_detail: job.error_detail.clone(),
        }
    }

    /// Re-reads the job row and pushes a fresh snapshot into the poll cache.
    pub async fn publish_status_snapshot(
        state: &AppState,
        job_id: Uuid,
    ) -> Option<JobStatusResponse> {
        match VideoRepository::get_job(&state.db, job_id).await {
            Ok(Some(job)) => {
                let snapshot = Self::snapshot_of(&job);
                state.redis.set_job_status(&snapshot).await;
                Some(snapshot)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(%job_id, "Failed to refresh status snapshot: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_recognized_video_containers() {
        assert_eq!(source_extension("video/mp4").unwrap(), "mp4");
        assert_eq!(source_extension("video/x-matroska").unwrap(), "mkv");
        assert_eq!(source_extension("video/quicktime").unwrap(), "mov");
        assert_eq!(source_extension("video/webm; codecs=vp9").unwrap(), "webm");
    }

    #[test]
    fn rejects_non_video_content() {
        assert!(matches!(
            source_extension("image/png"),
            Err(PipelineError::InvalidContentType(_))
        ));
        assert!(matches!(
            source_extension("application/octet-stream"),
            Err(PipelineError::InvalidContentType(_))
        ));
        assert!(matches!(
            source_extension("not a mime"),
            Err(PipelineError::InvalidContentType(_))
        ));
    }

    #[test]
    fn rejects_unknown_video_containers() {
        assert!(matches!(
            source_extension("video/x-flv"),
            Err(PipelineError::InvalidContentType(_))
        ));
    }
}
