use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use lapin::options::{BasicAckOptions, BasicConsumeOptions};
use lapin::types::FieldTable;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::modules::video::dto::JobStatusResponse;
use crate::modules::video::error::PipelineError;
use crate::modules::video::events::{TranscodeJob, TRANSCODE_QUEUE};
use crate::modules::video::model::{self, JobState, ProcessingJob, ThumbnailEntry};
use crate::modules::video::repository::VideoRepository;
use crate::modules::video::service::VideoService;
use crate::pipeline::encoder::{EncodeRequest, Encoder};
use crate::pipeline::ffmpeg::FfmpegEncoder;
use crate::pipeline::ladder::{select_tiers, RenditionTier};
use crate::pipeline::manifest::{build_master_playlist, ManifestVariant};
use crate::pipeline::progress::{display_percentage, ProgressAggregator};
use crate::pipeline::thumbnails::generate_frames;
use crate::state::AppState;

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const BACKOFF_CAP_SECS: u64 = 900;

/// Spawns the configured number of queue consumers. Each worker processes
/// one job at a time; parallelism across renditions of a single job is not
/// attempted, the pool is the unit of concurrency.
pub async fn start_worker_pool(state: AppState) {
    let concurrency = state.config.pipeline.worker_concurrency.max(1);
    info!("🎥 Starting {} transcoder worker(s)", concurrency);

    for index in 0..concurrency {
        let state = state.clone();
        tokio::spawn(async move {
            run_consumer(state, index).await;
        });
    }
}

async fn run_consumer(state: AppState, index: u32) {
    loop {
        if let Err(e) = consume_loop(&state, index).await {
            error!("Worker {} consumer error: {}. Reconnecting shortly.", index, e);
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

async fn consume_loop(state: &AppState, index: u32) -> anyhow::Result<()> {
    // A fresh worker identity per connection; the lease ties a claim to it.
    let worker_id = Uuid::new_v4();

    let channel = state
        .queue
        .create_consumer_channel(TRANSCODE_QUEUE, 1)
        .await?;

    let mut consumer = channel
        .basic_consume(
            TRANSCODE_QUEUE,
            &format!("transcoder-{index}"),
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!("🎥 Worker {} listening on '{}'", index, TRANSCODE_QUEUE);

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;

        match serde_json::from_slice::<TranscodeJob>(&delivery.data) {
            Ok(message) => handle_delivery(state, worker_id, message).await,
            Err(e) => error!("Dropping unparseable job message: {}", e),
        }

        // Requeues are explicit republishes, so the delivery is always
        // acked; a nack loop on a poison message would starve the pool.
        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            error!("Failed to ack delivery: {}", e);
        }
    }

    Ok(())
}

async fn handle_delivery(state: &AppState, worker_id: Uuid, message: TranscodeJob) {
    let pipeline_cfg = &state.config.pipeline;

    let job = match VideoRepository::claim_job(
        &state.db,
        message.job_id,
        worker_id,
        pipeline_cfg.lease_secs,
    )
    .await
    {
        Ok(Some(job)) => job,
        Ok(None) => {
            // Cancelled, superseded, or claimed by a live worker.
            info!(job_id = %message.job_id, "Job not claimable, skipping");
            return;
        }
        Err(e) => {
            // Job store unavailable; put the reference back rather than
            // losing the at-least-once delivery.
            error!(job_id = %message.job_id, "Claim failed: {}. Republishing.", e);
            republish_later(state.clone(), message, pipeline_cfg.retry_backoff_secs);
            return;
        }
    };

    info!(job_id = %job.id, %worker_id, retry = job.retry_count, "Claimed transcode job");
    VideoService::publish_status_snapshot(state, job.id).await;

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(watch_claim(
        state.clone(),
        job.id,
        worker_id,
        cancel.clone(),
        pipeline_cfg.lease_secs,
    ));

    let encoder = FfmpegEncoder;
    let outcome = tokio::time::timeout(
        Duration::from_secs(pipeline_cfg.job_timeout_secs),
        run_pipeline(state, &encoder, &job, &message, cancel.clone()),
    )
    .await;

    cancel.cancel();
    watcher.abort();

    match outcome {
        Ok(Ok(())) => {
            match VideoRepository::mark_completed(&state.db, job.id).await {
                Ok(true) => info!(job_id = %job.id, "Job completed"),
                Ok(false) => warn!(job_id = %job.id, "Completion CAS lost, job state moved elsewhere"),
                Err(e) => error!(job_id = %job.id, "Failed to mark completed: {}", e),
            }
            VideoService::publish_status_snapshot(state, job.id).await;
        }
        Ok(Err(PipelineError::Cancelled)) => {
            // Either an explicit cancel (row already says cancelled) or a
            // lost lease (another worker owns the job now). Only report.
            info!(job_id = %job.id, "Pipeline stopped by cancellation");
            VideoService::publish_status_snapshot(state, job.id).await;
        }
        Ok(Err(e)) if e.is_transient() => {
            handle_transient_failure(state, worker_id, &job, message, e).await;
        }
        Ok(Err(e)) => {
            warn!(job_id = %job.id, code = e.code(), "Job failed fatally: {}", e);
            fail_job(state, job.id, e.code(), &e.to_string()).await;
        }
        Err(_) => {
            let e = PipelineError::timeout(format!(
                "job exceeded the wall-clock timeout of {}s",
                pipeline_cfg.job_timeout_secs
            ));
            warn!(job_id = %job.id, "{}", e);
            fail_job(state, job.id, e.code(), &e.to_string()).await;
        }
    }
}

/// Periodically renews this worker's lease and watches for cancellation.
/// Fires the token when the job was cancelled or the claim was lost.
async fn watch_claim(
    state: AppState,
    job_id: Uuid,
    worker_id: Uuid,
    cancel: CancellationToken,
    lease_secs: u64,
) {
    let tick = Duration::from_secs((lease_secs / 3).clamp(1, 15));
    loop {
        tokio::time::sleep(tick).await;
        if cancel.is_cancelled() {
            return;
        }

        match VideoRepository::renew_lease(&state.db, job_id, worker_id, lease_secs).await {
            Ok(true) => {}
            Ok(false) => {
                // Cancelled, or re-claimed after our lease lapsed.
                warn!(%job_id, "Lease renewal refused, stopping work");
                cancel.cancel();
                return;
            }
            Err(e) => warn!(%job_id, "Lease renewal failed, will retry: {}", e),
        }
    }
}

async fn handle_transient_failure(
    state: &AppState,
    worker_id: Uuid,
    job: &ProcessingJob,
    message: TranscodeJob,
    e: PipelineError,
) {
    let pipeline_cfg = &state.config.pipeline;

    match VideoRepository::requeue_for_retry(&state.db, job.id, worker_id).await {
        Ok(Some(retry_count)) if retry_count <= pipeline_cfg.retry_limit => {
            let delay = backoff_delay(pipeline_cfg.retry_backoff_secs, retry_count);
            warn!(
                job_id = %job.id, retry_count, delay_secs = delay.as_secs(),
                "Transient failure, retrying: {}", e
            );
            VideoService::publish_status_snapshot(state, job.id).await;
            republish_later(state.clone(), message, delay.as_secs());
        }
        Ok(Some(retry_count)) => {
            let detail = format!("retry budget exhausted after {} attempts: {e}", retry_count);
            warn!(job_id = %job.id, code = e.code(), "{}", detail);
            fail_job(state, job.id, e.code(), &detail).await;
        }
        Ok(None) => {
            info!(job_id = %job.id, "Requeue CAS lost, job no longer ours");
        }
        Err(db_err) => {
            error!(job_id = %job.id, "Failed to record retry: {}", db_err);
            fail_job(state, job.id, e.code(), &e.to_string()).await;
        }
    }
}

async fn fail_job(state: &AppState, job_id: Uuid, code: &str, detail: &str) {
    match VideoRepository::mark_failed(&state.db, job_id, code, detail).await {
        Ok(_) => {}
        Err(e) => error!(%job_id, "Failed to mark job failed: {}", e),
    }
    VideoService::publish_status_snapshot(state, job_id).await;
}

/// Exponential backoff with up to 50% jitter, capped so a deep retry does
/// not sleep for hours.
fn backoff_delay(base_secs: u64, attempt: i32) -> Duration {
    let attempt = attempt.max(1) as u32;
    let exp = base_secs.saturating_mul(1u64 << (attempt - 1).min(16)).min(BACKOFF_CAP_SECS);
    let jitter = rand::rng().random_range(0..=exp / 2);
    Duration::from_secs(exp + jitter)
}

fn republish_later(state: AppState, message: TranscodeJob, delay_secs: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        let payload = match serde_json::to_vec(&message) {
            Ok(p) => p,
            Err(e) => {
                error!(job_id = %message.job_id, "Failed to serialize requeue message: {}", e);
                return;
            }
        };
        if let Err(e) = state.queue.publish(TRANSCODE_QUEUE, &payload).await {
            // The lease expiry path will eventually let another worker
            // re-claim the job once a new message arrives or on re-upload.
            error!(job_id = %message.job_id, "Failed to republish job: {}", e);
        }
    });
}

fn artifact_content_type(file_name: &str) -> &'static str {
    if file_name.ends_with(".m3u8") {
        PLAYLIST_CONTENT_TYPE
    } else if file_name.ends_with(".ts") {
        "video/mp2t"
    } else if file_name.ends_with(".jpg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

/// One finished rendition encode, ready for upload and recording.
struct EncodedTier {
    tier: RenditionTier,
    output_dir: std::path::PathBuf,
    encode_seconds: f32,
}

/// Encodes the selected tiers in order, forwarding coalesced progress to
/// `on_progress` and each finished tier to `on_tier_encoded`. Cancellation
/// is observed at every rendition boundary; mid-encode the token kills the
/// subprocess directly.
#[allow(clippy::too_many_arguments)]
async fn encode_tiers<'a>(
    encoder: &dyn Encoder,
    tiers: &[RenditionTier],
    input: &std::path::Path,
    out_root: &std::path::Path,
    segment_secs: u32,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(f32) -> BoxFuture<'a, ()>,
    mut on_tier_encoded: impl FnMut(EncodedTier) -> BoxFuture<'a, Result<(), PipelineError>>,
) -> Result<(), PipelineError> {
    let mut aggregator = ProgressAggregator::new(tiers.len());

    for tier in tiers {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        info!(tier = %tier.label, "Encoding rendition");
        let started = Instant::now();

        let request = EncodeRequest {
            input: input.to_path_buf(),
            output_dir: out_root.join(&tier.label),
            tier: tier.clone(),
            segment_secs,
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
        let encode_fut = encoder.encode(&request, tx, cancel.clone());
        let persist_fut = async {
            while let Some(fraction) = rx.recv().await {
                if let Some(pct) = aggregator.coalesce(fraction) {
                    on_progress(pct).await;
                }
            }
        };

        let (encode_result, ()) = tokio::join!(encode_fut, persist_fut);
        encode_result?;

        on_tier_encoded(EncodedTier {
            tier: tier.clone(),
            output_dir: request.output_dir,
            encode_seconds: started.elapsed().as_secs_f32(),
        })
        .await?;

        aggregator.tier_completed();
        if let Some(pct) = aggregator.coalesce(0.0) {
            on_progress(pct).await;
        }
    }

    Ok(())
}

/// Drives one claimed job through download, per-tier encode, artifact
/// upload, manifest build, and thumbnails.
async fn run_pipeline(
    state: &AppState,
    encoder: &dyn Encoder,
    job: &ProcessingJob,
    message: &TranscodeJob,
    cancel: CancellationToken,
) -> Result<(), PipelineError> {
    let pipeline_cfg = &state.config.pipeline;

    let scratch = tempfile::Builder::new()
        .prefix("transcode_")
        .tempdir()
        .map_err(|e| PipelineError::resources_exhausted(format!("failed to create scratch dir: {e}")))?;

    let input = scratch.path().join("source");
    info!(job_id = %job.id, key = %message.source_key, "Downloading source");
    state
        .storage
        .download_to_file(&message.source_key, &input)
        .await
        .map_err(|e| PipelineError::storage_io(e.to_string()))?;

    let source = encoder.probe(&input).await?;
    info!(
        job_id = %job.id,
        duration = source.duration_secs,
        resolution = %format!("{}x{}", source.width, source.height),
        codec = %source.video_codec,
        "Probed source"
    );

    let (selected, skipped) = select_tiers(&job.ladder.0, source.height);
    if !skipped.is_empty() {
        info!(job_id = %job.id, ?skipped, "Skipping tiers above source resolution");
    }

    encode_tiers(
        encoder,
        &selected,
        &input,
        scratch.path(),
        pipeline_cfg.segment_secs,
        &cancel,
        |pct| persist_progress(state, job.id, pct).boxed(),
        |encoded| {
            async move {
                let segment_prefix =
                    model::rendition_prefix(message.asset_id, &encoded.tier.label);
                upload_directory(state, &encoded.output_dir, &segment_prefix).await?;

                VideoRepository::insert_rendition(
                    &state.db,
                    job.id,
                    &encoded.tier,
                    &model::playlist_key(message.asset_id, &encoded.tier.label),
                    &segment_prefix,
                    encoded.encode_seconds,
                )
                .await
                .map_err(|e| PipelineError::storage_io(e.to_string()))?;
                Ok(())
            }
            .boxed()
        },
    )
    .await?;

    // The completion counter gates the manifest build: it runs only once
    // every selected tier has a rendition row.
    let completed = VideoRepository::count_renditions(&state.db, job.id)
        .await
        .map_err(|e| PipelineError::storage_io(e.to_string()))?;
    if completed as usize != selected.len() {
        return Err(PipelineError::encode_failed(format!(
            "rendition count mismatch: expected {}, found {}",
            selected.len(),
            completed
        )));
    }
    build_and_store_manifest(state, job, message).await?;

    if let Err(e) = generate_and_store_thumbnails(
        state,
        encoder,
        job,
        message,
        &input,
        source.duration_secs,
        scratch.path(),
        cancel,
    )
    .await
    {
        match e {
            PipelineError::Cancelled => return Err(PipelineError::Cancelled),
            // Thumbnails are non-fatal: the job still completes, the gap is
            // recorded as a warning.
            other => warn!(job_id = %job.id, "Thumbnail generation incomplete: {}", other),
        }
    }

    Ok(())
}

async fn persist_progress(state: &AppState, job_id: Uuid, pct: f32) {
    match VideoRepository::update_progress(&state.db, job_id, pct).await {
        Ok(_) => {
            state
                .redis
                .set_job_status(&JobStatusResponse {
                    job_id,
                    state: JobState::Processing,
                    progress: display_percentage(pct),
                    error_code: None,
                    error_detail: None,
                })
                .await;
        }
        Err(e) => warn!(%job_id, "Failed to persist progress: {}", e),
    }
}

/// Uploads every file in a rendition output directory under its prefix.
async fn upload_directory(
    state: &AppState,
    dir: &std::path::Path,
    prefix: &str,
) -> Result<(), PipelineError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::storage_io(format!("failed to read {}: {e}", dir.display())))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::storage_io(e.to_string()))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let key = format!("{prefix}/{name}");
        state
            .storage
            .upload_file(&key, &entry.path(), artifact_content_type(&name))
            .await
            .map_err(|e| PipelineError::storage_io(e.to_string()))?;
    }

    Ok(())
}

async fn build_and_store_manifest(
    state: &AppState,
    job: &ProcessingJob,
    message: &TranscodeJob,
) -> Result<(), PipelineError> {
    let renditions = VideoRepository::list_renditions(&state.db, job.id)
        .await
        .map_err(|e| PipelineError::storage_io(e.to_string()))?;

    let variants: Vec<ManifestVariant> = renditions
        .iter()
        .map(|r| ManifestVariant {
            label: r.label.clone(),
            width: r.width as u32,
            height: r.height as u32,
            bandwidth: r.bandwidth as u64,
            playlist_uri: format!("{}/playlist.m3u8", r.label),
        })
        .collect();

    let playlist = build_master_playlist(&variants);
    let key = model::master_key(message.asset_id);
    state
        .storage
        .put_object(&key, playlist.into_bytes(), PLAYLIST_CONTENT_TYPE)
        .await
        .map_err(|e| PipelineError::storage_io(e.to_string()))?;

    let inserted = VideoRepository::insert_manifest(
        &state.db,
        job.id,
        message.asset_id,
        &key,
        variants.len() as i32,
    )
    .await
    .map_err(|e| PipelineError::storage_io(e.to_string()))?;

    if inserted.is_some() {
        info!(job_id = %job.id, key = %key, variants = variants.len(), "Master manifest written");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn generate_and_store_thumbnails(
    state: &AppState,
    encoder: &dyn Encoder,
    job: &ProcessingJob,
    message: &TranscodeJob,
    input: &std::path::Path,
    duration_secs: f64,
    scratch: &std::path::Path,
    cancel: CancellationToken,
) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    let frames = generate_frames(
        encoder,
        input,
        scratch,
        duration_secs,
        state.config.pipeline.thumbnail_interval_secs,
    )
    .await?;

    let mut entries = Vec::with_capacity(frames.len());
    for frame in &frames {
        let key = model::thumbnail_key(message.asset_id, frame.timestamp_secs);
        state
            .storage
            .upload_file(&key, &frame.path, "image/jpeg")
            .await
            .map_err(|e| PipelineError::storage_io(e.to_string()))?;
        entries.push(ThumbnailEntry {
            timestamp_secs: frame.timestamp_secs,
            key,
        });
    }

    VideoRepository::upsert_thumbnail_set(&state.db, message.asset_id, job.id, &entries)
        .await
        .map_err(|e| PipelineError::storage_io(e.to_string()))?;

    info!(job_id = %job.id, count = entries.len(), "Thumbnail set written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encoder::SourceInfo;
    use crate::pipeline::ladder::default_ladder;
    use futures_util::future;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedSender;

    /// Encoder whose per-tier outcomes are scripted up front, with an
    /// optional token to fire during the nth encode.
    struct ScriptedEncoder {
        outcomes: Mutex<VecDeque<Result<(), PipelineError>>>,
        calls: AtomicUsize,
        cancel_during: Option<(usize, CancellationToken)>,
    }

    impl ScriptedEncoder {
        fn new(outcomes: Vec<Result<(), PipelineError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
                cancel_during: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl Encoder for ScriptedEncoder {
        async fn probe(&self, _input: &Path) -> Result<SourceInfo, PipelineError> {
            Ok(SourceInfo {
                duration_secs: 60.0,
                width: 1920,
                height: 1080,
                video_codec: "h264".to_string(),
            })
        }

        async fn encode(
            &self,
            _req: &EncodeRequest,
            progress: UnboundedSender<f64>,
            _cancel: CancellationToken,
        ) -> Result<(), PipelineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((n, token)) = &self.cancel_during {
                if call == *n {
                    token.cancel();
                }
            }
            let _ = progress.send(1.0);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }

        async fn extract_frame(
            &self,
            _input: &Path,
            _at_secs: f64,
            _output: &Path,
        ) -> Result<(), PipelineError> {
            Ok(())
        }
    }

    fn three_tiers() -> Vec<RenditionTier> {
        default_ladder().into_iter().take(3).collect()
    }

    #[tokio::test]
    async fn cancellation_is_observed_at_the_rendition_boundary() {
        let cancel = CancellationToken::new();
        let mut encoder = ScriptedEncoder::new(vec![Ok(()), Ok(()), Ok(())]);
        encoder.cancel_during = Some((0, cancel.clone()));

        let mut recorded = 0usize;
        let result = encode_tiers(
            &encoder,
            &three_tiers(),
            Path::new("/tmp/in"),
            Path::new("/tmp/out"),
            10,
            &cancel,
            |_| future::ready(()).boxed(),
            |_| {
                recorded += 1;
                future::ready(Ok(())).boxed()
            },
        )
        .await;

        assert!(matches!(result, Err(PipelineError::Cancelled)));
        // The first tier finished and was recorded; the second never started.
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorded, 1);
    }

    #[tokio::test]
    async fn transient_encode_failures_surface_for_retry() {
        let encoder = ScriptedEncoder::new(vec![Err(PipelineError::storage_io("s3 blip"))]);
        let cancel = CancellationToken::new();

        let result = encode_tiers(
            &encoder,
            &three_tiers(),
            Path::new("/tmp/in"),
            Path::new("/tmp/out"),
            10,
            &cancel,
            |_| future::ready(()).boxed(),
            |_| future::ready(Ok(())).boxed(),
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fatal_encode_failures_stop_the_job() {
        let encoder = ScriptedEncoder::new(vec![
            Ok(()),
            Err(PipelineError::encode_failed("corrupt stream")),
        ]);
        let cancel = CancellationToken::new();

        let result = encode_tiers(
            &encoder,
            &three_tiers(),
            Path::new("/tmp/in"),
            Path::new("/tmp/out"),
            10,
            &cancel,
            |_| future::ready(()).boxed(),
            |_| future::ready(Ok(())).boxed(),
        )
        .await;

        let err = result.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(err.code(), "encode_failed");
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn progress_reported_per_tier_never_decreases() {
        let encoder = ScriptedEncoder::new(vec![Ok(()), Ok(()), Ok(())]);
        let cancel = CancellationToken::new();
        let seen = Mutex::new(Vec::<f32>::new());

        let result = encode_tiers(
            &encoder,
            &three_tiers(),
            Path::new("/tmp/in"),
            Path::new("/tmp/out"),
            10,
            &cancel,
            |pct| {
                seen.lock().unwrap().push(pct);
                future::ready(()).boxed()
            },
            |_| future::ready(Ok(())).boxed(),
        )
        .await;

        assert!(result.is_ok());
        let seen = seen.into_inner().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last().copied(), Some(100.0));
    }

    #[test]
    fn backoff_grows_exponentially_within_cap() {
        let first = backoff_delay(30, 1).as_secs();
        let second = backoff_delay(30, 2).as_secs();
        let deep = backoff_delay(30, 12).as_secs();

        // Jitter adds at most 50% on top of the deterministic component.
        assert!((30..=45).contains(&first));
        assert!((60..=90).contains(&second));
        assert!(deep <= BACKOFF_CAP_SECS + BACKOFF_CAP_SECS / 2);
    }

    #[test]
    fn backoff_tolerates_degenerate_attempts() {
        assert!(backoff_delay(30, 0).as_secs() >= 30);
        assert!(backoff_delay(30, -3).as_secs() >= 30);
    }

    #[test]
    fn artifact_content_types_cover_hls_outputs() {
        assert_eq!(artifact_content_type("playlist.m3u8"), PLAYLIST_CONTENT_TYPE);
        assert_eq!(artifact_content_type("segment_000.ts"), "video/mp2t");
        assert_eq!(artifact_content_type("thumbnail_10.jpg"), "image/jpeg");
        assert_eq!(artifact_content_type("notes.txt"), "application/octet-stream");
    }
}
