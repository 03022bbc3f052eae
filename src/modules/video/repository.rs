use anyhow::Result;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::model::{
    ManifestRecord, ProcessingJob, Rendition, ThumbnailEntry, ThumbnailSet, VideoAsset,
};
use crate::pipeline::ladder::RenditionTier;

/// Data access for the job record store. Every state transition is a
/// conditional UPDATE keyed on the prior state, so a requeue race between
/// two workers can never double-apply a transition.
pub struct VideoRepository;

const CLAIM_JOB_SQL: &str = r#"
    UPDATE processing_jobs
    SET state = 'processing',
        claimed_by = $2,
        lease_expires_at = NOW() + make_interval(secs => $3),
        updated_at = NOW()
    WHERE id = $1
      AND (state IN ('pending', 'queued')
           OR (state = 'processing' AND lease_expires_at < NOW()))
    RETURNING *
"#;

impl VideoRepository {
    // --- ASSETS ---

    pub async fn create_asset(
        pool: &PgPool,
        movie_id: Uuid,
        original_filename: &str,
        size_bytes: i64,
        content_hash: &str,
        source_key: &str,
    ) -> Result<VideoAsset> {
        let asset = sqlx::query_as::<_, VideoAsset>(
            r#"
            INSERT INTO video_assets (id, movie_id, original_filename, size_bytes, content_hash, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(movie_id)
        .bind(original_filename)
        .bind(size_bytes)
        .bind(content_hash)
        .bind(source_key)
        .fetch_one(pool)
        .await?;

        Ok(asset)
    }

    pub async fn latest_asset_for_movie(pool: &PgPool, movie_id: Uuid) -> Result<Option<VideoAsset>> {
        let asset = sqlx::query_as::<_, VideoAsset>(
            "SELECT * FROM video_assets WHERE movie_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(movie_id)
        .fetch_optional(pool)
        .await?;
        Ok(asset)
    }

    /// Deletes all assets for a movie; renditions/manifests/thumbnails go
    /// with them via ON DELETE CASCADE. Binary artifacts are orphaned for GC.
    pub async fn delete_assets_for_movie(pool: &PgPool, movie_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("DELETE FROM video_assets WHERE movie_id = $1 RETURNING id")
                .bind(movie_id)
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    // --- JOBS ---

    pub async fn create_job(
        pool: &PgPool,
        asset_id: Uuid,
        movie_id: Uuid,
        ladder: &[RenditionTier],
    ) -> Result<ProcessingJob> {
        let job = sqlx::query_as::<_, ProcessingJob>(
            r#"
            INSERT INTO processing_jobs (id, asset_id, movie_id, state, progress, ladder, retry_count)
            VALUES ($1, $2, $3, 'pending', 0, $4, 0)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(asset_id)
        .bind(movie_id)
        .bind(Json(ladder.to_vec()))
        .fetch_one(pool)
        .await?;

        Ok(job)
    }

    pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<Option<ProcessingJob>> {
        let job = sqlx::query_as::<_, ProcessingJob>("SELECT * FROM processing_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(job)
    }

    pub async fn find_active_job_for_movie(
        pool: &PgPool,
        movie_id: Uuid,
    ) -> Result<Option<ProcessingJob>> {
        let job = sqlx::query_as::<_, ProcessingJob>(
            r#"
            SELECT * FROM processing_jobs
            WHERE movie_id = $1 AND state IN ('pending', 'queued', 'processing')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(movie_id)
        .fetch_optional(pool)
        .await?;
        Ok(job)
    }

    pub async fn latest_completed_job_for_movie(
        pool: &PgPool,
        movie_id: Uuid,
    ) -> Result<Option<ProcessingJob>> {
        let job = sqlx::query_as::<_, ProcessingJob>(
            r#"
            SELECT * FROM processing_jobs
            WHERE movie_id = $1 AND state = 'completed'
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(movie_id)
        .fetch_optional(pool)
        .await?;
        Ok(job)
    }

    /// pending -> queued, applied after the queue publish succeeded.
    pub async fn mark_queued(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET state = 'queued', updated_at = NOW()
            WHERE id = $1 AND state = 'pending'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Claims a job for a worker: pending/queued -> processing, or re-claims
    /// a processing job whose lease expired (presumed-dead worker). The
    /// queue delivery can outrun the pending -> queued commit of the
    /// publisher, so a still-pending row must be claimable; refusing it
    /// would drop the only delivery and strand the job.
    pub async fn claim_job(
        pool: &PgPool,
        id: Uuid,
        worker_id: Uuid,
        lease_secs: u64,
    ) -> Result<Option<ProcessingJob>> {
        let job = sqlx::query_as::<_, ProcessingJob>(CLAIM_JOB_SQL)
            .bind(id)
            .bind(worker_id)
            .bind(lease_secs as f64)
            .fetch_optional(pool)
            .await?;
        Ok(job)
    }

    /// Extends the lease; fails when another worker has re-claimed the job.
    pub async fn renew_lease(
        pool: &PgPool,
        id: Uuid,
        worker_id: Uuid,
        lease_secs: u64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET lease_expires_at = NOW() + make_interval(secs => $3), updated_at = NOW()
            WHERE id = $1 AND state = 'processing' AND claimed_by = $2
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(lease_secs as f64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persists progress, discarding anything that would move it backwards.
    pub async fn update_progress(pool: &PgPool, id: Uuid, progress: f32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET progress = GREATEST(progress, LEAST($2, 100.0)), updated_at = NOW()
            WHERE id = $1 AND state = 'processing'
            "#,
        )
        .bind(id)
        .bind(progress)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// processing -> queued for a bounded transient retry. Returns the new
    /// retry count, or None when the CAS lost (job no longer ours).
    pub async fn requeue_for_retry(
        pool: &PgPool,
        id: Uuid,
        worker_id: Uuid,
    ) -> Result<Option<i32>> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE processing_jobs
            SET state = 'queued',
                retry_count = retry_count + 1,
                claimed_by = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND state = 'processing' AND claimed_by = $2
            RETURNING retry_count
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(count,)| count))
    }

    pub async fn mark_completed(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET state = 'completed', progress = 100, claimed_by = NULL,
                lease_expires_at = NULL, updated_at = NOW()
            WHERE id = $1 AND state = 'processing'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_failed(
        pool: &PgPool,
        id: Uuid,
        error_code: &str,
        error_detail: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET state = 'failed', error_code = $2, error_detail = $3,
                claimed_by = NULL, lease_expires_at = NULL, updated_at = NOW()
            WHERE id = $1 AND state NOT IN ('completed', 'failed', 'cancelled')
            "#,
        )
        .bind(id)
        .bind(error_code)
        .bind(error_detail)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Any non-terminal state -> cancelled (supersede or explicit cancel).
    /// Terminal states are immutable: the CAS simply matches no row.
    pub async fn cancel_job(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE processing_jobs
            SET state = 'cancelled', claimed_by = NULL, lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND state NOT IN ('completed', 'failed', 'cancelled')
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- RENDITIONS ---

    pub async fn insert_rendition(
        pool: &PgPool,
        job_id: Uuid,
        tier: &RenditionTier,
        playlist_key: &str,
        segment_prefix: &str,
        encode_seconds: f32,
    ) -> Result<Rendition> {
        // A retried job re-encodes from the first tier; overwrite the row
        // from the earlier attempt, its artifacts were re-uploaded too.
        let rendition = sqlx::query_as::<_, Rendition>(
            r#"
            INSERT INTO renditions (id, job_id, label, width, height, bandwidth,
                                    playlist_key, segment_prefix, encode_seconds)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (job_id, label) DO UPDATE
                SET playlist_key = EXCLUDED.playlist_key,
                    segment_prefix = EXCLUDED.segment_prefix,
                    encode_seconds = EXCLUDED.encode_seconds
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job_id)
        .bind(&tier.label)
        .bind(tier.width as i32)
        .bind(tier.height as i32)
        .bind(tier.bandwidth as i64)
        .bind(playlist_key)
        .bind(segment_prefix)
        .bind(encode_seconds)
        .fetch_one(pool)
        .await?;
        Ok(rendition)
    }

    pub async fn list_renditions(pool: &PgPool, job_id: Uuid) -> Result<Vec<Rendition>> {
        let renditions = sqlx::query_as::<_, Rendition>(
            "SELECT * FROM renditions WHERE job_id = $1 ORDER BY bandwidth ASC",
        )
        .bind(job_id)
        .fetch_all(pool)
        .await?;
        Ok(renditions)
    }

    /// Per-job completion counter backing the manifest trigger: the builder
    /// only runs once this matches the selected ladder size.
    pub async fn count_renditions(pool: &PgPool, job_id: Uuid) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM renditions WHERE job_id = $1")
                .bind(job_id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }

    // --- MANIFESTS ---

    pub async fn insert_manifest(
        pool: &PgPool,
        job_id: Uuid,
        asset_id: Uuid,
        storage_key: &str,
        rendition_count: i32,
    ) -> Result<Option<ManifestRecord>> {
        // DO NOTHING keeps the row write-once; a lost race returns None.
        let manifest = sqlx::query_as::<_, ManifestRecord>(
            r#"
            INSERT INTO manifests (job_id, asset_id, storage_key, rendition_count)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (job_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(asset_id)
        .bind(storage_key)
        .bind(rendition_count)
        .fetch_optional(pool)
        .await?;
        Ok(manifest)
    }

    pub async fn get_manifest_for_job(pool: &PgPool, job_id: Uuid) -> Result<Option<ManifestRecord>> {
        let manifest =
            sqlx::query_as::<_, ManifestRecord>("SELECT * FROM manifests WHERE job_id = $1")
                .bind(job_id)
                .fetch_optional(pool)
                .await?;
        Ok(manifest)
    }

    // --- THUMBNAILS ---

    pub async fn upsert_thumbnail_set(
        pool: &PgPool,
        asset_id: Uuid,
        job_id: Uuid,
        entries: &[ThumbnailEntry],
    ) -> Result<ThumbnailSet> {
        let set = sqlx::query_as::<_, ThumbnailSet>(
            r#"
            INSERT INTO thumbnail_sets (asset_id, job_id, entries)
            VALUES ($1, $2, $3)
            ON CONFLICT (asset_id) DO UPDATE
                SET job_id = EXCLUDED.job_id, entries = EXCLUDED.entries
            RETURNING *
            "#,
        )
        .bind(asset_id)
        .bind(job_id)
        .bind(Json(entries.to_vec()))
        .fetch_one(pool)
        .await?;
        Ok(set)
    }

    pub async fn get_thumbnail_set(pool: &PgPool, asset_id: Uuid) -> Result<Option<ThumbnailSet>> {
        let set =
            sqlx::query_as::<_, ThumbnailSet>("SELECT * FROM thumbnail_sets WHERE asset_id = $1")
                .bind(asset_id)
                .fetch_optional(pool)
                .await?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The consumer can dequeue before the publisher's pending -> queued
    // commit lands; the claim must cover that window or the delivery is
    // acked and the job stranded.
    #[test]
    fn claim_covers_rows_not_yet_marked_queued() {
        assert!(CLAIM_JOB_SQL.contains("'pending'"));
        assert!(CLAIM_JOB_SQL.contains("'queued'"));
        assert!(CLAIM_JOB_SQL.contains("lease_expires_at < NOW()"));
    }
}
