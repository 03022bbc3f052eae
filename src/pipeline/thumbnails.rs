use std::path::{Path, PathBuf};

use tracing::warn;

use crate::modules::video::error::PipelineError;
use crate::pipeline::encoder::Encoder;

/// One extracted preview frame, ready for upload.
#[derive(Clone, Debug, PartialEq)]
pub struct ThumbnailFrame {
    pub timestamp_secs: u32,
    pub path: PathBuf,
}

/// Sampling points across the duration, one every `interval_secs` starting
/// at zero. A zero interval is treated as "one frame at the start".
pub fn sample_timestamps(duration_secs: f64, interval_secs: u32) -> Vec<u32> {
    if duration_secs <= 0.0 {
        return Vec::new();
    }
    let interval = interval_secs.max(1);
    (0..duration_secs.floor() as u32).step_by(interval as usize).collect()
}

/// Extracts preview frames into `scratch_dir` at the configured interval.
///
/// Per-frame failures are logged and skipped rather than failing the set;
/// the caller treats an empty result as a warning, never a job error.
pub async fn generate_frames(
    encoder: &dyn Encoder,
    input: &Path,
    scratch_dir: &Path,
    duration_secs: f64,
    interval_secs: u32,
) -> Result<Vec<ThumbnailFrame>, PipelineError> {
    let mut frames = Vec::new();

    for timestamp in sample_timestamps(duration_secs, interval_secs) {
        let path = scratch_dir.join(format!("thumbnail_{timestamp}.jpg"));
        match encoder.extract_frame(input, timestamp as f64, &path).await {
            Ok(()) => frames.push(ThumbnailFrame { timestamp_secs: timestamp, path }),
            Err(PipelineError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(e) => warn!(timestamp, "Skipping thumbnail frame: {}", e),
        }
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_every_interval_from_zero() {
        assert_eq!(sample_timestamps(35.0, 10), vec![0, 10, 20, 30]);
        assert_eq!(sample_timestamps(30.0, 10), vec![0, 10, 20]);
    }

    #[test]
    fn short_sources_get_a_single_frame() {
        assert_eq!(sample_timestamps(4.2, 10), vec![0]);
    }

    #[test]
    fn empty_or_unknown_duration_yields_nothing() {
        assert!(sample_timestamps(0.0, 10).is_empty());
        assert!(sample_timestamps(-1.0, 10).is_empty());
    }

    #[test]
    fn zero_interval_does_not_loop_forever() {
        assert_eq!(sample_timestamps(3.0, 0), vec![0, 1, 2]);
    }
}
