use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::modules::video::error::PipelineError;
use crate::pipeline::ladder::RenditionTier;

/// What the probe step learns about an uploaded source.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub video_codec: String,
}

/// One rendition encode request: source file in, segmented HLS out.
#[derive(Clone, Debug)]
pub struct EncodeRequest {
    pub input: PathBuf,
    /// Directory that receives `playlist.m3u8` plus the segment files.
    pub output_dir: PathBuf,
    pub tier: RenditionTier,
    pub segment_secs: u32,
}

impl EncodeRequest {
    pub fn playlist_path(&self) -> PathBuf {
        self.output_dir.join("playlist.m3u8")
    }
}

/// Capability interface over the external encoding tool. The pipeline only
/// ever talks to this trait, so the concrete tool is swappable and tests can
/// drive the job runner with a scripted fake.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn probe(&self, input: &Path) -> Result<SourceInfo, PipelineError>;

    /// Runs one rendition encode. Fractional completion (0.0..=1.0) is
    /// emitted on `progress`; the subprocess must be killed promptly when
    /// `cancel` fires, not left to run to completion.
    async fn encode(
        &self,
        req: &EncodeRequest,
        progress: UnboundedSender<f64>,
        cancel: CancellationToken,
    ) -> Result<(), PipelineError>;

    /// Extracts a single preview frame at the given timestamp.
    async fn extract_frame(
        &self,
        input: &Path,
        at_secs: f64,
        output: &Path,
    ) -> Result<(), PipelineError>;
}
