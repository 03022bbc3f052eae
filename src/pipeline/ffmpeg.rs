use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::modules::video::error::PipelineError;
use crate::pipeline::encoder::{EncodeRequest, Encoder, SourceInfo};
use crate::pipeline::progress::parse_progress_line;

/// ffmpeg/ffprobe subprocess implementation of [`Encoder`].
///
/// One subprocess per rendition; progress comes from `-progress pipe:1` on
/// stdout, diagnostics from stderr. Cancellation kills the child instead of
/// letting it run to completion.
#[derive(Clone, Debug, Default)]
pub struct FfmpegEncoder;

/// Lines of stderr kept for the error detail when an encode fails.
const STDERR_TAIL_LINES: usize = 20;

impl FfmpegEncoder {
    fn classify_spawn_error(tool: &str, e: std::io::Error) -> PipelineError {
        match e.kind() {
            ErrorKind::OutOfMemory => {
                PipelineError::resources_exhausted(format!("failed to spawn {tool}: {e}"))
            }
            _ => PipelineError::spawn_failed(format!("failed to spawn {tool}: {e}")),
        }
    }

    fn classify_encode_failure(exit_code: Option<i32>, stderr_tail: &str) -> PipelineError {
        let detail = format!(
            "ffmpeg exited with {}: {}",
            exit_code.map_or("signal".to_string(), |c| c.to_string()),
            stderr_tail.trim()
        );
        if stderr_tail.contains("No space left on device")
            || stderr_tail.contains("Cannot allocate memory")
        {
            PipelineError::resources_exhausted(detail)
        } else if exit_code.is_none() {
            // Death by signal (OOM killer, external kill) says nothing about
            // the source; retry instead of failing the job outright.
            PipelineError::encoder_killed(detail)
        } else {
            PipelineError::encode_failed(detail)
        }
    }
}

/// Builds the ffmpeg argument list for one HLS rendition encode.
/// Scale-then-pad keeps the source aspect ratio inside the tier's frame.
pub(crate) fn hls_args(req: &EncodeRequest) -> Vec<String> {
    let tier = &req.tier;
    let filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
        w = tier.width,
        h = tier.height
    );
    let segment_pattern = req.output_dir.join("segment_%03d.ts");

    vec![
        "-i".into(), req.input.to_string_lossy().into_owned(),
        "-c:v".into(), "libx264".into(),
        "-preset".into(), "medium".into(),
        "-crf".into(), "23".into(),
        "-maxrate".into(), format!("{}k", tier.video_bitrate_k),
        "-bufsize".into(), format!("{}k", tier.video_bitrate_k * 2),
        "-vf".into(), filter,
        "-c:a".into(), "aac".into(),
        "-b:a".into(), format!("{}k", tier.audio_bitrate_k),
        "-profile:v".into(), "high".into(),
        "-level".into(), "4.0".into(),
        "-pix_fmt".into(), "yuv420p".into(),
        "-hls_time".into(), req.segment_secs.to_string(),
        "-hls_list_size".into(), "0".into(),
        "-hls_segment_filename".into(), segment_pattern.to_string_lossy().into_owned(),
        "-hls_flags".into(), "independent_segments".into(),
        "-avoid_negative_ts".into(), "make_zero".into(),
        "-f".into(), "hls".into(),
        "-progress".into(), "pipe:1".into(),
        "-nostats".into(),
        "-y".into(), req.playlist_path().to_string_lossy().into_owned(),
    ]
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn probe(&self, input: &Path) -> Result<SourceInfo, PipelineError> {
        let output = Command::new("ffprobe")
            .args([
                "-v", "quiet",
                "-print_format", "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(input)
            .output()
            .await
            .map_err(|e| Self::classify_spawn_error("ffprobe", e))?;

        if !output.status.success() {
            return Err(PipelineError::unsupported_source(format!(
                "ffprobe could not read the source: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let info: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| PipelineError::unsupported_source(format!("unparseable ffprobe output: {e}")))?;

        let video_stream = info["streams"]
            .as_array()
            .and_then(|streams| {
                streams.iter().find(|s| s["codec_type"].as_str() == Some("video"))
            })
            .ok_or_else(|| PipelineError::unsupported_source("no video stream found in source"))?;

        let duration_secs = info["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| *d > 0.0)
            .ok_or_else(|| PipelineError::unsupported_source("source has no readable duration"))?;

        let width = video_stream["width"].as_u64().unwrap_or(0) as u32;
        let height = video_stream["height"].as_u64().unwrap_or(0) as u32;
        if width == 0 || height == 0 {
            return Err(PipelineError::unsupported_source("source has no readable resolution"));
        }

        Ok(SourceInfo {
            duration_secs,
            width,
            height,
            video_codec: video_stream["codec_name"].as_str().unwrap_or("unknown").to_string(),
        })
    }

    async fn encode(
        &self,
        req: &EncodeRequest,
        progress: UnboundedSender<f64>,
        cancel: CancellationToken,
    ) -> Result<(), PipelineError> {
        tokio::fs::create_dir_all(&req.output_dir)
            .await
            .map_err(|e| PipelineError::storage_io(format!("failed to create output dir: {e}")))?;

        let duration = self.probe(&req.input).await?.duration_secs;

        let mut child = Command::new("ffmpeg")
            .args(hls_args(req))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Self::classify_spawn_error("ffmpeg", e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            PipelineError::spawn_failed("ffmpeg stdout was not captured")
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            PipelineError::spawn_failed("ffmpeg stderr was not captured")
        })?;

        // Keep the tail of stderr for failure diagnosis without buffering
        // the whole (potentially huge) log.
        let stderr_task = tokio::spawn(async move {
            let mut tail: Vec<String> = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() >= STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail.join("\n")
        });

        let mut stdout_lines = BufReader::new(stdout).lines();
        let status = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    warn!(tier = %req.tier.label, "Cancellation requested, killing ffmpeg");
                    let _ = child.kill().await;
                    stderr_task.abort();
                    return Err(PipelineError::Cancelled);
                }

                line = stdout_lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some(elapsed) = parse_progress_line(&line) {
                                let fraction = (elapsed / duration).clamp(0.0, 1.0);
                                let _ = progress.send(fraction);
                            }
                            continue;
                        }
                        // stdout closed: encoder is done, collect its status.
                        Ok(None) | Err(_) => {
                            break child.wait().await.map_err(|e| {
                                PipelineError::spawn_failed(format!("failed to reap ffmpeg: {e}"))
                            })?;
                        }
                    }
                }
            }
        };

        let stderr_tail = stderr_task.await.unwrap_or_default();

        if status.success() {
            let _ = progress.send(1.0);
            debug!(tier = %req.tier.label, "ffmpeg encode finished");
            Ok(())
        } else {
            Err(Self::classify_encode_failure(status.code(), &stderr_tail))
        }
    }

    async fn extract_frame(
        &self,
        input: &Path,
        at_secs: f64,
        output: &Path,
    ) -> Result<(), PipelineError> {
        let output_arg = output.to_string_lossy().into_owned();
        let result = Command::new("ffmpeg")
            .args(["-ss", &format!("{at_secs:.3}")])
            .arg("-i")
            .arg(input)
            .args([
                "-vframes", "1",
                "-vf", "scale=320:180:force_original_aspect_ratio=decrease,pad=320:180:(ow-iw)/2:(oh-ih)/2",
                "-q:v", "2",
                "-y", &output_arg,
            ])
            .output()
            .await
            .map_err(|e| Self::classify_spawn_error("ffmpeg", e))?;

        if !result.status.success() {
            return Err(PipelineError::encode_failed(format!(
                "frame extraction at {at_secs:.1}s failed: {}",
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ladder::RenditionTier;
    use std::path::PathBuf;

    fn request() -> EncodeRequest {
        EncodeRequest {
            input: PathBuf::from("/tmp/in.mkv"),
            output_dir: PathBuf::from("/tmp/out/720p"),
            tier: RenditionTier {
                label: "720p".into(),
                width: 1280,
                height: 720,
                bandwidth: 2_800_000,
                video_bitrate_k: 2500,
                audio_bitrate_k: 128,
            },
            segment_secs: 10,
        }
    }

    #[test]
    fn signal_killed_encodes_are_retryable() {
        let e = FfmpegEncoder::classify_encode_failure(None, "");
        assert!(e.is_transient());
        assert_eq!(e.code(), "encoder_killed");
    }

    #[test]
    fn encoder_reported_stream_errors_are_fatal() {
        let e = FfmpegEncoder::classify_encode_failure(
            Some(1),
            "Invalid data found when processing input",
        );
        assert!(!e.is_transient());
        assert_eq!(e.code(), "encode_failed");
    }

    #[test]
    fn exhausted_resources_are_retryable_however_ffmpeg_died() {
        let e = FfmpegEncoder::classify_encode_failure(Some(1), "No space left on device");
        assert!(e.is_transient());
        assert_eq!(e.code(), "resources_exhausted");

        let e = FfmpegEncoder::classify_encode_failure(None, "Cannot allocate memory");
        assert!(e.is_transient());
        assert_eq!(e.code(), "resources_exhausted");
    }

    #[test]
    fn hls_args_scale_to_tier_resolution() {
        let args = hls_args(&request());
        let filter = args.iter().position(|a| a == "-vf").map(|i| &args[i + 1]).unwrap();
        assert!(filter.contains("scale=1280:720"));
        assert!(filter.contains("pad=1280:720"));
    }

    #[test]
    fn hls_args_request_segmented_output_with_progress() {
        let args = hls_args(&request());
        assert!(args.windows(2).any(|w| w[0] == "-hls_time" && w[1] == "10"));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "hls"));
        assert!(args.windows(2).any(|w| w[0] == "-progress" && w[1] == "pipe:1"));
        assert!(args.windows(2).any(|w| w[0] == "-maxrate" && w[1] == "2500k"));
        assert_eq!(args.last().unwrap(), "/tmp/out/720p/playlist.m3u8");
    }
}
