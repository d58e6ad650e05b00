//! Frame sampling for visual analysis.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// One still image taken from a video.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledFrame {
    /// Position requested, as a fraction of the frame count
    pub fraction: f64,
    /// Frame index the fraction resolved to
    pub index: u64,
    /// JPEG bytes
    pub jpeg: Vec<u8>,
}

/// Extracts still frames at relative positions of a video.
#[async_trait]
pub trait FrameSampler: Send + Sync {
    /// Sample one frame per fraction, in input order.
    ///
    /// A fraction that cannot be decoded is left out of the result. Errors
    /// only when the video itself cannot be read.
    async fn sample(&self, video: &Path, fractions: &[f64]) -> MediaResult<Vec<SampledFrame>>;
}

/// Frame index for a fraction of `total_frames`.
pub fn frame_index(total_frames: u64, fraction: f64) -> u64 {
    let index = (total_frames as f64 * fraction).floor() as u64;
    index.min(total_frames.saturating_sub(1))
}

/// Upper bound on one ffprobe or single-frame ffmpeg run.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(30);

/// Sampler using ffprobe for the frame count and ffmpeg for extraction.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSampler {
    timeout: Duration,
}

impl Default for FfmpegFrameSampler {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_TIMEOUT)
    }
}

impl FfmpegFrameSampler {
    /// `timeout` bounds each tool run separately.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn extract(&self, video: &Path, timestamp: f64, out: &Path) -> MediaResult<Vec<u8>> {
        let cmd = FfmpegCommand::new(video, out)
            .seek(timestamp)
            .jpeg_frame();
        FfmpegRunner::new(self.timeout).run(&cmd).await?;

        let bytes = tokio::fs::read(out).await?;
        if bytes.is_empty() {
            return Err(MediaError::InvalidVideo(format!(
                "empty frame at {:.3}s",
                timestamp
            )));
        }
        Ok(bytes)
    }
}

#[async_trait]
impl FrameSampler for FfmpegFrameSampler {
    async fn sample(&self, video: &Path, fractions: &[f64]) -> MediaResult<Vec<SampledFrame>> {
        let info = probe_video(video, self.timeout).await?;
        if info.frame_count == 0 {
            return Err(MediaError::InvalidVideo("video has no frames".to_string()));
        }

        let scratch = tempfile::tempdir()?;
        let mut frames = Vec::with_capacity(fractions.len());

        for (i, &fraction) in fractions.iter().enumerate() {
            let index = frame_index(info.frame_count, fraction);
            let timestamp = info.timestamp_of(index);
            let out = scratch.path().join(format!("frame_{}.jpg", i));

            match self.extract(video, timestamp, &out).await {
                Ok(jpeg) => {
                    debug!(index, timestamp, "Sampled frame");
                    frames.push(SampledFrame {
                        fraction,
                        index,
                        jpeg,
                    });
                }
                Err(e) => warn!(index, "Skipping frame: {}", e),
            }
        }

        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_index() {
        assert_eq!(frame_index(100, 0.2), 20);
        assert_eq!(frame_index(100, 0.5), 50);
        assert_eq!(frame_index(100, 0.8), 80);
        assert_eq!(frame_index(7, 0.5), 3);
        assert_eq!(frame_index(1, 0.8), 0);
        assert_eq!(frame_index(10, 1.0), 9);
    }

    #[tokio::test]
    async fn test_missing_file_errors() {
        let sampler = FfmpegFrameSampler::default();
        assert_eq!(sampler.timeout(), DEFAULT_FRAME_TIMEOUT);
        let err = sampler
            .sample(Path::new("/nonexistent/video.mp4"), &[0.5])
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
