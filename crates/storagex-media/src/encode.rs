//! Transcoding to the delivery format.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use storagex_models::Resolution;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Video quality (CRF) of transcoded output.
pub const OUTPUT_CRF: u8 = 23;
/// x264 preset of transcoded output.
pub const OUTPUT_PRESET: &str = "veryfast";
/// Audio bitrate of transcoded output.
pub const OUTPUT_AUDIO_BITRATE: &str = "128k";

/// Turns a source file into delivery-format output.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, input: &Path, output: &Path, resolution: Resolution) -> MediaResult<()>;
}

/// H.264/AAC MP4 scaled to the target height, aspect ratio preserved.
pub fn transcode_command(input: &Path, output: &Path, resolution: Resolution) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .video_filter(resolution.scale_filter())
        .h264(OUTPUT_CRF, OUTPUT_PRESET)
        .aac(OUTPUT_AUDIO_BITRATE)
}

/// Encoder running the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    timeout: Duration,
}

impl FfmpegEncoder {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, input: &Path, output: &Path, resolution: Resolution) -> MediaResult<()> {
        let cmd = transcode_command(input, output, resolution);
        FfmpegRunner::new(self.timeout).run(&cmd).await?;
        info!("Encoded {} at {}", output.display(), resolution);
        Ok(())
    }
}
