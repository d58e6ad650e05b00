//! Frame geometry of a video via ffprobe.

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Frame rate used when the container reports none.
const FALLBACK_FPS: f64 = 30.0;

/// What frame sampling needs to know about a video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Seconds
    pub duration: f64,
    pub fps: f64,
    /// Container frame count, else estimated from duration and fps
    pub frame_count: u64,
}

impl VideoInfo {
    /// Timestamp in seconds of frame `index`.
    pub fn timestamp_of(&self, index: u64) -> f64 {
        index as f64 / self.fps
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// Probe the first video stream of `path`, giving ffprobe at most `timeout`.
pub async fn probe_video(path: impl AsRef<Path>, timeout: Duration) -> MediaResult<VideoInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let mut command = Command::new("ffprobe");
    command
        .args(["-v", "quiet", "-print_format", "json", "-select_streams", "v:0"])
        .args(["-show_format", "-show_streams"])
        .arg(path);
    let output = output_within(command, timeout).await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("ffprobe exited with {}", output.status),
            stderr: Some(String::from_utf8_lossy(&output.stderr).into_owned()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Collect a command's output; the process is killed if `limit` passes first.
async fn output_within(mut command: Command, limit: Duration) -> MediaResult<Output> {
    command.stdin(Stdio::null()).kill_on_drop(true);
    match tokio::time::timeout(limit, command.output()).await {
        Ok(output) => Ok(output?),
        Err(_) => Err(MediaError::Timeout(limit.as_secs())),
    }
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)?;
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| MediaError::InvalidVideo("no video stream".to_string()))?;

    let duration = stream
        .duration
        .as_deref()
        .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .find_map(|rate| rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(FALLBACK_FPS);

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| (duration * fps).floor() as u64);

    Ok(VideoInfo {
        duration,
        fps,
        frame_count,
    })
}

/// `"30000/1001"` or `"29.97"`; zero and malformed rates are `None`.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.parse::<f64>().ok()? / den
        }
        None => rate.parse().ok()?,
    };
    (value > 0.0).then_some(value)
}
