//! ffmpeg invocation.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Lines of stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Arguments of one ffmpeg run: `-y -v error [pre-input] -i input [output] output`.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    pre_input: Vec<String>,
    post_input: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            pre_input: Vec::new(),
            post_input: Vec::new(),
        }
    }

    /// Append output options.
    pub fn option(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.post_input.push(flag.to_string());
        self.post_input.push(value.into());
        self
    }

    /// Fast input seek to `seconds`.
    pub fn seek(mut self, seconds: f64) -> Self {
        self.pre_input.push("-ss".to_string());
        self.pre_input.push(format!("{:.3}", seconds));
        self
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.option("-vf", filter)
    }

    /// libx264 at a constant rate factor.
    pub fn h264(self, crf: u8, preset: &str) -> Self {
        self.option("-c:v", "libx264")
            .option("-crf", crf.to_string())
            .option("-preset", preset)
    }

    pub fn aac(self, bitrate: &str) -> Self {
        self.option("-c:a", "aac").option("-b:a", bitrate)
    }

    /// One high-quality JPEG frame.
    pub fn jpeg_frame(self) -> Self {
        self.option("-vframes", "1")
            .option("-q:v", "2")
            .option("-f", "image2")
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-v".to_string(), "error".to_string()];
        args.extend(self.pre_input.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().into_owned());
        args.extend(self.post_input.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Runs ffmpeg, killing it once the deadline passes.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    timeout: Duration,
}

impl FfmpegRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("ffmpeg {}", args.join(" "));

        let mut command = Command::new("ffmpeg");
        command.args(&args);
        self.run_command(command).await
    }

    async fn run_command(&self, mut command: Command) -> MediaResult<()> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr_tail = child.stderr.take().map(|stderr| tokio::spawn(tail(stderr)));

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!("ffmpeg exceeded {:?}, killing it", self.timeout);
                let _ = child.kill().await;
                return Err(MediaError::Timeout(self.timeout.as_secs()));
            }
        };

        if status.success() {
            return Ok(());
        }

        let stderr = match stderr_tail {
            Some(handle) => handle.await.ok().filter(|s| !s.is_empty()),
            None => None,
        };
        Err(MediaError::ffmpeg_failed(
            format!("ffmpeg exited with {}", status),
            stderr,
            status.code(),
        ))
    }
}

async fn tail(stderr: ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut kept = VecDeque::with_capacity(STDERR_TAIL_LINES);
    while let Ok(Some(line)) = lines.next_line().await {
        if kept.len() == STDERR_TAIL_LINES {
            kept.pop_front();
        }
        kept.push_back(line);
    }
    Vec::from(kept).join("\n")
}
