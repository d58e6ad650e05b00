//! FFmpeg CLI wrapper.
//!
//! This crate provides:
//! - An FFmpeg command builder and a runner with timeout
//! - FFprobe metadata (duration, frame rate, frame count)
//! - The transcode encoder used by the worker
//! - Frame sampling for visual summaries
//! - Per-job scratch directories

pub mod command;
pub mod encode;
pub mod error;
pub mod frames;
pub mod fs_utils;
pub mod probe;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use encode::{transcode_command, Encoder, FfmpegEncoder};
pub use error::{MediaError, MediaResult};
pub use frames::{
    frame_index, FfmpegFrameSampler, FrameSampler, SampledFrame, DEFAULT_FRAME_TIMEOUT,
};
pub use fs_utils::{sweep_scratch, ScratchDir};
pub use probe::{probe_video, VideoInfo};
