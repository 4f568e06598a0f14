//! FFmpeg CLI wrapper for stitching generated media.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - A runner with timeout and stderr capture
//! - Atomic file placement helpers
//! - The audio/video stitcher and its degradation policy

pub mod command;
pub mod error;
pub mod fs_utils;
pub mod stitch;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{move_file, partial_path, write_file_atomic};
pub use stitch::{FfmpegStitcher, MediaStitcher, StitchConfig, StitchOutcome, MIN_AUDIO_BYTES};
