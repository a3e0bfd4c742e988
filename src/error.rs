//! Error types for the `posefeed` crate.
//!
//! This module defines [`ReplayError`], the unified error type returned by
//! every fallible operation in the crate. Configuration and start-up problems
//! surface here; per-frame anomalies (an undecodable frame, a missing mask)
//! are absorbed by the feeding loop and never become a `ReplayError`.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `posefeed` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReplayError {
    /// The video file could not be opened.
    #[error("Failed to open {path}: {reason}")]
    FileOpen {
        /// Path that was passed to the opener.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The requested frame number exceeds the total frame count.
    #[error("Frame {frame_number} is out of range (video has {total_frames} frames)")]
    FrameOutOfRange {
        /// The frame number that was requested.
        frame_number: u64,
        /// The total number of frames in the video.
        total_frames: u64,
    },

    /// The configured camera frame rate disagrees with the video's own rate.
    #[error("fps set error, the video FPS is {video} but the configuration expects {configured}")]
    FrameRateMismatch {
        /// Frame rate from the engine configuration (truncated).
        configured: i64,
        /// Frame rate of the video stream (rounded).
        video: i64,
    },

    /// The engine configuration file could not be read or parsed.
    #[error("Failed to load configuration from {path}: {reason}")]
    ConfigLoad {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// A run setting is outside its valid domain.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The camera setup cannot be driven from a single video stream.
    #[error("Invalid setup type: {0}")]
    UnsupportedSetup(String),

    /// Localization needs a persisted map but no map database path was given.
    #[error("A map database path is required for {0}")]
    MissingMapDatabase(&'static str),

    /// The pose-estimation engine reported a failure.
    #[error("Engine error: {0}")]
    Engine(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while loading a mask.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for ReplayError {
    fn from(error: FfmpegError) -> Self {
        ReplayError::FfmpegError(error.to_string())
    }
}
