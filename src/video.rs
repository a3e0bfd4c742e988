//! Indexed frame retrieval from a recorded video.
//!
//! [`FrameSource`] is the seam the feeding loop reads through: metadata plus
//! random access by frame index. [`VideoFile`] implements it on top of
//! FFmpeg. Every [`read`](FrameSource::read) seeks to the nearest keyframe
//! before the target and decodes forward, so forward and reverse playback
//! cost the same per frame.

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    codec::context::Context as CodecContext,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};
use image::{DynamicImage, RgbImage};

use crate::{error::ReplayError, metadata::VideoMetadata};

/// Random-access source of decoded frames.
///
/// Implementations must be [`Send`]: the source is handed to the feeding
/// thread for the duration of a run and only that thread touches it.
pub trait FrameSource: Send {
    /// Stream metadata (frame count and rate are what the driver uses).
    fn metadata(&self) -> &VideoMetadata;

    /// Decode the frame at `index`.
    ///
    /// Returns `None` when the index is invalid or decoding fails. Callers
    /// treat that as "nothing to feed for this index" and move on.
    fn read(&mut self, index: u64) -> Option<DynamicImage>;
}

/// An FFmpeg-backed video file opened for indexed frame reads.
///
/// # Example
///
/// ```no_run
/// use posefeed::{FrameSource, VideoFile};
///
/// let mut video = VideoFile::open("walkthrough.mp4")?;
/// println!("{}", video.metadata());
/// if let Some(frame) = video.read(0) {
///     println!("{}x{}", frame.width(), frame.height());
/// }
/// # Ok::<(), posefeed::ReplayError>(())
/// ```
pub struct VideoFile {
    input_context: Input,
    video_stream_index: usize,
    metadata: VideoMetadata,
    path: PathBuf,
}

impl std::fmt::Debug for VideoFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFile")
            .field("metadata", &self.metadata)
            .field("video_stream_index", &self.video_stream_index)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl VideoFile {
    /// Open a video file and cache its stream metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::FileOpen`] if the file cannot be opened or its
    /// codec parameters cannot be read, and [`ReplayError::NoVideoStream`] if
    /// it has no video track.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
        let path = path.as_ref().to_path_buf();

        log::debug!("Opening video file: {}", path.display());

        ffmpeg_next::init().map_err(|error| ReplayError::FileOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| ReplayError::FileOpen {
                path: path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(ReplayError::NoVideoStream)?;
        let video_stream_index = stream.index();

        let decoder_context =
            CodecContext::from_parameters(stream.parameters()).map_err(|error| {
                ReplayError::FileOpen {
                    path: path.clone(),
                    reason: format!("Failed to read video codec parameters: {error}"),
                }
            })?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| ReplayError::FileOpen {
                path: path.clone(),
                reason: format!("Failed to create video decoder: {error}"),
            })?;

        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            let rate = stream.rate();
            if rate.denominator() != 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            }
        };

        let duration_microseconds = input_context.duration();
        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else if duration_microseconds > 0 && frames_per_second > 0.0 {
            (duration_microseconds as f64 / 1_000_000.0 * frames_per_second) as u64
        } else {
            0
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            codec,
        };

        Ok(Self {
            input_context,
            video_stream_index,
            metadata,
            path,
        })
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode a single frame by number (0-indexed).
    ///
    /// # Errors
    ///
    /// - [`ReplayError::FrameOutOfRange`] if `frame_number` is past the end.
    /// - [`ReplayError::VideoDecodeError`] if the frame cannot be located.
    /// - [`ReplayError::FfmpegError`] for decoder or seek failures.
    pub fn decode_frame(&mut self, frame_number: u64) -> Result<DynamicImage, ReplayError> {
        let total_frames = self.metadata.frame_count;
        if total_frames > 0 && frame_number >= total_frames {
            return Err(ReplayError::FrameOutOfRange {
                frame_number,
                total_frames,
            });
        }

        let frames_per_second = self.metadata.frames_per_second;
        let width = self.metadata.width;
        let height = self.metadata.height;

        let stream = self
            .input_context
            .stream(self.video_stream_index)
            .ok_or(ReplayError::NoVideoStream)?;
        let time_base = stream.time_base();
        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let mut decoder = decoder_context.decoder().video()?;

        let mut scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        let seek_timestamp =
            crate::utilities::frame_number_to_seek_timestamp(frame_number, frames_per_second);
        self.input_context.seek(seek_timestamp, ..seek_timestamp)?;

        let mut decoded_frame = VideoFrame::empty();
        let mut rgb_frame = VideoFrame::empty();

        for (stream, packet) in self.input_context.packets() {
            if stream.index() != self.video_stream_index {
                continue;
            }

            decoder.send_packet(&packet)?;

            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                let pts = decoded_frame.timestamp().unwrap_or(0);
                let current_frame_number =
                    crate::utilities::pts_to_frame_number(pts, time_base, frames_per_second);

                // A seek can land past an index the container does not carry
                // exactly; the next decoded frame stands in for it.
                if current_frame_number >= frame_number {
                    scaler.run(&decoded_frame, &mut rgb_frame)?;
                    return convert_frame_to_image(&rgb_frame, width, height);
                }
            }
        }

        decoder.send_eof()?;
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            let pts = decoded_frame.timestamp().unwrap_or(0);
            let current_frame_number =
                crate::utilities::pts_to_frame_number(pts, time_base, frames_per_second);

            if current_frame_number >= frame_number {
                scaler.run(&decoded_frame, &mut rgb_frame)?;
                return convert_frame_to_image(&rgb_frame, width, height);
            }
        }

        Err(ReplayError::VideoDecodeError(format!(
            "Could not locate frame {frame_number} in the video stream"
        )))
    }
}

impl FrameSource for VideoFile {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn read(&mut self, index: u64) -> Option<DynamicImage> {
        match self.decode_frame(index) {
            Ok(image) => Some(image),
            Err(error) => {
                log::debug!("frame {index} unavailable: {error}");
                None
            }
        }
    }
}

/// Convert a scaled RGB24 video frame to an [`image::DynamicImage`].
fn convert_frame_to_image(
    rgb_frame: &VideoFrame,
    width: u32,
    height: u32,
) -> Result<DynamicImage, ReplayError> {
    let buffer = crate::utilities::frame_to_buffer(rgb_frame, width, height, 3);
    let rgb_image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
        ReplayError::VideoDecodeError(
            "Failed to construct RGB image from decoded frame data".to_string(),
        )
    })?;
    Ok(DynamicImage::ImageRgb8(rgb_image))
}

/// Tune FFmpeg's own console output.
///
/// This is separate from the `log` facade used by the rest of the crate:
/// decoder warnings go straight to stderr unless silenced here.
pub fn set_decoder_log_level(verbose: bool) {
    let level = if verbose { Level::Info } else { Level::Error };
    ffmpeg_next::util::log::set_level(level);
}
