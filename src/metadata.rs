//! Video stream metadata.
//!
//! [`VideoMetadata`] is read once when a [`VideoFile`](crate::VideoFile) is
//! opened and cached for its lifetime. The replay driver needs the frame
//! count (to build the playback plan) and the frame rate (to check it
//! against the camera configuration); the rest is reported for diagnostics.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Metadata for a video stream.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Total number of frames. Taken from the container when it reports one,
    /// otherwise estimated from duration and frame rate.
    pub frame_count: u64,
    /// Codec name (e.g. `"h264"`, `"hevc"`).
    pub codec: String,
}

impl Display for VideoMetadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "fps: {}, frame number: {}, frame height: {}, frame width: {}, codec: {}",
            (self.frames_per_second + 0.5) as i64,
            self.frame_count,
            self.height,
            self.width,
            self.codec,
        )
    }
}
