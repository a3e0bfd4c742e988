//! Internal utility functions.
//!
//! Helpers for pixel-data copying and frame-number conversion shared by the
//! video decoder.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × bpp).
/// The padding is stripped so the result can be passed to
/// [`image::RgbImage::from_raw`].
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Rescale a PTS value to a frame number.
pub(crate) fn pts_to_frame_number(pts: i64, time_base: Rational, frames_per_second: f64) -> u64 {
    let seconds = pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64;
    (seconds * frames_per_second).round().max(0.0) as u64
}

/// Convert a frame number to a seek timestamp in AV_TIME_BASE (microseconds).
///
/// `Input::seek` goes through `avformat_seek_file` with `stream_index = -1`,
/// which expects container-level AV_TIME_BASE units.
pub(crate) fn frame_number_to_seek_timestamp(frame_number: u64, frames_per_second: f64) -> i64 {
    let seconds = frame_number as f64 / frames_per_second;
    (seconds * 1_000_000.0) as i64
}

/// Zero-padded file name of the per-frame mask for `index`.
pub(crate) fn mask_file_name(index: u64) -> String {
    format!("{index:04}.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pts_conversion_uses_time_base() {
        let time_base = Rational::new(1, 90_000);
        assert_eq!(pts_to_frame_number(0, time_base, 30.0), 0);
        assert_eq!(pts_to_frame_number(3_000, time_base, 30.0), 1);
        assert_eq!(pts_to_frame_number(90_000, time_base, 30.0), 30);
    }

    #[test]
    fn seek_timestamp_is_microseconds() {
        assert_eq!(frame_number_to_seek_timestamp(0, 30.0), 0);
        assert_eq!(frame_number_to_seek_timestamp(30, 30.0), 1_000_000);
        assert_eq!(frame_number_to_seek_timestamp(15, 30.0), 500_000);
    }

    #[test]
    fn mask_names_are_four_digit_padded() {
        assert_eq!(mask_file_name(0), "0000.jpg");
        assert_eq!(mask_file_name(42), "0042.jpg");
        assert_eq!(mask_file_name(12345), "12345.jpg");
    }
}
