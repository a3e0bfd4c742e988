//! Real-time pacing between frames.
//!
//! Recorded frames are available instantly; a live camera delivers one every
//! `1 / fps` seconds. [`PacingController`] sleeps away whatever part of that
//! period the current frame's processing did not use, so the engine sees
//! camera-like timing.

use std::{thread, time::Duration};

/// Computes (and optionally performs) the wait before the next frame.
#[derive(Debug, Clone, Copy)]
pub struct PacingController {
    frame_period: Duration,
    enabled: bool,
}

impl PacingController {
    /// Pace at `frame_rate` Hz, or not at all when `no_sleep` is set.
    ///
    /// A rate with no representable period (zero, negative, NaN) never waits.
    pub fn new(frame_rate: f64, no_sleep: bool) -> Self {
        let frame_period =
            Duration::try_from_secs_f64(frame_rate.recip()).unwrap_or_else(|_| {
                log::warn!("frame rate {frame_rate} has no usable period; pacing disabled");
                Duration::ZERO
            });
        Self {
            frame_period,
            enabled: !no_sleep && !frame_period.is_zero(),
        }
    }

    /// Whether waits are ever non-zero.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The wait owed after a frame that took `elapsed` to process.
    ///
    /// `max(0, period - elapsed)`; always zero when pacing is disabled or
    /// after the last frame of a pass.
    pub fn wait_time(&self, elapsed: Duration, is_last_in_pass: bool) -> Duration {
        if !self.enabled || is_last_in_pass {
            return Duration::ZERO;
        }
        self.frame_period.saturating_sub(elapsed)
    }

    /// Sleep for [`wait_time`](PacingController::wait_time) and return it.
    pub fn pace(&self, elapsed: Duration, is_last_in_pass: bool) -> Duration {
        let wait = self.wait_time(elapsed, is_last_in_pass);
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        wait
    }
}
