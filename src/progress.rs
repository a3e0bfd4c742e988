//! Progress reporting and cooperative cancellation.
//!
//! The feeding loop reports one [`ProgressInfo`] per visited frame through a
//! [`ProgressCallback`]; viewers and command-line front ends subscribe to it.
//! [`CancellationToken`] carries a user's request to stop (for example from
//! a Ctrl-C handler) to everything that polls it.
//!
//! # Example
//!
//! ```
//! use posefeed::{ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("pass {} ({}) {pct:.1}%", info.pass + 1, info.direction);
//!         }
//!     }
//! }
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::playback::Direction;

/// A snapshot of feeding progress, taken after each visited frame.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// 0-indexed pass currently playing.
    pub pass: u32,
    /// Total number of passes in the plan.
    pub passes: u32,
    /// Direction of the current pass.
    pub direction: Direction,
    /// Positions visited so far across all passes.
    pub current: u64,
    /// Positions in the whole plan, if known.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time since feeding started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Physical index of the frame just visited.
    pub frame_index: u64,
    /// Timestamp assigned to that frame, in seconds.
    pub timestamp: f64,
    /// Whether the frame was delivered to the engine.
    pub fed: bool,
}

/// Receives progress updates from the feeding thread.
///
/// Implementations must be [`Send`] and [`Sync`]: the callback is invoked on
/// the feeding thread while other threads may read whatever it publishes.
/// Callbacks observe only; they cannot halt the run.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clones share state; [`cancel`](CancellationToken::cancel) from any thread
/// is observed by every clone.
///
/// ```
/// use posefeed::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks timing across a run and emits [`ProgressInfo`] snapshots.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    passes: u32,
    total: Option<u64>,
    current: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, passes: u32, total: Option<u64>) -> Self {
        Self {
            callback,
            passes,
            total,
            current: 0,
            start_time: Instant::now(),
        }
    }

    /// Record one visited position and notify the callback.
    pub(crate) fn advance(
        &mut self,
        pass: u32,
        direction: Direction,
        frame_index: u64,
        timestamp: f64,
        fed: bool,
    ) {
        self.current += 1;

        let elapsed = self.start_time.elapsed();
        let percentage = self
            .total
            .filter(|&total| total > 0)
            .map(|total| (self.current as f32 / total as f32) * 100.0);
        let estimated_remaining = self.total.map(|total| {
            let remaining = total.saturating_sub(self.current);
            elapsed.div_f64(self.current as f64).mul_f64(remaining as f64)
        });

        let info = ProgressInfo {
            pass,
            passes: self.passes,
            direction,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            frame_index,
            timestamp,
            fed,
        };

        self.callback.on_progress(&info);
    }
}
