//! The feeding loop.
//!
//! [`FeederTask`] walks a [`PlaybackPlan`] one physical frame at a time:
//! read, downsample, resolve the mask, feed (if the frame-skip policy
//! selects it), record the tracking time, advance the timestamp, check for
//! an engine-side stop request, and pace. When the plan is exhausted or a
//! stop is requested it waits for the engine's background optimization to
//! drain and, with auto-terminate, stops the viewer.
//!
//! ```text
//! Idle → Priming → Feeding → Draining → Terminating → Done
//! ```
//!
//! Per-frame problems (an empty read, a missing mask) only skip that frame;
//! nothing in the loop aborts the run.

use std::{
    borrow::Cow,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use image::{
    DynamicImage, GrayImage,
    imageops::{self, FilterType},
};

use crate::{
    configuration::RunConfig,
    engine::PoseEngine,
    error::ReplayError,
    mask::MaskProvider,
    pacing::PacingController,
    playback::{PlaybackPlan, PlaybackSequencer},
    progress::{NoOpProgress, ProgressCallback, ProgressTracker},
    track_time::TrackTimeRecorder,
    video::FrameSource,
    viewer::ViewerSink,
};

/// Emit per-frame debug lines every this many positions.
const LOG_INTERVAL: u64 = 60;

/// Poll period while waiting for background optimization to finish.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Where the feeder is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederState {
    Idle,
    Priming,
    Feeding,
    Draining,
    Terminating,
    Done,
}

/// How the engine is brought up before feeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Build a new map.
    Mapping,
    /// Track against a loaded map, optionally still extending it.
    Localization { mapping_enabled: bool },
}

/// What a finished feeding run produced.
#[derive(Debug, Clone)]
pub struct FeedOutcome {
    /// Plan positions visited, skipped frames included.
    pub visited: u64,
    /// Frames delivered to the engine.
    pub fed: u64,
    /// The engine asked to stop before the plan was exhausted.
    pub terminated_early: bool,
    /// Tracking time of every fed frame.
    pub track_times: TrackTimeRecorder,
}

/// The feeding thread's timestamp clock.
///
/// Advances once per visited position whether or not the frame was fed, so
/// the nominal frame period holds across skips and pass boundaries.
#[derive(Debug, Clone, Copy)]
struct FeedClock {
    frame_rate: f64,
    visited: u64,
}

impl FeedClock {
    fn new(frame_rate: f64) -> Self {
        Self {
            frame_rate,
            visited: 0,
        }
    }

    fn timestamp(&self) -> f64 {
        self.visited as f64 / self.frame_rate
    }

    fn advance(&mut self) {
        self.visited += 1;
    }
}

/// Drives frames from a [`FrameSource`](crate::FrameSource) into a
/// [`PoseEngine`].
pub struct FeederTask<'a> {
    config: &'a RunConfig,
    sequencer: PlaybackSequencer,
    pacing: PacingController,
    masks: MaskProvider,
    progress: Arc<dyn ProgressCallback>,
    state: FeederState,
}

impl<'a> FeederTask<'a> {
    /// A feeder for `config`, using `masks` for every frame.
    pub fn new(config: &'a RunConfig, masks: MaskProvider) -> Self {
        Self {
            config,
            sequencer: PlaybackSequencer::new(config.frame_skip),
            pacing: PacingController::new(config.frame_rate, config.no_sleep),
            masks,
            progress: Arc::new(NoOpProgress),
            state: FeederState::Idle,
        }
    }

    /// Report per-frame progress to `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    pub fn state(&self) -> FeederState {
        self.state
    }

    pub fn sequencer(&self) -> PlaybackSequencer {
        self.sequencer
    }

    /// Start the engine and set its mapping module for `mode`.
    ///
    /// # Errors
    ///
    /// Propagates the engine's start-up failure; the feeder stays `Priming`.
    pub fn prime(&mut self, engine: &mut dyn PoseEngine, mode: StartMode) -> Result<(), ReplayError> {
        self.state = FeederState::Priming;
        match mode {
            StartMode::Mapping => engine.startup(false)?,
            StartMode::Localization { mapping_enabled } => {
                engine.startup(true)?;
                if mapping_enabled {
                    engine.enable_mapping_module();
                } else {
                    engine.disable_mapping_module();
                }
            }
        }
        Ok(())
    }

    /// Feed the whole plan, drain, and release the viewer if configured.
    pub fn run(
        &mut self,
        engine: &mut dyn PoseEngine,
        source: &mut dyn FrameSource,
        plan: PlaybackPlan,
        viewer: &dyn ViewerSink,
    ) -> FeedOutcome {
        self.state = FeederState::Feeding;

        let frame_count = plan.frame_count();
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.progress),
            plan.pass_count(),
            Some(plan.total_entries()),
        );
        let expected_feeds = frame_count.div_ceil(self.sequencer.frame_skip())
            * u64::from(plan.pass_count());
        let mut track_times = TrackTimeRecorder::with_capacity(expected_feeds as usize);
        let mut clock = FeedClock::new(self.config.frame_rate);
        let mut fed_count = 0u64;
        let mut terminated_early = false;

        'plan: for pass in plan.passes() {
            log::info!(
                "playback pass {}/{}: {} video sequence",
                pass.number() + 1,
                plan.pass_count(),
                pass.direction()
            );

            for entry in pass.entries() {
                let index = entry.physical_index;
                let started = Instant::now();

                let frame = source
                    .read(index)
                    .map(|frame| downsample(frame, self.config.downsample_scalar));
                let extracted = Instant::now();

                let mask = self.masks.resolve(index);
                if entry.position % LOG_INTERVAL == 0 {
                    if let Some(mask_path) = self.masks.indexed_path(index) {
                        log::debug!("load mask file: {}", mask_path.display());
                    }
                }

                let timestamp = clock.timestamp();
                let fed = match &frame {
                    Some(image) if self.sequencer.should_feed(index) => {
                        let mask = mask.map(|mask| align_mask(mask, image));
                        engine.feed_frame(image, timestamp, mask.as_deref());
                        true
                    }
                    Some(_) => false,
                    None => {
                        log::debug!("frame {index} is empty; not fed");
                        false
                    }
                };

                let track_time = extracted.elapsed();
                if fed {
                    track_times.record(track_time);
                    fed_count += 1;
                }

                clock.advance();
                tracker.advance(pass.number(), pass.direction(), index, timestamp, fed);

                if entry.position % LOG_INTERVAL == 0 {
                    log::debug!(
                        "frame {}/{frame_count} use time (s): {:.4} extracting frame use time (s): {:.4}",
                        entry.position,
                        started.elapsed().as_secs_f64(),
                        (extracted - started).as_secs_f64(),
                    );
                }

                if engine.terminate_is_requested() {
                    log::info!("termination requested at frame {index}; abandoning playback");
                    terminated_early = true;
                    break 'plan;
                }

                self.pacing.pace(track_time, entry.is_last_in_pass);
            }
        }

        self.state = FeederState::Draining;
        drain(&*engine);

        self.state = FeederState::Terminating;
        if self.config.auto_terminate {
            viewer.request_terminate();
        }

        self.state = FeederState::Done;
        FeedOutcome {
            visited: clock.visited,
            fed: fed_count,
            terminated_early,
            track_times,
        }
    }
}

/// Block until the engine's background optimization is idle.
pub fn drain(engine: &dyn PoseEngine) {
    if !engine.background_optimization_running() {
        return;
    }
    log::info!("waiting for loop bundle adjustment to finish");
    let started = Instant::now();
    while engine.background_optimization_running() {
        thread::sleep(DRAIN_POLL_INTERVAL);
    }
    log::info!(
        "loop bundle adjustment finished after {:.3}s",
        started.elapsed().as_secs_f64()
    );
}

/// Resize by `scalar` in both dimensions; `1.0` returns the frame untouched.
fn downsample(frame: DynamicImage, scalar: f64) -> DynamicImage {
    if scalar == 1.0 {
        return frame;
    }
    let width = ((f64::from(frame.width()) * scalar).round() as u32).max(1);
    let height = ((f64::from(frame.height()) * scalar).round() as u32).max(1);
    frame.resize_exact(width, height, FilterType::Triangle)
}

/// Bring a mask to the frame's size so the pair stays pixel-aligned.
fn align_mask<'m>(mask: Cow<'m, GrayImage>, frame: &DynamicImage) -> Cow<'m, GrayImage> {
    if mask.dimensions() == (frame.width(), frame.height()) {
        return mask;
    }
    Cow::Owned(imageops::resize(
        &*mask,
        frame.width(),
        frame.height(),
        FilterType::Nearest,
    ))
}
