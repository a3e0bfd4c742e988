//! Run lifecycle: start-up, concurrent feeding and viewing, shutdown, export.
//!
//! [`LifecycleCoordinator`] sequences one run:
//!
//! 1. check the camera frame rate against the video,
//! 2. load the map (localization) and start the engine,
//! 3. feed on a scoped background thread while the viewer runs on the
//!    calling thread,
//! 4. join the feeder (it has already drained background optimization),
//! 5. shut the engine down,
//! 6. export the map or trajectory, and summarise tracking times.
//!
//! Exports never start before shutdown, so persisted files reflect the
//! engine's final state. [`reconstruct`] chains runs according to the
//! configured [`ReconstructionType`].

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
    sync::Arc,
    thread,
};

use crate::{
    configuration::{ReconstructionType, RunConfig, verify_frame_rate},
    engine::{PoseEngine, TrajectoryFormat},
    error::ReplayError,
    feeder::{FeedOutcome, FeederTask, StartMode},
    mask::MaskProvider,
    playback::PlaybackPlan,
    progress::{NoOpProgress, ProgressCallback},
    track_time::TrackTimeSummary,
    video::FrameSource,
    viewer::ViewerSink,
};

const FRAME_TRAJECTORY_FILE: &str = "frame_trajectory.txt";
const TRACK_TIMES_FILE: &str = "track_times.txt";

/// Which half of a reconstruction a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Mapping,
    Localization,
}

impl Display for RunMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RunMode::Mapping => f.write_str("slam"),
            RunMode::Localization => f.write_str("localization"),
        }
    }
}

/// Result of one completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: RunMode,
    /// Plan positions visited.
    pub visited: u64,
    /// Frames delivered to the engine.
    pub fed: u64,
    /// The engine asked to stop before the plan was exhausted.
    pub terminated_early: bool,
    /// Tracking-time statistics; `None` when no frame was fed.
    pub summary: Option<TrackTimeSummary>,
    /// Files written after shutdown.
    pub exported: Vec<PathBuf>,
}

/// Sequences start-up, feeding, shutdown and export for single runs.
pub struct LifecycleCoordinator<'a> {
    config: &'a RunConfig,
    progress: Arc<dyn ProgressCallback>,
}

impl<'a> LifecycleCoordinator<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self {
            config,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Forward per-frame progress to `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Build a map from the video, replaying it `repeat_passes` times.
    ///
    /// Saves the map when `map_db_path` is set, and with `eval_log` writes
    /// the frame trajectory and raw tracking times.
    ///
    /// # Errors
    ///
    /// Configuration, frame-rate, start-up and export failures.
    pub fn run_mapping(
        &self,
        engine: &mut dyn PoseEngine,
        source: &mut dyn FrameSource,
        viewer: &dyn ViewerSink,
    ) -> Result<RunReport, ReplayError> {
        self.check_preconditions(source)?;
        log::info!("run slam step with video: {}", source.metadata());

        let mut feeder = self.feeder();
        feeder.prime(engine, StartMode::Mapping)?;
        let plan = feeder
            .sequencer()
            .plan(source.metadata().frame_count, self.config.repeat_passes);

        let outcome = feed_concurrently(feeder, engine, source, plan, viewer);
        engine.shutdown();
        let mut outcome = outcome?;

        let mut exported = Vec::new();
        if let Some(map_db_path) = &self.config.map_db_path {
            engine.save_persisted_map(map_db_path)?;
            log::info!("saved map database to {}", map_db_path.display());
            exported.push(map_db_path.clone());
        }
        if self.config.eval_log {
            let trajectory = self.config.eval_output_dir.join(FRAME_TRAJECTORY_FILE);
            engine.export_trajectory(&trajectory, TrajectoryFormat::Tum)?;
            exported.push(trajectory);
            exported.push(self.write_track_times(&outcome)?);
        }

        Ok(report(RunMode::Mapping, &mut outcome, exported))
    }

    /// Localize against the map at `map_db_path`: a single forward pass,
    /// with the mapping module on or off per `mapping_enabled`.
    ///
    /// Writes the TUM trajectory to `trajectory_path`, or
    /// `frame_trajectory.txt` in the evaluation directory when unset.
    ///
    /// # Errors
    ///
    /// [`ReplayError::MissingMapDatabase`] without a map path, plus
    /// configuration, frame-rate, map-load, start-up and export failures.
    pub fn run_localization(
        &self,
        engine: &mut dyn PoseEngine,
        source: &mut dyn FrameSource,
        viewer: &dyn ViewerSink,
    ) -> Result<RunReport, ReplayError> {
        self.check_preconditions(source)?;
        let map_db_path = self
            .config
            .map_db_path
            .as_deref()
            .ok_or(ReplayError::MissingMapDatabase("localization"))?;
        log::info!("run localization step with video: {}", source.metadata());

        engine.load_persisted_map(map_db_path)?;
        let mut feeder = self.feeder();
        feeder.prime(
            engine,
            StartMode::Localization {
                mapping_enabled: self.config.mapping_enabled,
            },
        )?;
        let plan = feeder.sequencer().plan(source.metadata().frame_count, 1);

        let outcome = feed_concurrently(feeder, engine, source, plan, viewer);
        engine.shutdown();
        let mut outcome = outcome?;

        let trajectory = self
            .config
            .trajectory_path
            .clone()
            .unwrap_or_else(|| self.config.eval_output_dir.join(FRAME_TRAJECTORY_FILE));
        engine.export_trajectory(&trajectory, TrajectoryFormat::Tum)?;
        let mut exported = vec![trajectory];
        if self.config.eval_log {
            exported.push(self.write_track_times(&outcome)?);
        }

        Ok(report(RunMode::Localization, &mut outcome, exported))
    }

    fn check_preconditions(&self, source: &dyn FrameSource) -> Result<(), ReplayError> {
        self.config.validate()?;
        verify_frame_rate(self.config.frame_rate, source.metadata().frames_per_second)
    }

    fn feeder(&self) -> FeederTask<'a> {
        let masks = MaskProvider::resolve_policy(self.config.mask_path.as_deref());
        log::debug!("mask policy: {}", masks.policy_name());
        FeederTask::new(self.config, masks).with_progress(Arc::clone(&self.progress))
    }

    fn write_track_times(&self, outcome: &FeedOutcome) -> Result<PathBuf, ReplayError> {
        let path = self.config.eval_output_dir.join(TRACK_TIMES_FILE);
        outcome.track_times.write_to(&path)?;
        Ok(path)
    }
}

/// Terminates the viewer if the feeding thread unwinds, so the viewer's
/// blocking loop on the calling thread can return and the scope can join.
struct ReleaseViewerOnPanic<'v> {
    viewer: &'v dyn ViewerSink,
}

impl Drop for ReleaseViewerOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.viewer.request_terminate();
        }
    }
}

/// Run `feeder` on a scoped thread while `viewer` runs on this one.
fn feed_concurrently(
    mut feeder: FeederTask<'_>,
    engine: &mut dyn PoseEngine,
    source: &mut dyn FrameSource,
    plan: PlaybackPlan,
    viewer: &dyn ViewerSink,
) -> Result<FeedOutcome, ReplayError> {
    thread::scope(|scope| {
        let feeding = thread::Builder::new()
            .name("feeder".to_string())
            .spawn_scoped(scope, move || {
                let _release = ReleaseViewerOnPanic { viewer };
                feeder.run(engine, source, plan, viewer)
            })?;

        viewer.run();

        feeding
            .join()
            .map_err(|_| ReplayError::Engine("feeding thread panicked".to_string()))
    })
}

fn report(mode: RunMode, outcome: &mut FeedOutcome, exported: Vec<PathBuf>) -> RunReport {
    let summary = outcome.track_times.summarize();
    match &summary {
        Some(summary) => {
            log::info!("median tracking time: {:.6}[s]", summary.median);
            log::info!("mean tracking time: {:.6}[s]", summary.mean);
        }
        None => log::warn!("no frames were fed; tracking time statistics unavailable"),
    }

    RunReport {
        mode,
        visited: outcome.visited,
        fed: outcome.fed,
        terminated_early: outcome.terminated_early,
        summary,
        exported,
    }
}

/// The visualization half of a session.
pub struct Visualization {
    pub viewer: Arc<dyn ViewerSink>,
    /// Receives per-frame progress, typically the viewer itself.
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

/// Creates the collaborators of each run.
///
/// [`reconstruct`] asks for a fresh source, engine and viewer per run; the
/// source is opened first so a frame-rate mismatch is caught before any
/// engine exists.
pub trait SessionFactory {
    fn open_source(&mut self) -> Result<Box<dyn FrameSource>, ReplayError>;

    fn open_engine(&mut self, mode: RunMode) -> Result<Box<dyn PoseEngine>, ReplayError>;

    fn open_viewer(&mut self, mode: RunMode) -> Visualization;
}

/// Run the reconstruction selected by `config.reconstruction`.
///
/// `Full` maps first and then localizes against the map the mapping run
/// saved to `map_db_path`; it stops after mapping if that run was
/// terminated early.
///
/// # Errors
///
/// The first failing run's error. `Full` and `Localization` without a map
/// path fail with [`ReplayError::MissingMapDatabase`] before anything opens.
pub fn reconstruct(
    config: &RunConfig,
    factory: &mut dyn SessionFactory,
) -> Result<Vec<RunReport>, ReplayError> {
    config.validate()?;

    let modes: &[RunMode] = match config.reconstruction {
        ReconstructionType::Slam => &[RunMode::Mapping],
        ReconstructionType::Localization => {
            if config.map_db_path.is_none() {
                return Err(ReplayError::MissingMapDatabase("localization"));
            }
            &[RunMode::Localization]
        }
        ReconstructionType::Full => {
            if config.map_db_path.is_none() {
                return Err(ReplayError::MissingMapDatabase("full reconstruction"));
            }
            &[RunMode::Mapping, RunMode::Localization]
        }
    };

    let mut reports = Vec::with_capacity(modes.len());
    for &mode in modes {
        let mut source = factory.open_source()?;
        verify_frame_rate(config.frame_rate, source.metadata().frames_per_second)?;
        let mut engine = factory.open_engine(mode)?;
        let visualization = factory.open_viewer(mode);

        let mut coordinator = LifecycleCoordinator::new(config);
        if let Some(progress) = visualization.progress {
            coordinator = coordinator.with_progress(progress);
        }

        let report = match mode {
            RunMode::Mapping => coordinator.run_mapping(
                engine.as_mut(),
                source.as_mut(),
                visualization.viewer.as_ref(),
            )?,
            RunMode::Localization => coordinator.run_localization(
                engine.as_mut(),
                source.as_mut(),
                visualization.viewer.as_ref(),
            )?,
        };

        let stop = report.terminated_early;
        reports.push(report);
        if stop {
            log::warn!("{mode} run was terminated early; skipping remaining runs");
            break;
        }
    }

    Ok(reports)
}
