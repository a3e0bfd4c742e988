//! Run lifecycle and reconstruction-mode tests using the dry-run engine.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use image::{DynamicImage, GrayImage, RgbImage};
use posefeed::{
    CancellationToken, DryRunEngine, FrameSource, HeadlessViewer, LifecycleCoordinator,
    PoseEngine, ReconstructionType, ReplayError, RunConfig, RunMode, SessionFactory,
    TrajectoryFormat, VideoMetadata, Visualization, reconstruct,
};

struct SyntheticVideo {
    metadata: VideoMetadata,
}

impl SyntheticVideo {
    fn new(frame_count: u64, frames_per_second: f64) -> Self {
        Self {
            metadata: VideoMetadata {
                width: 4,
                height: 4,
                frames_per_second,
                frame_count,
                codec: "raw".to_string(),
            },
        }
    }
}

impl FrameSource for SyntheticVideo {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn read(&mut self, index: u64) -> Option<DynamicImage> {
        (index < self.metadata.frame_count).then(|| DynamicImage::ImageRgb8(RgbImage::new(4, 4)))
    }
}

fn vocabulary(directory: &Path) -> PathBuf {
    let path = directory.join("orb_vocab.dbow2");
    fs::write(&path, b"vocab").unwrap();
    path
}

fn base_config(directory: &Path) -> RunConfig {
    RunConfig::new(30.0)
        .with_no_sleep(true)
        .with_auto_terminate(true)
        .with_eval_output_dir(directory)
}

struct TestSession {
    vocabulary: PathBuf,
    frame_count: u64,
    frames_per_second: f64,
    engines_opened: Vec<RunMode>,
}

impl TestSession {
    fn new(directory: &Path, frame_count: u64) -> Self {
        Self {
            vocabulary: vocabulary(directory),
            frame_count,
            frames_per_second: 30.0,
            engines_opened: Vec::new(),
        }
    }
}

impl SessionFactory for TestSession {
    fn open_source(&mut self) -> Result<Box<dyn FrameSource>, ReplayError> {
        Ok(Box::new(SyntheticVideo::new(
            self.frame_count,
            self.frames_per_second,
        )))
    }

    fn open_engine(&mut self, mode: RunMode) -> Result<Box<dyn PoseEngine>, ReplayError> {
        self.engines_opened.push(mode);
        Ok(Box::new(DryRunEngine::new(
            &self.vocabulary,
            CancellationToken::new(),
        )?))
    }

    fn open_viewer(&mut self, _mode: RunMode) -> Visualization {
        Visualization {
            viewer: Arc::new(HeadlessViewer::new()),
            progress: None,
        }
    }
}

// ── Mapping ──────────────────────────────────────────────────────

#[test]
fn mapping_saves_map_and_summarizes() {
    let directory = tempfile::tempdir().unwrap();
    let map_path = directory.path().join("map.json");
    let config = base_config(directory.path()).with_map_db_path(&map_path);
    let mut engine =
        DryRunEngine::new(vocabulary(directory.path()), CancellationToken::new()).unwrap();
    let mut video = SyntheticVideo::new(12, 30.0);
    let viewer = HeadlessViewer::new();

    let report = LifecycleCoordinator::new(&config)
        .run_mapping(&mut engine, &mut video, &viewer)
        .unwrap();

    assert_eq!(report.mode, RunMode::Mapping);
    assert_eq!(report.visited, 24);
    assert_eq!(report.fed, 24);
    assert!(!report.terminated_early);
    assert_eq!(report.summary.unwrap().samples, 24);
    assert_eq!(report.exported, [map_path.clone()]);
    assert!(map_path.is_file());
    assert!(!engine.is_running());
}

#[test]
fn mapping_eval_log_writes_trajectory_and_track_times() {
    let directory = tempfile::tempdir().unwrap();
    let config = base_config(directory.path())
        .with_repeat_passes(1)
        .with_eval_log(true);
    let mut engine =
        DryRunEngine::new(vocabulary(directory.path()), CancellationToken::new()).unwrap();
    let mut video = SyntheticVideo::new(5, 30.0);

    LifecycleCoordinator::new(&config)
        .run_mapping(&mut engine, &mut video, &HeadlessViewer::new())
        .unwrap();

    let trajectory = fs::read_to_string(directory.path().join("frame_trajectory.txt")).unwrap();
    assert_eq!(trajectory.lines().count(), 5);
    let track_times = fs::read_to_string(directory.path().join("track_times.txt")).unwrap();
    assert_eq!(track_times.lines().count(), 5);
}

#[test]
fn frame_rate_mismatch_aborts_before_startup() {
    let directory = tempfile::tempdir().unwrap();
    let config = base_config(directory.path());
    let mut engine =
        DryRunEngine::new(vocabulary(directory.path()), CancellationToken::new()).unwrap();
    let mut video = SyntheticVideo::new(5, 25.0);

    let result = LifecycleCoordinator::new(&config).run_mapping(
        &mut engine,
        &mut video,
        &HeadlessViewer::new(),
    );

    assert!(matches!(
        result,
        Err(ReplayError::FrameRateMismatch {
            configured: 30,
            video: 25
        })
    ));
    assert!(!engine.is_running());
    assert!(engine.tracked_timestamps().is_empty());
}

#[test]
fn ntsc_rate_matches_thirty_fps_camera() {
    let directory = tempfile::tempdir().unwrap();
    let config = base_config(directory.path()).with_repeat_passes(1);
    let mut engine =
        DryRunEngine::new(vocabulary(directory.path()), CancellationToken::new()).unwrap();
    let mut video = SyntheticVideo::new(3, 29.97);

    let report = LifecycleCoordinator::new(&config)
        .run_mapping(&mut engine, &mut video, &HeadlessViewer::new())
        .unwrap();
    assert_eq!(report.fed, 3);
}

#[test]
fn viewer_closed_by_user_still_joins_feeder() {
    let directory = tempfile::tempdir().unwrap();
    let config = base_config(directory.path())
        .with_auto_terminate(false)
        .with_repeat_passes(1);
    let mut engine =
        DryRunEngine::new(vocabulary(directory.path()), CancellationToken::new()).unwrap();
    let mut video = SyntheticVideo::new(8, 30.0);
    let user_stop = CancellationToken::new();
    user_stop.cancel();
    let viewer = HeadlessViewer::new().with_user_stop(user_stop);

    let report = LifecycleCoordinator::new(&config)
        .run_mapping(&mut engine, &mut video, &viewer)
        .unwrap();
    assert_eq!(report.fed, 8);
}

// ── Feeding-thread failure ───────────────────────────────────────

struct PanickingEngine;

impl PoseEngine for PanickingEngine {
    fn startup(&mut self, _require_existing_map: bool) -> Result<(), ReplayError> {
        Ok(())
    }

    fn shutdown(&mut self) {}

    fn enable_mapping_module(&mut self) {}

    fn disable_mapping_module(&mut self) {}

    fn load_persisted_map(&mut self, _path: &Path) -> Result<(), ReplayError> {
        Ok(())
    }

    fn save_persisted_map(&mut self, _path: &Path) -> Result<(), ReplayError> {
        Ok(())
    }

    fn feed_frame(&mut self, _image: &DynamicImage, _timestamp: f64, _mask: Option<&GrayImage>) {
        panic!("tracker crashed");
    }

    fn terminate_is_requested(&self) -> bool {
        false
    }

    fn background_optimization_running(&self) -> bool {
        false
    }

    fn export_trajectory(&self, _path: &Path, _format: TrajectoryFormat) -> Result<(), ReplayError> {
        Ok(())
    }
}

#[test]
fn feeding_panic_releases_viewer_and_reports_error() {
    let directory = tempfile::tempdir().unwrap();
    // Without auto-terminate only the panic path can stop the viewer.
    let config = base_config(directory.path()).with_auto_terminate(false);
    let mut video = SyntheticVideo::new(3, 30.0);

    let result = LifecycleCoordinator::new(&config).run_mapping(
        &mut PanickingEngine,
        &mut video,
        &HeadlessViewer::new(),
    );
    assert!(matches!(result, Err(ReplayError::Engine(_))));
}

// ── Localization ─────────────────────────────────────────────────

#[test]
fn localization_requires_map_path() {
    let directory = tempfile::tempdir().unwrap();
    let config = base_config(directory.path());
    let mut engine =
        DryRunEngine::new(vocabulary(directory.path()), CancellationToken::new()).unwrap();
    let mut video = SyntheticVideo::new(3, 30.0);

    let result = LifecycleCoordinator::new(&config).run_localization(
        &mut engine,
        &mut video,
        &HeadlessViewer::new(),
    );
    assert!(matches!(result, Err(ReplayError::MissingMapDatabase(_))));
}

#[test]
fn localization_with_missing_map_file_fails_to_open() {
    let directory = tempfile::tempdir().unwrap();
    let config = base_config(directory.path()).with_map_db_path(directory.path().join("none.json"));
    let mut engine =
        DryRunEngine::new(vocabulary(directory.path()), CancellationToken::new()).unwrap();
    let mut video = SyntheticVideo::new(3, 30.0);

    let result = LifecycleCoordinator::new(&config).run_localization(
        &mut engine,
        &mut video,
        &HeadlessViewer::new(),
    );
    assert!(matches!(result, Err(ReplayError::FileOpen { .. })));
}

// ── Reconstruction modes ─────────────────────────────────────────

#[test]
fn full_reconstruction_maps_then_localizes() {
    let directory = tempfile::tempdir().unwrap();
    let trajectory = directory.path().join("walk_tum.txt");
    let config = base_config(directory.path())
        .with_reconstruction(ReconstructionType::Full)
        .with_map_db_path(directory.path().join("map.json"))
        .with_trajectory_path(&trajectory);
    let mut session = TestSession::new(directory.path(), 6);

    let reports = reconstruct(&config, &mut session).unwrap();

    assert_eq!(session.engines_opened, [RunMode::Mapping, RunMode::Localization]);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].fed, 12);
    assert_eq!(reports[1].mode, RunMode::Localization);
    assert_eq!(reports[1].fed, 6);
    let lines = fs::read_to_string(&trajectory).unwrap();
    assert_eq!(lines.lines().count(), 6);
}

#[test]
fn full_reconstruction_needs_map_path_before_opening_anything() {
    let directory = tempfile::tempdir().unwrap();
    let config = base_config(directory.path());
    let mut session = TestSession::new(directory.path(), 6);

    let result = reconstruct(&config, &mut session);

    assert!(matches!(result, Err(ReplayError::MissingMapDatabase(_))));
    assert!(session.engines_opened.is_empty());
}

#[test]
fn slam_only_runs_mapping() {
    let directory = tempfile::tempdir().unwrap();
    let config = base_config(directory.path()).with_reconstruction(ReconstructionType::Slam);
    let mut session = TestSession::new(directory.path(), 4);

    let reports = reconstruct(&config, &mut session).unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].mode, RunMode::Mapping);
}

#[test]
fn mismatched_video_rate_opens_no_engine() {
    let directory = tempfile::tempdir().unwrap();
    let config = base_config(directory.path()).with_reconstruction(ReconstructionType::Slam);
    let mut session = TestSession::new(directory.path(), 4);
    session.frames_per_second = 60.0;

    let result = reconstruct(&config, &mut session);

    assert!(matches!(result, Err(ReplayError::FrameRateMismatch { .. })));
    assert!(session.engines_opened.is_empty());
}

#[test]
fn localization_keeps_mapping_module_off_unless_requested() {
    let directory = tempfile::tempdir().unwrap();
    let map_path = directory.path().join("map.json");
    let mapping = base_config(directory.path())
        .with_repeat_passes(1)
        .with_map_db_path(&map_path);
    let mut mapper =
        DryRunEngine::new(vocabulary(directory.path()), CancellationToken::new()).unwrap();
    LifecycleCoordinator::new(&mapping)
        .run_mapping(
            &mut mapper,
            &mut SyntheticVideo::new(4, 30.0),
            &HeadlessViewer::new(),
        )
        .unwrap();
    let saved_keyframes = mapper.keyframe_count();

    let mut localizer =
        DryRunEngine::new(vocabulary(directory.path()), CancellationToken::new()).unwrap();
    LifecycleCoordinator::new(&mapping)
        .run_localization(
            &mut localizer,
            &mut SyntheticVideo::new(4, 30.0),
            &HeadlessViewer::new(),
        )
        .unwrap();
    assert!(!localizer.mapping_enabled());
    assert_eq!(localizer.keyframe_count(), saved_keyframes);

    let extending = mapping.clone().with_mapping_enabled(true);
    let mut extender =
        DryRunEngine::new(vocabulary(directory.path()), CancellationToken::new()).unwrap();
    LifecycleCoordinator::new(&extending)
        .run_localization(
            &mut extender,
            &mut SyntheticVideo::new(4, 30.0),
            &HeadlessViewer::new(),
        )
        .unwrap();
    assert!(extender.mapping_enabled());
}
