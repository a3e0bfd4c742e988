//! Progress reporting and cancellation tests.

use std::{
    fs,
    sync::{Arc, Mutex},
};

use image::{DynamicImage, RgbImage};
use posefeed::{
    CancellationToken, Direction, DryRunEngine, FrameSource, HeadlessViewer,
    LifecycleCoordinator, PoseEngine, ProgressCallback, ProgressInfo, RunConfig, TerminalViewer,
    VideoMetadata, ViewerSink,
};

struct SyntheticVideo(VideoMetadata);

impl FrameSource for SyntheticVideo {
    fn metadata(&self) -> &VideoMetadata {
        &self.0
    }

    fn read(&mut self, _index: u64) -> Option<DynamicImage> {
        Some(DynamicImage::ImageRgb8(RgbImage::new(2, 2)))
    }
}

fn video(frame_count: u64) -> SyntheticVideo {
    SyntheticVideo(VideoMetadata {
        width: 2,
        height: 2,
        frames_per_second: 10.0,
        frame_count,
        codec: "raw".to_string(),
    })
}

#[derive(Default)]
struct Collect(Mutex<Vec<ProgressInfo>>);

impl ProgressCallback for Collect {
    fn on_progress(&self, info: &ProgressInfo) {
        self.0.lock().unwrap().push(info.clone());
    }
}

// ── CancellationToken ────────────────────────────────────────────

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());

    token.cancel();
    assert!(clone.is_cancelled());
}

#[test]
fn cancellation_token_default_not_cancelled() {
    assert!(!CancellationToken::default().is_cancelled());
}

#[test]
fn cancelled_token_stops_dry_run_feeding() {
    let directory = tempfile::tempdir().unwrap();
    let vocabulary = directory.path().join("vocab");
    fs::write(&vocabulary, b"vocab").unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let mut engine = DryRunEngine::new(&vocabulary, token).unwrap();
    let config = RunConfig::new(10.0).with_no_sleep(true).with_auto_terminate(true);

    let report = LifecycleCoordinator::new(&config)
        .run_mapping(&mut engine, &mut video(50), &HeadlessViewer::new())
        .unwrap();

    assert!(report.terminated_early);
    assert_eq!(report.visited, 1);
    assert!(!engine.is_running());
}

// ── ProgressCallback ─────────────────────────────────────────────

#[test]
fn one_snapshot_per_visited_frame() {
    let directory = tempfile::tempdir().unwrap();
    let vocabulary = directory.path().join("vocab");
    fs::write(&vocabulary, b"vocab").unwrap();
    let mut engine = DryRunEngine::new(&vocabulary, CancellationToken::new()).unwrap();
    let config = RunConfig::new(10.0)
        .with_no_sleep(true)
        .with_auto_terminate(true)
        .with_frame_skip(2);
    let collect = Arc::new(Collect::default());

    LifecycleCoordinator::new(&config)
        .with_progress(collect.clone())
        .run_mapping(&mut engine, &mut video(4), &HeadlessViewer::new())
        .unwrap();

    let snapshots = collect.0.lock().unwrap();
    assert_eq!(snapshots.len(), 8);
    let frames: Vec<u64> = snapshots.iter().map(|info| info.frame_index).collect();
    assert_eq!(frames, [0, 1, 2, 3, 3, 2, 1, 0]);
    let fed: Vec<bool> = snapshots.iter().map(|info| info.fed).collect();
    assert_eq!(fed, [true, false, true, false, false, true, false, true]);
    assert_eq!(snapshots[4].direction, Direction::Reverse);
    assert_eq!(snapshots[4].pass, 1);

    let last = snapshots.last().unwrap();
    assert_eq!(last.current, 8);
    assert_eq!(last.total, Some(8));
    assert!((last.percentage.unwrap() - 100.0).abs() < 1e-3);
    assert!((last.timestamp - 0.7).abs() < 1e-9);
}

#[test]
fn terminal_viewer_runs_as_progress_sink() {
    let directory = tempfile::tempdir().unwrap();
    let vocabulary = directory.path().join("vocab");
    fs::write(&vocabulary, b"vocab").unwrap();
    let mut engine = DryRunEngine::new(&vocabulary, CancellationToken::new()).unwrap();
    let config = RunConfig::new(10.0).with_no_sleep(true).with_auto_terminate(true);
    let viewer = Arc::new(TerminalViewer::new());

    let report = LifecycleCoordinator::new(&config)
        .with_progress(viewer.clone())
        .run_mapping(&mut engine, &mut video(6), viewer.as_ref())
        .unwrap();
    assert_eq!(report.fed, 12);

    // Terminated viewers return at once.
    viewer.run();
    engine.shutdown();
}
