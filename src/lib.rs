//! # posefeed
//!
//! Replay a recorded monocular video into a visual pose-estimation engine as
//! if it were a live camera.
//!
//! `posefeed` decodes frames by index with FFmpeg (via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate), paces them at
//! the camera's nominal frame rate, attaches optional masks, and hands them
//! to a [`PoseEngine`] on a background thread while a [`ViewerSink`] runs on
//! the calling thread. Mapping runs replay the video several times,
//! alternating forward and reverse passes; localization runs replay it once
//! against a saved map.
//!
//! ## Quick Start
//!
//! ### Plan a replay
//!
//! ```
//! use posefeed::{Direction, PlaybackSequencer};
//!
//! let plan = PlaybackSequencer::new(1).plan(3, 2);
//! let order: Vec<(Direction, u64)> = plan
//!     .passes()
//!     .flat_map(|pass| pass.entries().map(move |entry| (pass.direction(), entry.physical_index)))
//!     .collect();
//! assert_eq!(order.len(), 6);
//! assert_eq!(order[3], (Direction::Reverse, 2));
//! ```
//!
//! ### Build a map
//!
//! ```no_run
//! use posefeed::{
//!     CancellationToken, DryRunEngine, HeadlessViewer, LifecycleCoordinator, RunConfig,
//!     VideoFile,
//! };
//!
//! let config = RunConfig::new(30.0)
//!     .with_auto_terminate(true)
//!     .with_map_db_path("map.json");
//! let mut engine = DryRunEngine::new("orb_vocab.dbow2", CancellationToken::new()).unwrap();
//! let mut video = VideoFile::open("input.mp4").unwrap();
//! let viewer = HeadlessViewer::new();
//!
//! let report = LifecycleCoordinator::new(&config)
//!     .run_mapping(&mut engine, &mut video, &viewer)
//!     .unwrap();
//! println!("fed {} of {} frames", report.fed, report.visited);
//! ```
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod configuration;
pub mod dry_run;
pub mod engine;
pub mod error;
pub mod feeder;
pub mod lifecycle;
pub mod mask;
pub mod metadata;
pub mod pacing;
pub mod playback;
pub mod progress;
pub mod track_time;
mod utilities;
pub mod video;
pub mod viewer;

pub use configuration::{
    CameraSetup, EngineConfig, ReconstructionType, RunConfig, verify_frame_rate,
};
pub use dry_run::DryRunEngine;
pub use engine::{PoseEngine, TrajectoryFormat};
pub use error::ReplayError;
pub use feeder::{FeedOutcome, FeederState, FeederTask, StartMode, drain};
pub use lifecycle::{
    LifecycleCoordinator, RunMode, RunReport, SessionFactory, Visualization, reconstruct,
};
pub use mask::MaskProvider;
pub use metadata::VideoMetadata;
pub use pacing::PacingController;
pub use playback::{Direction, PlanEntry, PlaybackPass, PlaybackPlan, PlaybackSequencer};
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo};
pub use track_time::{TrackTimeRecorder, TrackTimeSummary};
pub use video::{FrameSource, VideoFile, set_decoder_log_level};
pub use viewer::{HeadlessViewer, TerminalViewer, TerminateSignal, ViewerSink};
