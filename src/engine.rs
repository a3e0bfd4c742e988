//! The pose-estimation engine boundary.
//!
//! The engine (tracking, mapping, loop closure, bundle adjustment) lives
//! outside this crate. [`PoseEngine`] is the contract the replay driver
//! consumes; anything from a native SLAM binding to
//! [`DryRunEngine`](crate::DryRunEngine) can sit behind it.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
};

use image::{DynamicImage, GrayImage};

use crate::error::ReplayError;

/// Text layout of an exported trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrajectoryFormat {
    /// `timestamp tx ty tz qx qy qz qw` per line.
    #[default]
    Tum,
    /// Row-major 3×4 pose matrix per line.
    Kitti,
}

impl TrajectoryFormat {
    /// Format tag understood by the engine.
    pub fn tag(self) -> &'static str {
        match self {
            TrajectoryFormat::Tum => "TUM",
            TrajectoryFormat::Kitti => "KITTI",
        }
    }
}

impl Display for TrajectoryFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.tag())
    }
}

/// Operations the replay driver needs from a pose-estimation engine.
///
/// The engine is moved onto the feeding thread for the duration of a run,
/// hence the [`Send`] bound. Only that thread calls it while feeding.
pub trait PoseEngine: Send {
    /// Start the engine's worker threads.
    ///
    /// With `require_existing_map` the engine localizes against a previously
    /// loaded map instead of initializing a new one.
    fn startup(&mut self, require_existing_map: bool) -> Result<(), ReplayError>;

    /// Stop the engine's worker threads.
    fn shutdown(&mut self);

    fn enable_mapping_module(&mut self);

    fn disable_mapping_module(&mut self);

    fn load_persisted_map(&mut self, path: &Path) -> Result<(), ReplayError>;

    fn save_persisted_map(&mut self, path: &Path) -> Result<(), ReplayError>;

    /// Track one monocular frame taken at `timestamp` seconds.
    fn feed_frame(&mut self, image: &DynamicImage, timestamp: f64, mask: Option<&GrayImage>);

    /// Whether the engine (or its user interface) asked the run to stop.
    fn terminate_is_requested(&self) -> bool;

    /// Whether loop-closure bundle adjustment is still running.
    fn background_optimization_running(&self) -> bool;

    fn export_trajectory(&self, path: &Path, format: TrajectoryFormat) -> Result<(), ReplayError>;
}
