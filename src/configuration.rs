//! Run and engine configuration.
//!
//! [`RunConfig`] is a builder that carries every setting of one replay run
//! (pacing, decimation, repeat passes, downsampling, masking, outputs). It is
//! built once, validated, and only read afterwards.
//!
//! [`EngineConfig`] is the subset of the engine's YAML settings file that the
//! replay driver itself needs: the camera setup and its frame rate.
//!
//! # Example
//!
//! ```no_run
//! use posefeed::{EngineConfig, ReconstructionType, RunConfig};
//!
//! let engine_config = EngineConfig::load("config.yaml")?;
//! let config = RunConfig::new(engine_config.fps)
//!     .with_frame_skip(2)
//!     .with_repeat_passes(3)
//!     .with_reconstruction(ReconstructionType::Slam)
//!     .with_map_db_path("map.msg");
//! config.validate()?;
//! # Ok::<(), posefeed::ReplayError>(())
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;

use crate::error::ReplayError;

/// Which reconstruction the run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconstructionType {
    /// Build a map from the video and optionally persist it.
    Slam,
    /// Localize against a persisted map and export the trajectory.
    Localization,
    /// Run [`Slam`](ReconstructionType::Slam), then
    /// [`Localization`](ReconstructionType::Localization) against its map.
    #[default]
    Full,
}

impl FromStr for ReconstructionType {
    type Err = ReplayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "slam" => Ok(ReconstructionType::Slam),
            "localization" => Ok(ReconstructionType::Localization),
            "full" => Ok(ReconstructionType::Full),
            other => Err(ReplayError::InvalidConfig(format!(
                "unknown reconstruction type '{other}' (expected slam, localization or full)"
            ))),
        }
    }
}

impl Display for ReconstructionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            ReconstructionType::Slam => "slam",
            ReconstructionType::Localization => "localization",
            ReconstructionType::Full => "full",
        };
        f.write_str(name)
    }
}

/// Settings for one replay run.
///
/// All fields have the defaults of the command-line tool except
/// `frame_rate`, which must come from the engine configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Camera frame rate in Hz; must match the video's own rate.
    pub frame_rate: f64,
    /// Decimation stride: physical index `i` is fed iff `i % frame_skip == 0`.
    pub frame_skip: u64,
    /// Disable real-time pacing.
    pub no_sleep: bool,
    /// Terminate the viewer once feeding and draining finish.
    pub auto_terminate: bool,
    /// Number of full traversals of the video in mapping mode.
    pub repeat_passes: u32,
    /// Resize factor applied to every decoded frame (`1.0` keeps the size).
    pub downsample_scalar: f64,
    /// Keep the mapping module running during localization.
    pub mapping_enabled: bool,
    /// Static mask file or per-frame mask directory.
    pub mask_path: Option<PathBuf>,
    /// Which reconstruction to perform.
    pub reconstruction: ReconstructionType,
    /// Where the persisted map is written (mapping) or read (localization).
    pub map_db_path: Option<PathBuf>,
    /// Where the localization trajectory is written.
    pub trajectory_path: Option<PathBuf>,
    /// Write the frame trajectory and raw tracking times after mapping.
    pub eval_log: bool,
    /// Directory that receives the evaluation files.
    pub eval_output_dir: PathBuf,
}

impl RunConfig {
    /// Create a configuration with default settings for the given rate.
    ///
    /// Defaults: frame skip 1, pacing on, no auto-terminate, 2 passes,
    /// no downsampling, no mask, full reconstruction.
    pub fn new(frame_rate: f64) -> Self {
        Self {
            frame_rate,
            frame_skip: 1,
            no_sleep: false,
            auto_terminate: false,
            repeat_passes: 2,
            downsample_scalar: 1.0,
            mapping_enabled: false,
            mask_path: None,
            reconstruction: ReconstructionType::Full,
            map_db_path: None,
            trajectory_path: None,
            eval_log: false,
            eval_output_dir: PathBuf::from("."),
        }
    }

    #[must_use]
    pub fn with_frame_skip(mut self, frame_skip: u64) -> Self {
        self.frame_skip = frame_skip;
        self
    }

    #[must_use]
    pub fn with_no_sleep(mut self, no_sleep: bool) -> Self {
        self.no_sleep = no_sleep;
        self
    }

    #[must_use]
    pub fn with_auto_terminate(mut self, auto_terminate: bool) -> Self {
        self.auto_terminate = auto_terminate;
        self
    }

    #[must_use]
    pub fn with_repeat_passes(mut self, repeat_passes: u32) -> Self {
        self.repeat_passes = repeat_passes;
        self
    }

    #[must_use]
    pub fn with_downsample_scalar(mut self, downsample_scalar: f64) -> Self {
        self.downsample_scalar = downsample_scalar;
        self
    }

    #[must_use]
    pub fn with_mapping_enabled(mut self, mapping_enabled: bool) -> Self {
        self.mapping_enabled = mapping_enabled;
        self
    }

    /// Set the mask path. An empty path means no mask.
    #[must_use]
    pub fn with_mask_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        let path = path.into();
        self.mask_path = if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        };
        self
    }

    #[must_use]
    pub fn with_reconstruction(mut self, reconstruction: ReconstructionType) -> Self {
        self.reconstruction = reconstruction;
        self
    }

    /// Set the map database path. An empty path means none.
    #[must_use]
    pub fn with_map_db_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        let path = path.into();
        self.map_db_path = if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        };
        self
    }

    #[must_use]
    pub fn with_trajectory_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.trajectory_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_eval_log(mut self, eval_log: bool) -> Self {
        self.eval_log = eval_log;
        self
    }

    #[must_use]
    pub fn with_eval_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.eval_output_dir = dir.into();
        self
    }

    /// Nominal period between two frames, in seconds.
    pub fn frame_period(&self) -> f64 {
        1.0 / self.frame_rate
    }

    /// Check every setting against its valid domain.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::InvalidConfig`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(ReplayError::InvalidConfig(format!(
                "frame rate must be positive, got {}",
                self.frame_rate
            )));
        }
        if self.frame_skip == 0 {
            return Err(ReplayError::InvalidConfig(
                "frame skip must be at least 1".to_string(),
            ));
        }
        if self.repeat_passes == 0 {
            return Err(ReplayError::InvalidConfig(
                "repeat times must be at least 1".to_string(),
            ));
        }
        if !(self.downsample_scalar.is_finite() && self.downsample_scalar > 0.0) {
            return Err(ReplayError::InvalidConfig(format!(
                "downsample scalar must be positive, got {}",
                self.downsample_scalar
            )));
        }
        Ok(())
    }
}

/// Camera setup declared in the engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CameraSetup {
    #[serde(rename = "monocular", alias = "Monocular")]
    Monocular,
    #[serde(rename = "stereo", alias = "Stereo")]
    Stereo,
    #[serde(rename = "RGBD", alias = "rgbd")]
    Rgbd,
}

impl Display for CameraSetup {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            CameraSetup::Monocular => "Monocular",
            CameraSetup::Stereo => "Stereo",
            CameraSetup::Rgbd => "RGBD",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize)]
struct EngineConfigFile {
    #[serde(rename = "Camera.name")]
    camera_name: Option<String>,
    #[serde(rename = "Camera.setup")]
    setup: CameraSetup,
    #[serde(rename = "Camera.fps")]
    fps: f64,
    #[serde(rename = "Camera.cols")]
    cols: Option<u32>,
    #[serde(rename = "Camera.rows")]
    rows: Option<u32>,
}

/// The camera section of the engine's YAML configuration.
///
/// The engine owns the rest of the file; unknown keys are ignored here and
/// the whole file is handed to the engine untouched.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path the configuration was loaded from.
    pub path: PathBuf,
    /// Camera model name, if declared.
    pub camera_name: Option<String>,
    /// Camera setup type.
    pub setup: CameraSetup,
    /// Camera frame rate in Hz.
    pub fps: f64,
    /// Image width the engine expects, if declared.
    pub cols: Option<u32>,
    /// Image height the engine expects, if declared.
    pub rows: Option<u32>,
}

impl EngineConfig {
    /// Load and parse a YAML engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::ConfigLoad`] if the file cannot be read or
    /// parsed, and [`ReplayError::InvalidConfig`] if the frame rate is not
    /// positive.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|error| ReplayError::ConfigLoad {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
        Self::from_yaml(path, &contents)
    }

    fn from_yaml(path: &Path, contents: &str) -> Result<Self, ReplayError> {
        let file: EngineConfigFile =
            serde_yaml::from_str(contents).map_err(|error| ReplayError::ConfigLoad {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?;

        if !(file.fps.is_finite() && file.fps > 0.0) {
            return Err(ReplayError::InvalidConfig(format!(
                "Camera.fps must be positive, got {}",
                file.fps
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            camera_name: file.camera_name,
            setup: file.setup,
            fps: file.fps,
            cols: file.cols,
            rows: file.rows,
        })
    }

    /// Ensure the setup can be fed from a single video stream.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::UnsupportedSetup`] for anything but monocular.
    pub fn require_monocular(&self) -> Result<(), ReplayError> {
        match self.setup {
            CameraSetup::Monocular => Ok(()),
            other => Err(ReplayError::UnsupportedSetup(other.to_string())),
        }
    }
}

/// Compare the configured frame rate with the video's intrinsic rate.
///
/// The video rate is rounded to the nearest integer and the configured rate
/// is truncated before comparing, so `29.97` fps video matches a `30` fps
/// camera.
///
/// # Errors
///
/// Returns [`ReplayError::FrameRateMismatch`] when they differ.
pub fn verify_frame_rate(configured: f64, video: f64) -> Result<(), ReplayError> {
    let video = (video + 0.5) as i64;
    let configured = configured as i64;
    if video != configured {
        return Err(ReplayError::FrameRateMismatch { configured, video });
    }
    Ok(())
}
