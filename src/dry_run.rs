//! A stand-in pose engine for exercising the replay pipeline.
//!
//! [`DryRunEngine`] honours the whole [`PoseEngine`] contract without
//! estimating anything: every tracked frame gets an identity pose, every
//! `keyframe_interval`-th tracked frame becomes a keyframe, and each keyframe
//! keeps a simulated background optimization busy for a configurable time.
//! Its persisted map is a small JSON document. It lets the command-line tool
//! and the tests drive pacing, masking, draining and export end to end.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use crate::{
    engine::{PoseEngine, TrajectoryFormat},
    error::ReplayError,
    progress::CancellationToken,
};

const DEFAULT_KEYFRAME_INTERVAL: u64 = 10;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedMap {
    vocabulary: PathBuf,
    keyframes: Vec<f64>,
}

/// Engine that tracks nothing but behaves like one from the outside.
#[derive(Debug)]
pub struct DryRunEngine {
    vocabulary: PathBuf,
    terminate: CancellationToken,
    keyframe_interval: u64,
    optimization_latency: Duration,
    running: bool,
    mapping_enabled: bool,
    map_loaded: bool,
    tracked: Vec<f64>,
    keyframes: Vec<f64>,
    optimization_until: Option<Instant>,
}

impl DryRunEngine {
    /// Create an engine using the vocabulary at `vocabulary`.
    ///
    /// `terminate` is reported through
    /// [`terminate_is_requested`](PoseEngine::terminate_is_requested).
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::FileOpen`] if the vocabulary file is missing.
    pub fn new<P: AsRef<Path>>(
        vocabulary: P,
        terminate: CancellationToken,
    ) -> Result<Self, ReplayError> {
        let vocabulary = vocabulary.as_ref().to_path_buf();
        if !vocabulary.is_file() {
            return Err(ReplayError::FileOpen {
                path: vocabulary,
                reason: "vocabulary file not found".to_string(),
            });
        }

        Ok(Self {
            vocabulary,
            terminate,
            keyframe_interval: DEFAULT_KEYFRAME_INTERVAL,
            optimization_latency: Duration::ZERO,
            running: false,
            mapping_enabled: true,
            map_loaded: false,
            tracked: Vec::new(),
            keyframes: Vec::new(),
            optimization_until: None,
        })
    }

    /// Promote every `interval`-th tracked frame to a keyframe (min 1).
    #[must_use]
    pub fn with_keyframe_interval(mut self, interval: u64) -> Self {
        self.keyframe_interval = interval.max(1);
        self
    }

    /// Keep background optimization busy for `latency` after each keyframe.
    #[must_use]
    pub fn with_optimization_latency(mut self, latency: Duration) -> Self {
        self.optimization_latency = latency;
        self
    }

    /// Timestamps of every tracked frame, in feeding order.
    pub fn tracked_timestamps(&self) -> &[f64] {
        &self.tracked
    }

    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn mapping_enabled(&self) -> bool {
        self.mapping_enabled
    }
}

impl PoseEngine for DryRunEngine {
    fn startup(&mut self, require_existing_map: bool) -> Result<(), ReplayError> {
        if require_existing_map && !self.map_loaded {
            return Err(ReplayError::Engine(
                "startup without initialization requires a loaded map".to_string(),
            ));
        }
        log::info!(
            "dry-run engine started (vocabulary {}, {} keyframes)",
            self.vocabulary.display(),
            self.keyframes.len()
        );
        self.running = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.running = false;
        self.optimization_until = None;
        log::info!(
            "dry-run engine shut down after tracking {} frames",
            self.tracked.len()
        );
    }

    fn enable_mapping_module(&mut self) {
        self.mapping_enabled = true;
    }

    fn disable_mapping_module(&mut self) {
        self.mapping_enabled = false;
    }

    fn load_persisted_map(&mut self, path: &Path) -> Result<(), ReplayError> {
        let file = File::open(path).map_err(|error| ReplayError::FileOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
        let map: PersistedMap = serde_json::from_reader(BufReader::new(file))
            .map_err(|error| ReplayError::Engine(format!("corrupt map database: {error}")))?;

        if map.vocabulary != self.vocabulary {
            log::warn!(
                "map was built with vocabulary {}, running with {}",
                map.vocabulary.display(),
                self.vocabulary.display()
            );
        }

        log::info!(
            "loaded map database {} ({} keyframes)",
            path.display(),
            map.keyframes.len()
        );
        self.keyframes = map.keyframes;
        self.map_loaded = true;
        Ok(())
    }

    fn save_persisted_map(&mut self, path: &Path) -> Result<(), ReplayError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let map = PersistedMap {
            vocabulary: self.vocabulary.clone(),
            keyframes: self.keyframes.clone(),
        };
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &map)
            .map_err(|error| ReplayError::Engine(format!("failed to encode map: {error}")))?;
        writer.flush()?;
        Ok(())
    }

    fn feed_frame(&mut self, image: &DynamicImage, timestamp: f64, mask: Option<&GrayImage>) {
        if !self.running {
            log::warn!("frame at {timestamp:.3}s fed to a stopped engine; ignored");
            return;
        }
        if let Some(mask) = mask {
            if mask.dimensions() != (image.width(), image.height()) {
                log::warn!("mask size does not match frame at {timestamp:.3}s");
            }
        }

        self.tracked.push(timestamp);

        if self.mapping_enabled && (self.tracked.len() as u64 - 1) % self.keyframe_interval == 0 {
            self.keyframes.push(timestamp);
            if !self.optimization_latency.is_zero() {
                self.optimization_until = Some(Instant::now() + self.optimization_latency);
            }
        }
    }

    fn terminate_is_requested(&self) -> bool {
        self.terminate.is_cancelled()
    }

    fn background_optimization_running(&self) -> bool {
        self.optimization_until
            .is_some_and(|deadline| Instant::now() < deadline)
    }

    fn export_trajectory(&self, path: &Path, format: TrajectoryFormat) -> Result<(), ReplayError> {
        let mut writer = BufWriter::new(File::create(path)?);
        for timestamp in &self.tracked {
            match format {
                TrajectoryFormat::Tum => writeln!(writer, "{timestamp:.6} 0 0 0 0 0 0 1")?,
                TrajectoryFormat::Kitti => writeln!(writer, "1 0 0 0 0 1 0 0 0 0 1 0")?,
            }
        }
        writer.flush()?;
        log::info!("wrote {format} trajectory to {}", path.display());
        Ok(())
    }
}
