//! Tracking-time statistics.
//!
//! Each frame fed to the engine contributes one sample: the time spent from
//! having the decoded frame in hand to the engine returning from
//! `feed_frame`. The summary is computed once, after the run.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    time::Duration,
};

use crate::error::ReplayError;

/// Median and mean of the collected samples, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackTimeSummary {
    /// Element at index `len / 2` of the ascending-sorted samples.
    pub median: f64,
    pub mean: f64,
    pub samples: usize,
}

/// Accumulates per-frame tracking durations.
#[derive(Debug, Clone, Default)]
pub struct TrackTimeRecorder {
    samples: Vec<f64>,
}

impl TrackTimeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder with room for `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, duration: Duration) {
        self.samples.push(duration.as_secs_f64());
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sort the samples and summarise them.
    ///
    /// For an even number of samples the median is the upper of the two
    /// middle values, not their average. Returns `None` when nothing was
    /// recorded.
    pub fn summarize(&mut self) -> Option<TrackTimeSummary> {
        if self.samples.is_empty() {
            return None;
        }

        self.samples.sort_by(f64::total_cmp);
        let total: f64 = self.samples.iter().sum();

        Some(TrackTimeSummary {
            median: self.samples[self.samples.len() / 2],
            mean: total / self.samples.len() as f64,
            samples: self.samples.len(),
        })
    }

    /// Write one sample per line, in recording order unless
    /// [`summarize`](TrackTimeRecorder::summarize) already sorted them.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::IoError`] if the file cannot be written.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ReplayError> {
        let mut writer = BufWriter::new(File::create(path)?);
        for sample in &self.samples {
            writeln!(writer, "{sample}")?;
        }
        writer.flush()?;
        Ok(())
    }
}
