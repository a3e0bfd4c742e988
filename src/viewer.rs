//! Visualization sinks.
//!
//! A viewer owns the thread that started the run: [`ViewerSink::run`] blocks
//! there while the feeding thread works, and returns once
//! [`request_terminate`](ViewerSink::request_terminate) is called (by the
//! lifecycle when auto-terminate is set) or the user stops it through a
//! [`CancellationToken`].
//!
//! Viewers only read what the feeding thread publishes; they never touch the
//! engine.

use std::{
    sync::{
        Condvar, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use indicatif::{ProgressBar, ProgressStyle};

use crate::progress::{CancellationToken, ProgressCallback, ProgressInfo};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A blocking visualization front end.
pub trait ViewerSink: Send + Sync {
    /// Run the viewer's event loop on the calling thread until terminated.
    fn run(&self);

    /// Ask a running (or not yet started) viewer to stop.
    fn request_terminate(&self);
}

/// A latch that viewers block on until termination.
///
/// Waits are bounded so an external [`CancellationToken`] is noticed within
/// one poll interval.
#[derive(Debug, Default)]
pub struct TerminateSignal {
    terminated: Mutex<bool>,
    condvar: Condvar,
}

impl TerminateSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terminate(&self) {
        let mut terminated = self
            .terminated
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *terminated = true;
        self.condvar.notify_all();
    }

    pub fn is_terminated(&self) -> bool {
        *self
            .terminated
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Block for at most `timeout`; returns whether termination was signalled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let terminated = self
            .terminated
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (terminated, _) = self
            .condvar
            .wait_timeout_while(terminated, timeout, |terminated| !*terminated)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *terminated
    }
}

/// A viewer with no display: it just holds the calling thread until told to
/// stop.
#[derive(Debug, Default)]
pub struct HeadlessViewer {
    signal: TerminateSignal,
    user_stop: Option<CancellationToken>,
}

impl HeadlessViewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also stop when `token` is cancelled.
    #[must_use]
    pub fn with_user_stop(mut self, token: CancellationToken) -> Self {
        self.user_stop = Some(token);
        self
    }
}

impl ViewerSink for HeadlessViewer {
    fn run(&self) {
        log::debug!("headless viewer running");
        while !self.signal.wait_timeout(POLL_INTERVAL) {
            if self.user_stop.as_ref().is_some_and(CancellationToken::is_cancelled) {
                break;
            }
        }
        log::debug!("headless viewer stopped");
    }

    fn request_terminate(&self) {
        self.signal.terminate();
    }
}

/// A terminal viewer that draws feeding progress as a progress bar.
///
/// Register it as the run's [`ProgressCallback`] so it receives snapshots;
/// the feeding thread publishes into atomics and [`run`](ViewerSink::run)
/// redraws from them.
pub struct TerminalViewer {
    signal: TerminateSignal,
    user_stop: Option<CancellationToken>,
    current: AtomicU64,
    total: AtomicU64,
    pass: AtomicU64,
    passes: AtomicU64,
    timestamp_bits: AtomicU64,
    reverse: AtomicBool,
}

impl Default for TerminalViewer {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalViewer {
    pub fn new() -> Self {
        Self {
            signal: TerminateSignal::new(),
            user_stop: None,
            current: AtomicU64::new(0),
            total: AtomicU64::new(0),
            pass: AtomicU64::new(0),
            passes: AtomicU64::new(0),
            timestamp_bits: AtomicU64::new(0f64.to_bits()),
            reverse: AtomicBool::new(false),
        }
    }

    /// Also stop when `token` is cancelled.
    #[must_use]
    pub fn with_user_stop(mut self, token: CancellationToken) -> Self {
        self.user_stop = Some(token);
        self
    }

    fn redraw(&self, bar: &ProgressBar) {
        bar.set_length(self.total.load(Ordering::Relaxed));
        bar.set_position(self.current.load(Ordering::Relaxed));
        let direction = if self.reverse.load(Ordering::Relaxed) {
            "reverse"
        } else {
            "forward"
        };
        bar.set_message(format!(
            "pass {}/{} {direction} t={:.2}s",
            self.pass.load(Ordering::Relaxed) + 1,
            self.passes.load(Ordering::Relaxed),
            f64::from_bits(self.timestamp_bits.load(Ordering::Relaxed)),
        ));
    }
}

impl ProgressCallback for TerminalViewer {
    fn on_progress(&self, info: &ProgressInfo) {
        self.current.store(info.current, Ordering::Relaxed);
        self.total.store(info.total.unwrap_or(0), Ordering::Relaxed);
        self.pass.store(u64::from(info.pass), Ordering::Relaxed);
        self.passes.store(u64::from(info.passes), Ordering::Relaxed);
        self.timestamp_bits
            .store(info.timestamp.to_bits(), Ordering::Relaxed);
        self.reverse.store(
            info.direction == crate::playback::Direction::Reverse,
            Ordering::Relaxed,
        );
    }
}

impl ViewerSink for TerminalViewer {
    fn run(&self) {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        while !self.signal.wait_timeout(POLL_INTERVAL) {
            if self.user_stop.as_ref().is_some_and(CancellationToken::is_cancelled) {
                break;
            }
            self.redraw(&bar);
        }

        self.redraw(&bar);
        bar.finish();
    }

    fn request_terminate(&self) {
        self.signal.terminate();
    }
}
