//! Progress aggregation for concurrent transfers
//!
//! Workers report every chunk through [`ProgressAggregator::record_write`].
//! The running byte count is atomic so it can be read from anywhere,
//! callbacks included. Threshold bookkeeping sits behind a mutex and the
//! callback fires while it is held, so reported values never go backwards
//! and a threshold crossing produces exactly one callback. A callback may
//! read [`ProgressAggregator::bytes_written`] but must not record writes.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// Progress callback: `(bytes_written, total_bytes)`; `total_bytes` is 0
/// when the length of the transfer is unknown
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// When progress callbacks fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressConfig {
    /// Every `n` milliseconds from a timer thread, plus once at completion;
    /// `n <= 0` reports every write
    Time(i64),
    /// Every `p` percent of the total; `p` outside `[0, 100]` or an unknown
    /// total reports every write
    Percent(i64),
    /// Every `n` bytes, clamped to `[0, total - 1]` when the total is known
    BufferSize(i64),
}

impl Default for ProgressConfig {
    fn default() -> Self {
        ProgressConfig::Percent(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    /// Fire when at least this many bytes arrived since the last callback
    Threshold(u64),
    /// Periodic timer; synchronous callback only at completion
    Timer(Duration),
}

impl Policy {
    fn normalize(config: ProgressConfig, total: Option<u64>) -> Self {
        match (config, total) {
            (ProgressConfig::Time(ms), _) if ms > 0 => Policy::Timer(Duration::from_millis(ms as u64)),
            (ProgressConfig::Time(_), _) => Policy::Threshold(0),
            (ProgressConfig::Percent(p), Some(total)) if (0..=100).contains(&p) => {
                Policy::Threshold((p as f64 / 100.0 * total as f64) as u64)
            }
            (ProgressConfig::Percent(_), _) => Policy::Threshold(0),
            (ProgressConfig::BufferSize(n), Some(total)) => {
                let n = n.max(0) as u64;
                Policy::Threshold(n.min(total.saturating_sub(1)))
            }
            (ProgressConfig::BufferSize(n), None) => Policy::Threshold(n.max(0) as u64),
        }
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    since_last: u64,
    finished: bool,
    torn_down: bool,
}

struct Shared {
    total: Option<u64>,
    policy: Policy,
    callback: Option<ProgressCallback>,
    written: AtomicU64,
    state: Mutex<ProgressState>,
}

impl Shared {
    fn written(&self) -> u64 {
        let written = self.written.load(Ordering::Acquire);
        self.total.map_or(written, |total| written.min(total))
    }

    fn reached(&self, written: u64) -> bool {
        self.total.is_some_and(|total| written >= total)
    }

    fn fire(&self) {
        if let Some(callback) = &self.callback {
            callback(self.written(), self.total.unwrap_or(0));
        }
    }
}

struct Timer {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Thread-safe byte counter that drives progress callbacks
pub struct ProgressAggregator {
    shared: Arc<Shared>,
    timer: Mutex<Option<Timer>>,
}

impl ProgressAggregator {
    pub fn new(total: u64, config: ProgressConfig, callback: Option<ProgressCallback>) -> Self {
        Self::with_total(Some(total), config, callback)
    }

    /// Aggregator for a transfer whose length is not known up front. Every
    /// callback carries the running count and a total of 0; completion is
    /// only signalled by [`finish`](Self::finish).
    pub fn unbounded(config: ProgressConfig, callback: Option<ProgressCallback>) -> Self {
        Self::with_total(None, config, callback)
    }

    fn with_total(total: Option<u64>, config: ProgressConfig, callback: Option<ProgressCallback>) -> Self {
        ProgressAggregator {
            shared: Arc::new(Shared {
                total,
                policy: Policy::normalize(config, total),
                callback,
                written: AtomicU64::new(0),
                state: Mutex::new(ProgressState::default()),
            }),
            timer: Mutex::new(None),
        }
    }

    /// Aggregator that counts bytes without reporting
    pub fn silent(total: u64) -> Self {
        Self::new(total, ProgressConfig::default(), None)
    }

    pub fn total(&self) -> Option<u64> {
        self.shared.total
    }

    /// Bytes recorded so far, capped at the total when it is known
    pub fn bytes_written(&self) -> u64 {
        self.shared.written()
    }

    /// Start the periodic timer for the Time policy; no-op otherwise
    pub fn start(&self) {
        let period = match self.shared.policy {
            Policy::Timer(period) if self.shared.callback.is_some() => period,
            _ => return,
        };

        let mut timer = self.timer.lock();
        if timer.is_some() {
            return;
        }

        let (stop, ticks) = mpsc::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("ufile-progress".to_string())
            .spawn(move || loop {
                match ticks.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        let state = shared.state.lock();
                        if state.finished || state.torn_down {
                            break;
                        }
                        shared.fire();
                    }
                    _ => break,
                }
            });

        match spawned {
            Ok(handle) => *timer = Some(Timer { stop, handle }),
            Err(e) => warn!(error = %e, "failed to start progress timer"),
        }
    }

    /// Account `n` freshly written bytes
    pub fn record_write(&self, n: u64) {
        let completed = {
            let mut state = self.shared.state.lock();
            let written = self
                .shared
                .written
                .fetch_add(n, Ordering::AcqRel)
                .saturating_add(n);
            if state.torn_down || state.finished {
                return;
            }

            state.since_last = state.since_last.saturating_add(n);
            let reached = self.shared.reached(written);

            match self.shared.policy {
                Policy::Threshold(interval) => {
                    if state.since_last >= interval || reached {
                        state.since_last = 0;
                        state.finished = reached;
                        self.shared.fire();
                    }
                }
                Policy::Timer(_) => {
                    if reached {
                        state.finished = true;
                        self.shared.fire();
                    }
                }
            }
            state.finished
        };

        if completed {
            self.stop_timer();
        }
    }

    /// Deliver the final callback if no write reached the total
    pub fn finish(&self) {
        {
            let mut state = self.shared.state.lock();
            if !state.torn_down && !state.finished {
                state.finished = true;
                self.shared.fire();
            }
        }
        self.stop_timer();
    }

    /// Cancel and join the timer; no callback fires afterwards
    pub fn teardown(&self) {
        self.shared.state.lock().torn_down = true;
        if let Some(timer) = self.timer.lock().take() {
            drop(timer.stop);
            if timer.handle.join().is_err() {
                warn!("progress timer panicked");
            }
        }
    }

    /// Tear down when the returned guard is dropped
    pub fn guard(&self) -> ProgressGuard<'_> {
        ProgressGuard { aggregator: self }
    }

    fn stop_timer(&self) {
        if let Some(timer) = self.timer.lock().as_ref() {
            let _ = timer.stop.send(());
        }
    }
}

impl Drop for ProgressAggregator {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Runs [`ProgressAggregator::teardown`] on drop
pub struct ProgressGuard<'a> {
    aggregator: &'a ProgressAggregator,
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.aggregator.teardown();
    }
}
