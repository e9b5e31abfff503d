use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Real-time metrics for a detection run.
///
/// The engine updates these counters while leaves are scanned; callers can snapshot them at any
/// time, including from another thread while a run is in progress.
pub struct ExecutionMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    rows_scanned: AtomicU64,
    leaves_started: AtomicU64,
    leaves_finished: AtomicU64,
    throttle_wait_ns: AtomicU64,

    active_scans: AtomicUsize,
    max_active_scans: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            rows_scanned: AtomicU64::new(0),
            leaves_started: AtomicU64::new(0),
            leaves_finished: AtomicU64::new(0),
            throttle_wait_ns: AtomicU64::new(0),
            active_scans: AtomicUsize::new(0),
            max_active_scans: AtomicUsize::new(0),
        }
    }

    pub fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);

        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.rows_scanned.store(0, Ordering::SeqCst);
        self.leaves_started.store(0, Ordering::SeqCst);
        self.leaves_finished.store(0, Ordering::SeqCst);
        self.throttle_wait_ns.store(0, Ordering::SeqCst);
        self.active_scans.store(0, Ordering::SeqCst);
        self.max_active_scans.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns.store(saturating_nanos(elapsed), Ordering::SeqCst);
    }

    pub fn on_leaf_start(&self) {
        let _ = self.leaves_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_scans.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active_scans, now);
    }

    pub fn on_leaf_end(&self, rows_scanned: usize) {
        let _ = self
            .rows_scanned
            .fetch_add(rows_scanned as u64, Ordering::SeqCst);
        let _ = self.leaves_finished.fetch_add(1, Ordering::SeqCst);
        let _ = self.active_scans.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_throttle_wait(&self, d: Duration) {
        let _ = self
            .throttle_wait_ns
            .fetch_add(saturating_nanos(d), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns));

        ExecutionMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            rows_scanned: self.rows_scanned.load(Ordering::SeqCst),
            leaves_started: self.leaves_started.load(Ordering::SeqCst),
            leaves_finished: self.leaves_finished.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_scans: self.max_active_scans.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    d.as_nanos().min(u64::MAX as u128) as u64
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    let _ = dst.fetch_max(now, Ordering::SeqCst);
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    /// Rows visited across all leaves; early-exit scans count only the rows they reached.
    pub rows_scanned: u64,
    pub leaves_started: u64,
    pub leaves_finished: u64,
    pub throttle_wait: Duration,
    pub max_active_scans: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, rows_scanned={}, leaves={}/{}, max_active_scans={}, throttle_wait={:?}, elapsed={:?}",
            self.run_id,
            self.rows_scanned,
            self.leaves_finished,
            self.leaves_started,
            self.max_active_scans,
            self.throttle_wait,
            self.elapsed
        )
    }
}
