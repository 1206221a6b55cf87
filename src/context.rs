//! Shared per-run state: the cooperative shutdown token and the aggregator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::stats::Stats;

/// Clonable cancellation handle, polled once per loop iteration.
///
/// Cancellation is cooperative: a worker already inside a blocking call
/// finishes that round trip before observing the token, so shutdown overruns
/// by at most one round trip per connection. There is no hard abort; a
/// blocked receive is only unblocked by peer close or process exit.
#[derive(Debug, Clone)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Signal every holder to stop. Idempotent.
    pub fn cancel(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a worker or handler shares with its run: the shutdown token
/// and the counters it merges into at teardown. Built once per run and
/// passed by reference, never global, so independent runs can coexist in
/// one process.
#[derive(Debug, Default)]
pub struct RunContext {
    pub shutdown: ShutdownToken,
    pub stats: Stats,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }
}
