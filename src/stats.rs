//! Process-wide throughput and latency counters.
//!
//! Worker threads tally into plain [`LocalCounters`] inside their hot loops
//! and merge into the shared [`Stats`] once at teardown, so the measured path
//! never touches shared cache lines. Shared access is atomic add for writers
//! and atomic load for readers; no consistency across fields is promised, and
//! the canonical read happens after every worker has joined.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Shared counters, updated by atomic add from any number of threads.
#[derive(Debug, Default)]
pub struct Stats {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    total_latency_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every counter.
    #[allow(dead_code)]
    pub fn reset(&self) {
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
        self.messages_sent.store(0, Ordering::Relaxed);
        self.messages_received.store(0, Ordering::Relaxed);
        self.total_latency_us.store(0, Ordering::Relaxed);
    }

    /// Record one transmitted message of `bytes` bytes.
    #[allow(dead_code)]
    pub fn record_send(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one received message of `bytes` bytes.
    #[allow(dead_code)]
    pub fn record_recv(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one round trip's latency.
    #[allow(dead_code)]
    pub fn record_latency(&self, micros: u64) {
        self.total_latency_us.fetch_add(micros, Ordering::Relaxed);
    }

    /// Fold a worker's local tallies in, one atomic add per counter.
    pub fn merge(&self, local: &LocalCounters) {
        self.bytes_sent.fetch_add(local.bytes_sent, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(local.bytes_received, Ordering::Relaxed);
        self.messages_sent
            .fetch_add(local.messages_sent, Ordering::Relaxed);
        self.messages_received
            .fetch_add(local.messages_received, Ordering::Relaxed);
        self.total_latency_us
            .fetch_add(local.total_latency_us, Ordering::Relaxed);
    }

    /// Point-in-time read of all five counters. Loads are independent;
    /// fields are mutually consistent only once writers have stopped.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            total_latency_us: self.total_latency_us.load(Ordering::Relaxed),
        }
    }
}

/// Per-thread tallies, kept out of shared memory until teardown.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub total_latency_us: u64,
}

impl LocalCounters {
    pub fn record_send(&mut self, bytes: u64) {
        self.bytes_sent += bytes;
        self.messages_sent += 1;
    }

    pub fn record_recv(&mut self, bytes: u64) {
        self.bytes_received += bytes;
        self.messages_received += 1;
    }

    pub fn record_latency(&mut self, micros: u64) {
        self.total_latency_us += micros;
    }
}

/// Final counter values plus the derivations the report needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub total_latency_us: u64,
}

impl StatsSnapshot {
    /// Mean round-trip latency in microseconds; zero when nothing completed.
    pub fn avg_latency_us(&self) -> f64 {
        if self.messages_received == 0 {
            return 0.0;
        }
        self.total_latency_us as f64 / self.messages_received as f64
    }

    /// Send-side throughput over `elapsed`, in gigabits per second.
    pub fn throughput_gbps(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        (self.bytes_sent as f64 * 8.0) / (secs * 1e9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_no_lost_updates_across_threads() {
        let stats = Arc::new(Stats::new());
        let threads = 8u64;
        let per_thread = 1000u64;

        let mut handles = Vec::new();
        for t in 0..threads {
            let stats = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for i in 0..per_thread {
                    stats.record_send(t * per_thread + i);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let expected: u64 = (0..threads)
            .flat_map(|t| (0..per_thread).map(move |i| t * per_thread + i))
            .sum();
        let snap = stats.snapshot();
        assert_eq!(snap.bytes_sent, expected);
        assert_eq!(snap.messages_sent, threads * per_thread);
    }

    #[test]
    fn test_concurrent_merges_lose_nothing() {
        let stats = Arc::new(Stats::new());
        let threads = 8u64;

        let mut handles = Vec::new();
        for _ in 0..threads {
            let stats = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                let mut local = LocalCounters::default();
                for _ in 0..500 {
                    local.record_send(64);
                    local.record_recv(64);
                    local.record_latency(10);
                }
                stats.merge(&local);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = stats.snapshot();
        assert_eq!(snap.messages_sent, threads * 500);
        assert_eq!(snap.messages_received, threads * 500);
        assert_eq!(snap.bytes_sent, threads * 500 * 64);
        assert_eq!(snap.bytes_received, threads * 500 * 64);
        assert_eq!(snap.total_latency_us, threads * 500 * 10);
    }

    #[test]
    fn test_merge_folds_local_counters() {
        let stats = Stats::new();
        let mut local = LocalCounters::default();
        local.record_send(100);
        local.record_send(100);
        local.record_recv(90);
        local.record_latency(42);
        stats.merge(&local);

        let snap = stats.snapshot();
        assert_eq!(snap.bytes_sent, 200);
        assert_eq!(snap.messages_sent, 2);
        assert_eq!(snap.bytes_received, 90);
        assert_eq!(snap.messages_received, 1);
        assert_eq!(snap.total_latency_us, 42);
    }

    #[test]
    fn test_average_latency_matches_sample_mean() {
        let stats = Stats::new();
        let samples = [120u64, 80, 100, 140, 60];
        for &sample in &samples {
            stats.record_recv(64);
            stats.record_latency(sample);
        }

        let mean = samples.iter().sum::<u64>() as f64 / samples.len() as f64;
        assert!((stats.snapshot().avg_latency_us() - mean).abs() < f64::EPSILON);
    }

    #[test]
    fn test_average_latency_zero_without_messages() {
        assert_eq!(Stats::new().snapshot().avg_latency_us(), 0.0);
    }

    #[test]
    fn test_throughput_derivation() {
        let snap = StatsSnapshot {
            bytes_sent: 125_000_000, // 1 Gbit
            bytes_received: 0,
            messages_sent: 1,
            messages_received: 0,
            total_latency_us: 0,
        };
        assert!((snap.throughput_gbps(Duration::from_secs(1)) - 1.0).abs() < 1e-9);
        assert_eq!(snap.throughput_gbps(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_reset_zeroes_counters() {
        let stats = Stats::new();
        stats.record_send(10);
        stats.record_recv(10);
        stats.record_latency(5);
        stats.reset();

        let snap = stats.snapshot();
        assert_eq!(snap.bytes_sent, 0);
        assert_eq!(snap.bytes_received, 0);
        assert_eq!(snap.messages_sent, 0);
        assert_eq!(snap.messages_received, 0);
        assert_eq!(snap.total_latency_us, 0);
    }
}
