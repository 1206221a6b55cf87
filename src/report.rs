//! Final run report.
//!
//! Operational noise goes through tracing; the measurement results print to
//! stdout so they survive log filtering and stay scrapeable.

use std::time::Duration;

use crate::stats::StatsSnapshot;

/// Print the end-of-run summary for one side of the exchange.
///
/// Always called, even after partial failures: whatever was collected up to
/// shutdown gets reported.
pub fn print_summary(label: &str, snapshot: &StatsSnapshot, elapsed: Duration) {
    println!("\n=== {label} results ===");
    println!("Duration: {:.2} seconds", elapsed.as_secs_f64());
    println!(
        "Total bytes sent: {} ({:.2} GB)",
        snapshot.bytes_sent,
        snapshot.bytes_sent as f64 / 1e9
    );
    println!(
        "Total bytes received: {} ({:.2} GB)",
        snapshot.bytes_received,
        snapshot.bytes_received as f64 / 1e9
    );
    println!("Messages sent: {}", snapshot.messages_sent);
    println!("Messages received: {}", snapshot.messages_received);
    println!("Throughput: {:.4} Gbps", snapshot.throughput_gbps(elapsed));
    println!("Average latency: {:.2} us", snapshot.avg_latency_us());
}
