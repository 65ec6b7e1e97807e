//! Final crawl report: a single summary line with counters plus elapsed
//! wall time, emitted to the log/standard output on termination.

mod stats;

pub use stats::{Snapshot, Stats};

use std::time::Duration;

/// Formats the final summary line from a [`Snapshot`] and the crawl's total
/// elapsed wall time.
pub fn report(snapshot: &Snapshot, elapsed: Duration) -> String {
    let by_kind = if snapshot.failed_by_kind.is_empty() {
        String::new()
    } else {
        let parts: Vec<String> = snapshot
            .failed_by_kind
            .iter()
            .map(|(kind, count)| format!("{}={}", kind, count))
            .collect();
        format!(" ({})", parts.join(", "))
    };

    format!(
        "crawl complete: fetched={} indexed={} failed={}{} retries={} \
         skipped_depth={} skipped_domain={} skipped_visited={} elapsed={:.3}s",
        snapshot.fetched,
        snapshot.indexed,
        snapshot.failed_total,
        by_kind,
        snapshot.retries,
        snapshot.skipped_depth,
        snapshot.skipped_domain,
        snapshot.skipped_visited,
        elapsed.as_secs_f64(),
    )
}
