//! Live, atomic crawl counters, snapshotted for the final report.

use crate::state::FailureKind;
use std::sync::atomic::{AtomicU64, Ordering};

const FAILURE_KINDS: [FailureKind; 8] = [
    FailureKind::Timeout,
    FailureKind::Network,
    FailureKind::Http4xx,
    FailureKind::Http5xx,
    FailureKind::Oversize,
    FailureKind::BadContentType,
    FailureKind::Parse,
    FailureKind::Index,
];

/// Counters incremented concurrently by engine workers.
#[derive(Debug, Default)]
pub struct Stats {
    pub fetched: AtomicU64,
    pub indexed: AtomicU64,
    pub retries: AtomicU64,
    pub skipped_depth: AtomicU64,
    pub skipped_domain: AtomicU64,
    pub skipped_visited: AtomicU64,
    failed_timeout: AtomicU64,
    failed_network: AtomicU64,
    failed_http4xx: AtomicU64,
    failed_http5xx: AtomicU64,
    failed_oversize: AtomicU64,
    failed_bad_content_type: AtomicU64,
    failed_parse: AtomicU64,
    failed_index: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_indexed(&self) {
        self.indexed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a per-URL failure. Canceled outcomes are not counted, per
    /// the error taxonomy: cancellation ends the run, it isn't a failure
    /// kind to report.
    pub fn record_failure(&self, kind: FailureKind) {
        let counter = match kind {
            FailureKind::Timeout => &self.failed_timeout,
            FailureKind::Network => &self.failed_network,
            FailureKind::Http4xx => &self.failed_http4xx,
            FailureKind::Http5xx => &self.failed_http5xx,
            FailureKind::Oversize => &self.failed_oversize,
            FailureKind::BadContentType => &self.failed_bad_content_type,
            FailureKind::Parse => &self.failed_parse,
            FailureKind::Index => &self.failed_index,
            FailureKind::Canceled => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn failure_count(&self, kind: FailureKind) -> u64 {
        let counter = match kind {
            FailureKind::Timeout => &self.failed_timeout,
            FailureKind::Network => &self.failed_network,
            FailureKind::Http4xx => &self.failed_http4xx,
            FailureKind::Http5xx => &self.failed_http5xx,
            FailureKind::Oversize => &self.failed_oversize,
            FailureKind::BadContentType => &self.failed_bad_content_type,
            FailureKind::Parse => &self.failed_parse,
            FailureKind::Index => &self.failed_index,
            FailureKind::Canceled => return 0,
        };
        counter.load(Ordering::Relaxed)
    }

    /// Total failures across all kinds.
    pub fn total_failed(&self) -> u64 {
        FAILURE_KINDS.iter().map(|k| self.failure_count(*k)).sum()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            fetched: self.fetched.load(Ordering::Relaxed),
            indexed: self.indexed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            skipped_depth: self.skipped_depth.load(Ordering::Relaxed),
            skipped_domain: self.skipped_domain.load(Ordering::Relaxed),
            skipped_visited: self.skipped_visited.load(Ordering::Relaxed),
            failed_total: self.total_failed(),
            failed_by_kind: FAILURE_KINDS
                .iter()
                .map(|k| (*k, self.failure_count(*k)))
                .filter(|(_, count)| *count > 0)
                .collect(),
        }
    }
}

/// A point-in-time read of [`Stats`], taken once at shutdown for reporting.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub fetched: u64,
    pub indexed: u64,
    pub retries: u64,
    pub skipped_depth: u64,
    pub skipped_domain: u64,
    pub skipped_visited: u64,
    pub failed_total: u64,
    pub failed_by_kind: Vec<(FailureKind, u64)>,
}
