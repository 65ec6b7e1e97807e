//! In-memory crawl frontier: a queue of unvisited URLs plus a single
//! enqueued-or-visited set used for deduplication.

use crate::url::{extract_domain, host_matches, normalize_url};
use std::collections::{HashSet, VecDeque};
use tokio::sync::{Mutex, Notify};
use url::Url;

/// Soft cap on the number of queued-but-unfetched entries, bounding memory
/// on pathological fan-outs. Entries discovered past this cap are dropped
/// as `skipped_domain` overflow rather than grown unboundedly.
const MAX_QUEUED: usize = 1_000_000;

/// A URL paired with the depth at which it was discovered.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: u32,
}

/// Outcome of [`Frontier::take`].
pub enum TakeOutcome {
    Entry(FrontierEntry),
    /// Queue is empty and no worker has outstanding work: the crawl is done.
    Drained,
}

struct Inner {
    queue: VecDeque<FrontierEntry>,
    seen: HashSet<String>,
    in_flight: usize,
}

/// Counts of links dropped by `offer`, surfaced to the stats aggregator.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfferStats {
    pub skipped_depth: u64,
    pub skipped_domain: u64,
    pub skipped_visited: u64,
}

pub struct Frontier {
    inner: Mutex<Inner>,
    notify: Notify,
    max_depth: Option<u32>,
    allowed_host: Option<String>,
}

impl Frontier {
    pub fn new(max_depth: Option<u32>, allowed_host: Option<String>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                seen: HashSet::new(),
                in_flight: 0,
            }),
            notify: Notify::new(),
            max_depth,
            allowed_host,
        }
    }

    /// Normalizes and enqueues the seed URL at depth 0, unless it's already
    /// been seeded (idempotent across repeated calls).
    pub async fn seed(&self, raw: &str) -> Result<(), crate::UrlError> {
        let url = normalize_url(raw, None)?;
        let key = url.as_str().to_string();
        let mut inner = self.inner.lock().await;
        if inner.seen.insert(key) {
            inner.queue.push_back(FrontierEntry { url, depth: 0 });
            self.notify.notify_waiters();
        }
        Ok(())
    }

    /// Offers links discovered on a page fetched at `parent_depth`, applying
    /// depth/domain/dedup filters. Links that fail normalization are
    /// dropped silently (the parser already normalizes, so this only
    /// matters for manually constructed links in tests).
    pub async fn offer(&self, links: &[Url], parent_depth: u32) -> OfferStats {
        let mut stats = OfferStats::default();
        let depth = parent_depth + 1;

        if let Some(max_depth) = self.max_depth {
            if depth > max_depth {
                stats.skipped_depth = links.len() as u64;
                return stats;
            }
        }

        let mut inner = self.inner.lock().await;
        for link in links {
            if let Some(allowed) = &self.allowed_host {
                match extract_domain(link) {
                    Some(host) if host_matches(allowed, &host) => {}
                    _ => {
                        stats.skipped_domain += 1;
                        continue;
                    }
                }
            }

            if inner.queue.len() >= MAX_QUEUED {
                stats.skipped_domain += 1;
                continue;
            }

            let key = link.as_str().to_string();
            if inner.seen.insert(key) {
                inner.queue.push_back(FrontierEntry {
                    url: link.clone(),
                    depth,
                });
            } else {
                stats.skipped_visited += 1;
            }
        }
        drop(inner);
        self.notify.notify_waiters();
        stats
    }

    /// Returns the next entry, or [`TakeOutcome::Drained`] once the queue is
    /// empty and no worker has outstanding work. Suspends (cooperatively,
    /// re-checking on every wakeup) while the queue is empty but other
    /// workers are still in flight.
    pub async fn take(&self) -> TakeOutcome {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(entry) = inner.queue.pop_front() {
                    inner.in_flight += 1;
                    return TakeOutcome::Entry(entry);
                }
                if inner.in_flight == 0 {
                    return TakeOutcome::Drained;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Marks `url` as visited and decrements the in-flight counter, waking
    /// any worker blocked in `take`.
    pub async fn done(&self, url: &Url) {
        let mut inner = self.inner.lock().await;
        inner.seen.insert(url.as_str().to_string());
        inner.in_flight = inner.in_flight.saturating_sub(1);
        drop(inner);
        self.notify.notify_waiters();
    }
}
