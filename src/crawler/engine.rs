//! Worker pool orchestration: pulls entries off the frontier, fetches,
//! parses, indexes, and re-offers discovered links, until the frontier
//! drains or a cancellation signal arrives.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::crawler::{Config, FetchOutcome, Fetcher, Frontier, RateLimiter, TakeOutcome};
use crate::output::{Snapshot, Stats};
use crate::state::FailureKind;
use crate::storage::{PageWrite, Storage};
use crate::url::extract_domain;

/// Bound on how long the engine waits for workers to exit after cancellation
/// before giving up and closing resources out from under them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// First 500 codepoints of `text`, as required for `text_preview`.
fn text_preview(text: &str) -> String {
    text.chars().take(500).collect()
}

pub struct Engine {
    config: Config,
    frontier: Arc<Frontier>,
    fetcher: Arc<Fetcher>,
    rate_limiter: Arc<RateLimiter>,
    stats: Arc<Stats>,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self, crate::CrawlerError> {
        let fetcher = Fetcher::new(config.timeout)?;
        let rate_limiter = RateLimiter::new(config.rate_per_second)?;
        let frontier = Frontier::new(config.max_depth, config.allowed_host.clone());
        Ok(Self {
            config,
            frontier: Arc::new(frontier),
            fetcher: Arc::new(fetcher),
            rate_limiter: Arc::new(rate_limiter),
            stats: Arc::new(Stats::new()),
        })
    }

    /// Runs the crawl to completion: seeds the frontier, spawns the worker
    /// pool, waits for drain or cancellation, then closes storage and
    /// returns the final snapshot plus elapsed wall time.
    pub async fn run(
        &self,
        storage: impl Storage + 'static,
        cancel: CancellationToken,
    ) -> Result<(Snapshot, Duration), crate::CrawlerError> {
        let start = Instant::now();

        self.frontier
            .seed(self.config.start_url.as_str())
            .await
            .map_err(crate::CrawlerError::Url)?;

        let storage = Arc::new(tokio::sync::Mutex::new(storage));

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(self.config.concurrency);
        for _ in 0..self.config.concurrency {
            let frontier = self.frontier.clone();
            let fetcher = self.fetcher.clone();
            let rate_limiter = self.rate_limiter.clone();
            let stats = self.stats.clone();
            let storage = storage.clone();
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                worker_loop(frontier, fetcher, rate_limiter, stats, storage, cancel).await;
            }));
        }

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        tokio::select! {
            _ = wait_all(&mut handles) => {}
            _ = &mut ctrl_c => {
                tracing::warn!("interrupt received, shutting down crawl");
                cancel.cancel();
                let _ = tokio::time::timeout(SHUTDOWN_GRACE, wait_all(&mut handles)).await;
            }
            _ = cancel.cancelled() => {
                let _ = tokio::time::timeout(SHUTDOWN_GRACE, wait_all(&mut handles)).await;
            }
        }

        self.fetcher.close();

        let mut guard = storage.lock().await;
        guard.close()?;

        Ok((self.stats.snapshot(), start.elapsed()))
    }
}

async fn wait_all(handles: &mut [JoinHandle<()>]) {
    for handle in handles.iter_mut() {
        let _ = handle.await;
    }
}

async fn worker_loop(
    frontier: Arc<Frontier>,
    fetcher: Arc<Fetcher>,
    rate_limiter: Arc<RateLimiter>,
    stats: Arc<Stats>,
    storage: Arc<tokio::sync::Mutex<impl Storage>>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let entry = match frontier.take().await {
            TakeOutcome::Entry(entry) => entry,
            TakeOutcome::Drained => return,
        };

        let host = extract_domain(&entry.url).unwrap_or_default();

        tokio::select! {
            _ = rate_limiter.acquire(&host) => {}
            _ = cancel.cancelled() => {
                frontier.done(&entry.url).await;
                return;
            }
        }

        let outcome = fetcher.fetch(&entry.url, &cancel).await;

        match outcome {
            FetchOutcome::Success {
                final_url,
                body,
                elapsed,
                ..
            } => {
                stats.record_fetched();
                tracing::info!(url = %final_url, ?elapsed, "fetched page");

                match crate::crawler::parse(&body, &final_url) {
                    Ok(parsed) => {
                        let write = PageWrite {
                            url: final_url.to_string(),
                            title: if parsed.title.is_empty() {
                                None
                            } else {
                                Some(parsed.title.clone())
                            },
                            keywords: parsed.keywords.clone(),
                            text_preview: text_preview(&parsed.text),
                        };

                        // upsert_page is a blocking rusqlite call (and may sleep a
                        // full second on a transient-error retry); run it on a
                        // blocking-pool thread so it never stalls this worker's
                        // async executor thread.
                        let blocking_storage = storage.clone();
                        let indexed = tokio::task::spawn_blocking(move || {
                            let mut guard = blocking_storage.blocking_lock();
                            guard.upsert_page(&write)
                        })
                        .await
                        .expect("storage task panicked");

                        match indexed {
                            Ok(()) => {
                                stats.record_indexed();
                                if !cancel.is_cancelled() {
                                    let offer_stats =
                                        frontier.offer(&parsed.links, entry.depth).await;
                                    stats
                                        .skipped_depth
                                        .fetch_add(offer_stats.skipped_depth, std::sync::atomic::Ordering::Relaxed);
                                    stats
                                        .skipped_domain
                                        .fetch_add(offer_stats.skipped_domain, std::sync::atomic::Ordering::Relaxed);
                                    stats
                                        .skipped_visited
                                        .fetch_add(offer_stats.skipped_visited, std::sync::atomic::Ordering::Relaxed);
                                }
                            }
                            Err(e) => {
                                tracing::warn!(url = %final_url, error = %e, "index write failed");
                                stats.record_failure(FailureKind::Index);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(url = %final_url, error = %e, "parse failed");
                        stats.record_failure(FailureKind::Parse);
                    }
                }
            }
            FetchOutcome::Failure {
                kind,
                message,
                attempts,
            } => {
                if attempts > 1 {
                    stats.retries.fetch_add(
                        (attempts - 1) as u64,
                        std::sync::atomic::Ordering::Relaxed,
                    );
                }
                if kind == FailureKind::Canceled {
                    tracing::debug!(url = %entry.url, attempts, "fetch canceled");
                } else {
                    stats.record_fetched();
                    tracing::warn!(url = %entry.url, %kind, error = %message, attempts, "fetch failed");
                    stats.record_failure(kind);
                }
            }
        }

        frontier.done(&entry.url).await;
    }
}
