//! HTTP fetcher: a single shared client, streaming body reads with a size
//! cap, and a fixed retry ladder raced against cooperative cancellation.

use futures_util::StreamExt;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::state::FailureKind;
use crate::url::normalize_url;

/// Maximum response body size accepted before aborting as oversize.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Fixed backoff ladder applied to retryable failures.
const RETRY_DELAYS: &[Duration] = &[
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Result of fetching a single URL, after any internal retries.
#[derive(Debug)]
pub enum FetchOutcome {
    Success {
        final_url: Url,
        status: u16,
        body: String,
        content_type: String,
        elapsed: Duration,
    },
    Failure {
        kind: FailureKind,
        message: String,
        attempts: u32,
    },
}

pub struct Fetcher {
    client: std::sync::Mutex<Option<Client>>,
    timeout: Duration,
}

impl Fetcher {
    /// Builds the shared HTTP client: keep-alive pool, fixed user agent,
    /// gzip/brotli negotiation, and a bounded redirect policy (the final
    /// hop's URL is re-canonicalized by the caller).
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("ConcurrentCrawler/1.0")
            .redirect(Policy::limited(5))
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self {
            client: std::sync::Mutex::new(Some(client)),
            timeout,
        })
    }

    /// Returns the shared client, cheaply cloned (reqwest's `Client` is
    /// `Arc`-backed internally). Workers only ever call this before the
    /// engine awaits their shutdown, so the client is always present.
    fn client(&self) -> Client {
        self.client
            .lock()
            .expect("fetcher client mutex poisoned")
            .clone()
            .expect("fetcher used after close")
    }

    /// Drops the shared client, releasing its connection pool. Called once
    /// from the engine after every worker has exited, mirroring
    /// `Storage::close`'s take-and-drop shape.
    pub fn close(&self) {
        self.client
            .lock()
            .expect("fetcher client mutex poisoned")
            .take();
    }

    /// Fetches `url`, retrying retryable failures per the fixed backoff
    /// ladder. Every suspension point (the request, the body stream, and
    /// the backoff sleep) races against `cancel`.
    pub async fn fetch(&self, url: &Url, cancel: &CancellationToken) -> FetchOutcome {
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if cancel.is_cancelled() {
                return FetchOutcome::Failure {
                    kind: FailureKind::Canceled,
                    message: "canceled before attempt".to_string(),
                    attempts,
                };
            }

            let outcome = self.fetch_once(url, cancel).await;

            let (kind, message, retryable) = match outcome {
                FetchOutcome::Success { .. } => return outcome,
                FetchOutcome::Failure { kind, message, .. } => (kind, message, kind.is_retryable()),
            };

            let retry_index = (attempts - 1) as usize;
            if !retryable || retry_index >= RETRY_DELAYS.len() || kind == FailureKind::Canceled {
                return FetchOutcome::Failure {
                    kind,
                    message,
                    attempts,
                };
            }

            let delay = RETRY_DELAYS[retry_index];
            tracing::debug!(%url, attempt = attempts, ?delay, "retrying fetch");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return FetchOutcome::Failure {
                        kind: FailureKind::Canceled,
                        message: "canceled during backoff".to_string(),
                        attempts,
                    };
                }
            }
        }
    }

    async fn fetch_once(&self, url: &Url, cancel: &CancellationToken) -> FetchOutcome {
        let start = std::time::Instant::now();

        let request = self.client().get(url.clone()).timeout(self.timeout);

        let response = tokio::select! {
            result = request.send() => result,
            _ = cancel.cancelled() => {
                return FetchOutcome::Failure {
                    kind: FailureKind::Canceled,
                    message: "canceled during request".to_string(),
                    attempts: 1,
                };
            }
        };

        let response = match response {
            Ok(r) => r,
            Err(e) => return classify_request_error(&e),
        };

        let status = response.status();
        let final_url = match normalize_url(response.url().as_str(), None) {
            Ok(u) => u,
            Err(_) => response.url().clone(),
        };

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.starts_with("text/html") {
            return FetchOutcome::Failure {
                kind: FailureKind::BadContentType,
                message: format!("unexpected content-type: {}", content_type),
                attempts: 1,
            };
        }

        if status == StatusCode::NOT_FOUND || status.is_client_error() {
            return FetchOutcome::Failure {
                kind: FailureKind::Http4xx,
                message: format!("http {}", status.as_u16()),
                attempts: 1,
            };
        }
        if status.is_server_error() {
            return FetchOutcome::Failure {
                kind: FailureKind::Http5xx,
                message: format!("http {}", status.as_u16()),
                attempts: 1,
            };
        }

        let body = match self.read_body_capped(response, cancel).await {
            Ok(body) => body,
            Err(outcome) => return outcome,
        };

        FetchOutcome::Success {
            final_url,
            status: status.as_u16(),
            body,
            content_type,
            elapsed: start.elapsed(),
        }
    }

    async fn read_body_capped(
        &self,
        response: reqwest::Response,
        cancel: &CancellationToken,
    ) -> Result<String, FetchOutcome> {
        let mut stream = response.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();

        loop {
            let next = tokio::select! {
                chunk = stream.next() => chunk,
                _ = cancel.cancelled() => {
                    return Err(FetchOutcome::Failure {
                        kind: FailureKind::Canceled,
                        message: "canceled while reading body".to_string(),
                        attempts: 1,
                    });
                }
            };

            match next {
                Some(Ok(chunk)) => {
                    buf.extend_from_slice(&chunk);
                    if buf.len() > MAX_BODY_BYTES {
                        return Err(FetchOutcome::Failure {
                            kind: FailureKind::Oversize,
                            message: format!("body exceeded {} bytes", MAX_BODY_BYTES),
                            attempts: 1,
                        });
                    }
                }
                Some(Err(e)) => return Err(classify_request_error(&e)),
                None => break,
            }
        }

        String::from_utf8(buf).map_err(|_| FetchOutcome::Failure {
            kind: FailureKind::Network,
            message: "response body was not valid UTF-8".to_string(),
            attempts: 1,
        })
    }
}

fn classify_request_error(e: &reqwest::Error) -> FetchOutcome {
    let kind = if e.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Network
    };
    FetchOutcome::Failure {
        kind,
        message: e.to_string(),
        attempts: 1,
    }
}
