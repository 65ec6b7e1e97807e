use std::fmt;

/// The kind of failure that ended a page's processing, mirroring the
/// taxonomy reported in the final summary line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Per-attempt timeout expired.
    Timeout,
    /// Connection-level failure (refused, DNS, TLS).
    Network,
    /// HTTP 4xx response (not retried).
    Http4xx,
    /// HTTP 5xx response, retries exhausted.
    Http5xx,
    /// Body exceeded the streaming size cap.
    Oversize,
    /// `Content-Type` did not start with `text/html`.
    BadContentType,
    /// HTML could not be parsed.
    Parse,
    /// Indexer write failed after its single retry.
    Index,
    /// The crawl was canceled while this page was in flight.
    Canceled,
}

impl FailureKind {
    /// Whether the fetcher's retry ladder applies to this kind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Network | Self::Http5xx)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Http4xx => "http_4xx",
            Self::Http5xx => "http_5xx",
            Self::Oversize => "oversize",
            Self::BadContentType => "bad_content_type",
            Self::Parse => "parse",
            Self::Index => "index",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
