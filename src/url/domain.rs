use url::Url;

/// Extracts the lowercased host from a canonical URL.
///
/// Canonical URLs already carry a lowercase host (see
/// [`super::normalize_url`]); this is exposed separately so callers holding
/// a `Url` obtained elsewhere (e.g. a redirect target) can still get a
/// normalized host string.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use crawler_ripple::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
