use crate::UrlError;
use url::Url;

/// Maximum serialized length of a canonical URL, in bytes.
const MAX_URL_LENGTH: usize = 2048;

/// Normalizes a URL into its canonical form, resolving it against `base`
/// first if it's relative.
///
/// # Canonicalization
///
/// 1. Parse `raw`, resolving against `base` when `raw` is not absolute.
/// 2. Reject schemes other than `http`/`https`.
/// 3. Scheme and host are already lowercased and IDNA-encoded by the `url`
///    crate's parser for these schemes; reject if no host is present.
/// 4. The default port (80 for `http`, 443 for `https`) is already elided by
///    the parser's serialization.
/// 5. Collapse repeated path separators (`//` -> `/`).
/// 6. Strip the fragment.
/// 7. Query string is preserved verbatim.
/// 8. Reject if the serialized form exceeds [`MAX_URL_LENGTH`] bytes.
///
/// Two URLs are equal under this scheme iff their canonical forms are
/// byte-equal (see spec.md §3).
///
/// # Examples
///
/// ```
/// use crawler_ripple::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM:80//a//b/", None).unwrap();
/// assert_eq!(url.as_str(), "http://example.com/a/b/");
/// ```
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let mut url = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    }
    .map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(UrlError::MissingHost);
    }

    if !url.host_str().unwrap().is_ascii() {
        return Err(UrlError::InvalidHost);
    }

    let collapsed = collapse_slashes(url.path());
    if collapsed != url.path() {
        url.set_path(&collapsed);
    }

    url.set_fragment(None);

    if url.as_str().len() > MAX_URL_LENGTH {
        return Err(UrlError::TooLong {
            max: MAX_URL_LENGTH,
        });
    }

    Ok(url)
}

/// Collapses runs of consecutive `/` in a path down to a single `/`.
fn collapse_slashes(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut prev_was_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_was_slash {
                continue;
            }
            prev_was_slash = true;
        } else {
            prev_was_slash = false;
        }
        result.push(c);
    }
    result
}
