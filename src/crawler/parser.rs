//! Extracts title, visible text, keywords, and links from fetched HTML.

use crate::url::normalize_url;
use scraper::{Html, Selector};
use std::collections::HashMap;
use url::Url;

/// Number of keywords kept in a [`ParsedPage`].
const MAX_KEYWORDS: usize = 10;

/// Minimum token length considered as a keyword candidate.
const MIN_KEYWORD_LEN: usize = 3;

/// Common English words excluded from keyword extraction.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had",
    "her", "was", "one", "our", "out", "day", "get", "has", "him", "his", "how",
    "man", "new", "now", "old", "see", "two", "way", "who", "boy", "did", "its",
    "let", "put", "say", "she", "too", "use", "that", "with", "have", "this",
    "will", "your", "from", "they", "know", "want", "been", "good", "much",
    "some", "time", "very", "when", "come", "here", "just", "like", "long",
    "make", "many", "over", "such", "take", "than", "them", "well", "were",
];

/// Result of parsing an HTML page.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// Text of the first `<title>` element; empty if absent.
    pub title: String,
    /// Visible text outside `<script>`/`<style>`/`<noscript>`, whitespace collapsed.
    pub text: String,
    /// Up to [`MAX_KEYWORDS`] most frequent qualifying tokens, tie-broken by
    /// first occurrence.
    pub keywords: Vec<String>,
    /// Normalized absolute links discovered on the page.
    pub links: Vec<Url>,
}

/// Error returned when the HTML root cannot be meaningfully parsed.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("HTML body could not be decoded")]
    Decode,
}

/// Parses `body` fetched from `page_url`, extracting metadata and links.
///
/// Never panics on malformed or deeply nested markup; `scraper`'s
/// `html5ever`-backed parser always produces a best-effort tree, so this
/// only errs on the degenerate case of a body that isn't valid UTF-8 text
/// (callers are expected to have already checked `Content-Type`).
pub fn parse(body: &str, page_url: &Url) -> Result<ParsedPage, ParseError> {
    let document = Html::parse_document(body);

    let title = extract_title(&document);
    let text = extract_text(&document);
    let keywords = extract_keywords(&text);
    let links = extract_links(&document, page_url);

    Ok(ParsedPage {
        title,
        text,
        keywords,
        links,
    })
}

fn extract_title(document: &Html) -> String {
    let selector = Selector::parse("title").expect("static selector");
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Tag names whose text content is never visible to a reader.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript"];

fn extract_text(document: &Html) -> String {
    let body_selector = Selector::parse("body").expect("static selector");
    let root = match document.select(&body_selector).next() {
        Some(body) => body,
        None => document.root_element(),
    };

    let mut text = String::new();
    for node in root.descendants() {
        if let Some(element) = node.value().as_element() {
            if HIDDEN_TAGS.contains(&element.name()) {
                continue;
            }
        }
        if let Some(t) = node.value().as_text() {
            let parent_is_hidden = node
                .parent()
                .and_then(|p| p.value().as_element())
                .map(|e| HIDDEN_TAGS.contains(&e.name()))
                .unwrap_or(false);
            if !parent_is_hidden {
                text.push_str(t);
                text.push(' ');
            }
        }
    }

    collapse_whitespace(&text)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_keywords(text: &str) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut order = 0usize;

    for raw_token in text.split_whitespace() {
        let token: String = raw_token
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect();

        if token.chars().count() < MIN_KEYWORD_LEN {
            continue;
        }
        if STOPWORDS.contains(&token.as_str()) {
            continue;
        }

        *counts.entry(token.clone()).or_insert(0) += 1;
        first_seen.entry(token).or_insert_with(|| {
            order += 1;
            order
        });
    }

    let mut tokens: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(token, count)| {
            let first = *first_seen.get(&token).unwrap_or(&usize::MAX);
            (token, count, first)
        })
        .collect();

    tokens.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    tokens
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(token, _, _)| token)
        .collect()
}

fn extract_links(document: &Html, page_url: &Url) -> Vec<Url> {
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                if let Some(url) = resolve_link(href, page_url) {
                    links.push(url);
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(url) = resolve_link(href, page_url) {
                    links.push(url);
                }
            }
        }
    }

    links
}

fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }
    normalize_url(href, Some(base)).ok()
}
