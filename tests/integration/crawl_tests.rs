//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use std::path::Path;
use std::time::Duration;

use crawler_ripple::crawler::{Config, Engine};
use crawler_ripple::storage::open_storage;
use crawler_ripple::url::normalize_url;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// A permissive default config pointed at `start_url`, with a high rate
/// limit so non-stress tests don't pay for per-host pacing.
fn test_config(start_url: &str, db_path: &Path) -> Config {
    Config {
        start_url: normalize_url(start_url, None).expect("valid seed"),
        max_depth: None,
        allowed_host: None,
        concurrency: 5,
        rate_per_second: 1000.0,
        db_path: db_path.to_path_buf(),
        timeout: Duration::from_secs(5),
    }
}

fn html(title: &str, body: &str) -> String {
    format!("<html><head><title>{}</title></head><body>{}</body></html>", title, body)
}

fn page_row(conn: &rusqlite::Connection, url: &str) -> Option<(Option<String>, String, String)> {
    conn.query_row(
        "SELECT title, keywords, text_preview FROM pages WHERE url = ?1",
        [url],
        |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    )
    .ok()
}

fn page_count(conn: &rusqlite::Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))
        .unwrap()
}

#[tokio::test]
async fn test_single_page_no_links() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html("T", "hello"))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let db_file = tempfile::NamedTempFile::new().unwrap();
    let config = test_config(&mock_server.uri(), db_file.path());
    let start_url = config.start_url.clone();

    let storage = open_storage(db_file.path()).unwrap();
    let engine = Engine::new(config).unwrap();
    let (snapshot, _elapsed) = engine
        .run(storage, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(snapshot.fetched, 1);
    assert_eq!(snapshot.indexed, 1);
    assert_eq!(snapshot.failed_total, 0);

    let conn = rusqlite::Connection::open(db_file.path()).unwrap();
    let (title, _keywords, preview) = page_row(&conn, start_url.as_str()).unwrap();
    assert_eq!(title, Some("T".to_string()));
    assert_eq!(preview, "hello");
}

#[tokio::test]
async fn test_linear_chain_respects_max_depth() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html("A", &format!(r#"<a href="{}/b">b</a>"#, base)))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html("B", &format!(r#"<a href="{}/c">c</a>"#, base)))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html("C", &format!(r#"<a href="{}/d">d</a>"#, base)))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;
    // /d is never mocked. If max_depth didn't hold it back, wiremock would
    // answer with its default 404 and the test would still fail on counts.

    let db_file = tempfile::NamedTempFile::new().unwrap();
    let mut config = test_config(&format!("{}/a", base), db_file.path());
    config.max_depth = Some(2);

    let storage = open_storage(db_file.path()).unwrap();
    let engine = Engine::new(config).unwrap();
    let (snapshot, _elapsed) = engine
        .run(storage, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(snapshot.fetched, 3);
    assert_eq!(snapshot.indexed, 3);
    assert!(snapshot.skipped_depth >= 1);
}

#[tokio::test]
async fn test_cycle_is_deduplicated() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    // Each page links back to itself and across to the other, so both the
    // self-link and the cross-link are rejected as already enqueued by the
    // time the second page is offered.
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html(
                    "A",
                    &format!(r#"<a href="{0}/a">self</a><a href="{0}/b">b</a>"#, base),
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html(
                    "B",
                    &format!(r#"<a href="{0}/a">a</a><a href="{0}/b">self</a>"#, base),
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let db_file = tempfile::NamedTempFile::new().unwrap();
    let config = test_config(&format!("{}/a", base), db_file.path());

    let storage = open_storage(db_file.path()).unwrap();
    let engine = Engine::new(config).unwrap();
    let (snapshot, _elapsed) = engine
        .run(storage, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(snapshot.fetched, 2);
    assert_eq!(snapshot.indexed, 2);
    assert_eq!(snapshot.skipped_visited, 2);
}

#[tokio::test]
async fn test_failure_mix_retries_and_kinds() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    let links = format!(
        r#"<a href="{0}/ok1">1</a><a href="{0}/ok2">2</a>
           <a href="{0}/broken">3</a><a href="{0}/missing">4</a>"#,
        base
    );
    Mock::given(method("GET"))
        .and(path("/hub"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html("Hub", &links))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html("Ok1", "fine"))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html("Ok2", "fine"))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;
    // Persistent 500: every attempt, initial plus all three retries, sees it.
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let db_file = tempfile::NamedTempFile::new().unwrap();
    let config = test_config(&format!("{}/hub", base), db_file.path());

    let storage = open_storage(db_file.path()).unwrap();
    let engine = Engine::new(config).unwrap();
    let (snapshot, _elapsed) = engine
        .run(storage, CancellationToken::new())
        .await
        .unwrap();

    // hub + ok1 + ok2
    assert_eq!(snapshot.indexed, 3);
    assert!(snapshot.retries >= 3);

    let http5xx = snapshot
        .failed_by_kind
        .iter()
        .find(|(kind, _)| kind.as_str() == "http_5xx")
        .map(|(_, count)| *count);
    assert_eq!(http5xx, Some(1));

    let http4xx = snapshot
        .failed_by_kind
        .iter()
        .find(|(kind, _)| kind.as_str() == "http_4xx")
        .map(|(_, count)| *count);
    assert_eq!(http4xx, Some(1));
}

/// Scenario 4: per-host rate limiting paces requests, so crawling a 20-page
/// fan-out at 2 req/s takes at least ~9.5s. Slow by design; run explicitly.
#[tokio::test]
#[ignore]
async fn test_rate_limit_paces_same_host_requests() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    let mut links = String::new();
    for i in 0..20 {
        links.push_str(&format!(r#"<a href="{}/p{}">p{}</a>"#, base, i, i));
    }
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html("Index", &links))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;
    for i in 0..20 {
        Mock::given(method("GET"))
            .and(path(format!("/p{}", i)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(html(&format!("P{}", i), "leaf"))
                    .insert_header("content-type", "text/html"),
            )
            .mount(&mock_server)
            .await;
    }

    let db_file = tempfile::NamedTempFile::new().unwrap();
    let mut config = test_config(&base, db_file.path());
    config.rate_per_second = 2.0;
    config.concurrency = 10;

    let storage = open_storage(db_file.path()).unwrap();
    let engine = Engine::new(config).unwrap();
    let (snapshot, elapsed) = engine
        .run(storage, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(snapshot.indexed, 21);
    assert!(elapsed >= Duration::from_millis(9500));
}

/// Scenario 6: a cancellation signal mid-crawl drains the engine quickly
/// and leaves whatever was already indexed in place. Slow by design.
#[tokio::test]
#[ignore]
async fn test_cancellation_drains_promptly() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    // Every page links to two more distinct pages, keyed by a counter
    // embedded in the path, producing fan-out well past anything a 200ms
    // crawl window could exhaust.
    Mock::given(method("GET"))
        .respond_with(|req: &Request| {
            let n: u64 = req
                .url
                .path()
                .trim_start_matches('/')
                .parse()
                .unwrap_or(0);
            let body = html(
                "Node",
                &format!(
                    r#"<a href="/{}">a</a><a href="/{}">b</a>"#,
                    n * 2 + 1,
                    n * 2 + 2
                ),
            );
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html")
        })
        .mount(&mock_server)
        .await;

    let db_file = tempfile::NamedTempFile::new().unwrap();
    let mut config = test_config(&format!("{}/0", base), db_file.path());
    config.concurrency = 10;

    let storage = open_storage(db_file.path()).unwrap();
    let engine = Engine::new(config).unwrap();
    let cancel = CancellationToken::new();

    let cancel_trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel_trigger.cancel();
    });

    let start = std::time::Instant::now();
    let (snapshot, _elapsed) = engine.run(storage, cancel).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(snapshot.indexed > 0);

    let conn = rusqlite::Connection::open(db_file.path()).unwrap();
    assert!(page_count(&conn) > 0);
}
