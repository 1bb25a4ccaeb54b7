//! End-to-end engine scenarios against a local mock server.

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use webvault::config::{CrawlConfig, CrawlConfigBuilder};
use webvault::crawl_engine::{CrawlEngine, CrawlOutcome};
use webvault::crawl_events::{EventBroadcaster, NoOpEmitter};
use webvault::crawl_state::CrawlState;

/// A page body with the given links and comfortably more than 100 chars of
/// visible text.
fn page(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!("<a href=\"{href}\">link to {href}</a>"))
        .collect();
    format!(
        "<html><body><main><p>{}</p>{anchors}</main></body></html>",
        "Plenty of visible article text so the content filter admits this page. ".repeat(3)
    )
}

fn test_config(server_url: &str, dir: &TempDir) -> CrawlConfigBuilder<webvault::config::builder::WithSeedUrl> {
    CrawlConfig::builder()
        .seed_url(server_url)
        .output_dir(dir.path().join("out"))
        .state_file(dir.path().join("state.json"))
        .delay(Duration::from_millis(10))
}

fn engine(config: CrawlConfig) -> Arc<CrawlEngine> {
    Arc::new(CrawlEngine::new(config, CancellationToken::new(), Arc::new(NoOpEmitter)).unwrap())
}

async fn html_mock(server: &mut mockito::Server, path: &str, body: String) -> mockito::Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(body)
        .create_async()
        .await
}

#[tokio::test]
async fn crawls_seed_and_linked_pages() {
    let mut server = mockito::Server::new_async().await;
    let _root = html_mock(&mut server, "/", page(&["/a", "/b"])).await;
    let _a = html_mock(&mut server, "/a", page(&[])).await;
    let _b = html_mock(&mut server, "/b", page(&[])).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), &dir).build().unwrap();
    let out = config.output_dir.clone();
    let state_file = config.state_file.clone();

    let outcome = engine(config).start().await.unwrap();
    assert_eq!(outcome, CrawlOutcome::Completed);

    for file in ["index.html", "a.html", "b.html"] {
        assert!(out.join(file).exists(), "{file} missing");
        let meta = format!("{}.meta.json", file.trim_end_matches(".html"));
        assert!(out.join(meta).exists(), "metadata for {file} missing");
    }

    let state = CrawlState::load(&state_file).await.unwrap().expect("state written");
    assert_eq!(state.visited_count(), 3);
    assert_eq!(state.frontier_len(), 0);
    assert!(state.invariants_hold());
}

#[tokio::test]
async fn concurrent_mode_reaches_the_same_pages() {
    let mut server = mockito::Server::new_async().await;
    let _root = html_mock(&mut server, "/", page(&["/a", "/b", "/c"])).await;
    let _a = html_mock(&mut server, "/a", page(&["/b"])).await;
    let _b = html_mock(&mut server, "/b", page(&[])).await;
    let _c = html_mock(&mut server, "/c", page(&[])).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), &dir).concurrent(true).build().unwrap();
    let out = config.output_dir.clone();

    let outcome = engine(config).start().await.unwrap();
    assert_eq!(outcome, CrawlOutcome::Completed);

    for file in ["index.html", "a.html", "b.html", "c.html"] {
        assert!(out.join(file).exists(), "{file} missing");
    }
}

#[tokio::test]
async fn prefix_filter_keeps_the_crawl_in_scope() {
    let mut server = mockito::Server::new_async().await;
    let _docs = html_mock(&mut server, "/docs", page(&["/docs/guide", "/blog"])).await;
    let _guide = html_mock(&mut server, "/docs/guide", page(&[])).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&format!("{}/docs", server.url()), &dir)
        .prefix_filter(format!("{}/docs", server.url()))
        .build()
        .unwrap();
    let out = config.output_dir.clone();

    let engine = engine(config);
    engine.clone().start().await.unwrap();

    assert!(out.join("docs.html").exists());
    assert!(out.join("docs/guide.html").exists());
    assert!(!out.join("blog.html").exists());

    let metrics = engine.metrics_snapshot();
    assert!(metrics.urls_skipped >= 1, "prefix rejection must count as skipped");
}

#[tokio::test]
async fn depth_limit_stops_the_chain() {
    let mut server = mockito::Server::new_async().await;
    let _a = html_mock(&mut server, "/", page(&["/b"])).await;
    let _b = html_mock(&mut server, "/b", page(&["/c"])).await;
    let c = server
        .mock("GET", "/c")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(page(&[]))
        .expect(0)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), &dir).max_depth(1).build().unwrap();
    let out = config.output_dir.clone();

    let engine = engine(config);
    engine.clone().start().await.unwrap();

    assert!(out.join("index.html").exists());
    assert!(out.join("b.html").exists());
    assert!(!out.join("c.html").exists());
    assert!(engine.metrics_snapshot().depth_limit_hits >= 1);
    c.assert_async().await;
}

#[tokio::test]
async fn max_depth_zero_processes_only_the_seed() {
    let mut server = mockito::Server::new_async().await;
    let _root = html_mock(&mut server, "/", page(&["/a"])).await;
    let a = server
        .mock("GET", "/a")
        .with_status(200)
        .with_body(page(&[]))
        .expect(0)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), &dir).max_depth(0).build().unwrap();
    let out = config.output_dir.clone();

    engine(config).start().await.unwrap();

    assert!(out.join("index.html").exists());
    assert!(!out.join("a.html").exists());
    a.assert_async().await;
}

#[tokio::test]
async fn url_variants_collapse_to_one_page() {
    let mut server = mockito::Server::new_async().await;
    let _root = html_mock(
        &mut server,
        "/",
        page(&["/a", "/a/", "/a#section", "/p?a=1&b=2", "/p?b=2&a=1"]),
    )
    .await;
    let a = server
        .mock("GET", "/a")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(page(&[]))
        .expect(1)
        .create_async()
        .await;
    let p = server
        .mock("GET", "/p")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(page(&[]))
        .expect(1)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), &dir).build().unwrap();
    let state_file = config.state_file.clone();

    engine(config).start().await.unwrap();

    a.assert_async().await;
    p.assert_async().await;

    let state = CrawlState::load(&state_file).await.unwrap().unwrap();
    // Seed + /a + /p: the fragment, slash, and query-order variants are gone.
    assert_eq!(state.visited_count(), 3);
}

#[tokio::test]
async fn robots_rules_are_enforced_and_ignorable() {
    let mut server = mockito::Server::new_async().await;
    let _robots = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body("User-agent: *\nDisallow: /private\n")
        .create_async()
        .await;
    let _root = html_mock(&mut server, "/", page(&["/private"])).await;
    let _private = html_mock(&mut server, "/private", page(&[])).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), &dir).build().unwrap();
    let out = config.output_dir.clone();
    let engine1 = engine(config);
    engine1.clone().start().await.unwrap();

    assert!(!out.join("private.html").exists());
    assert!(engine1.metrics_snapshot().robots_blocked >= 1);

    // Same site with enforcement off.
    let dir2 = TempDir::new().unwrap();
    let config = test_config(&server.url(), &dir2).ignore_robots(true).build().unwrap();
    let out2 = config.output_dir.clone();
    engine(config).start().await.unwrap();
    assert!(out2.join("private.html").exists());
}

#[tokio::test]
async fn excluded_content_type_is_skipped_on_receipt() {
    let mut server = mockito::Server::new_async().await;
    let _root = html_mock(&mut server, "/", page(&["/asset"])).await;
    let _asset = server
        .mock("GET", "/asset")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(page(&[]))
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), &dir)
        .exclude_extensions(vec!["png".to_string()])
        .build()
        .unwrap();
    let out = config.output_dir.clone();

    engine(config).start().await.unwrap();
    assert!(out.join("index.html").exists());
    assert!(!out.join("asset.html").exists());
}

#[tokio::test]
async fn thin_pages_are_content_filtered() {
    let mut server = mockito::Server::new_async().await;
    let _root = html_mock(&mut server, "/", page(&["/thin"])).await;
    let _thin = html_mock(
        &mut server,
        "/thin",
        "<html><body><p>too short</p></body></html>".to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), &dir).build().unwrap();
    let out = config.output_dir.clone();

    let engine = engine(config);
    engine.clone().start().await.unwrap();

    assert!(!out.join("thin.html").exists());
    assert_eq!(engine.metrics_snapshot().content_filtered, 1);
}

#[tokio::test]
async fn transport_errors_and_server_errors_do_not_kill_the_crawl() {
    let mut server = mockito::Server::new_async().await;
    // /broken answers 500, /refused has no listener, /gone is unmocked (501).
    let _root = html_mock(
        &mut server,
        "/",
        page(&["/broken", "/gone", "http://127.0.0.1:1/refused"]),
    )
    .await;
    let _broken = server
        .mock("GET", "/broken")
        .with_status(500)
        .with_body("oops")
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), &dir).build().unwrap();
    let out = config.output_dir.clone();

    let engine = engine(config);
    let outcome = engine.clone().start().await.unwrap();
    assert_eq!(outcome, CrawlOutcome::Completed);
    assert!(out.join("index.html").exists());

    // Non-success statuses are skips; only the refused connection is an error.
    assert_eq!(engine.metrics_snapshot().urls_errored, 1);
}

#[tokio::test]
async fn corrupt_state_file_is_a_fatal_init_error() {
    let server = mockito::Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let state_file = dir.path().join("state.json");
    tokio::fs::write(&state_file, "{broken").await.unwrap();

    let config = test_config(&server.url(), &dir).build().unwrap();
    let result = engine(config).start().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn cancel_checkpoints_and_resume_skips_visited() {
    let mut server = mockito::Server::new_async().await;
    let root = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(page(&["/p1", "/p2", "/p3", "/p4"]))
        .expect(1)
        .create_async()
        .await;
    let mut page_mocks = Vec::new();
    for path in ["/p1", "/p2", "/p3", "/p4"] {
        page_mocks.push(html_mock(&mut server, path, page(&[])).await);
    }

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), &dir)
        .delay(Duration::from_millis(300))
        .build()
        .unwrap();
    let state_file = config.state_file.clone();

    let cancel = CancellationToken::new();
    let first =
        Arc::new(CrawlEngine::new(config.clone(), cancel.clone(), Arc::new(NoOpEmitter)).unwrap());
    let handle = tokio::spawn(first.clone().start());

    // Wait for the first save, then cancel mid-delay.
    tokio::time::timeout(Duration::from_secs(10), async {
        while first.metrics_snapshot().urls_saved < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first page never saved");
    cancel.cancel();

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome, CrawlOutcome::Stopped);

    let state = CrawlState::load(&state_file).await.unwrap().expect("checkpoint written");
    assert!(state.frontier_len() > 0, "queue must survive cancellation");

    // Resume with a fast delay; the seed must not be fetched again.
    let config = webvault::config::CrawlConfig {
        delay: Duration::from_millis(10),
        ..config
    };
    let outcome = engine(config).start().await.unwrap();
    assert_eq!(outcome, CrawlOutcome::Completed);

    let state = CrawlState::load(&state_file).await.unwrap().unwrap();
    assert_eq!(state.visited_count(), 5);
    root.assert_async().await;
}

#[tokio::test]
async fn pause_blocks_progress_until_resume() {
    let mut server = mockito::Server::new_async().await;
    let _root = html_mock(&mut server, "/", page(&["/a"])).await;
    let _a = html_mock(&mut server, "/a", page(&[])).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), &dir).build().unwrap();

    let engine = engine(config);
    engine.pause();
    let handle = tokio::spawn(engine.clone().start());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.metrics_snapshot().urls_processed, 0, "paused engine must not work");

    engine.resume();
    let outcome = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(outcome, CrawlOutcome::Completed);
    assert_eq!(engine.metrics_snapshot().urls_saved, 2);
}

#[tokio::test]
async fn events_flow_to_subscribers() {
    let mut server = mockito::Server::new_async().await;
    let _root = html_mock(&mut server, "/", page(&["/a"])).await;
    let _a = html_mock(&mut server, "/a", page(&[])).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), &dir).build().unwrap();

    let broadcaster = EventBroadcaster::new();
    let mut subscription = broadcaster.subscribe();
    let engine = Arc::new(
        CrawlEngine::new(config, CancellationToken::new(), Arc::new(broadcaster.clone())).unwrap(),
    );
    engine.start().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = subscription.try_recv() {
        seen.push(event.event_type().to_string());
    }
    for expected in ["crawl_started", "url_saved", "progress", "state_changed", "crawl_completed"] {
        assert!(seen.iter().any(|t| t == expected), "missing {expected} in {seen:?}");
    }
}
