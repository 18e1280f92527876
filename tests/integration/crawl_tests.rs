//! Integration tests for the crawl engine
//!
//! These tests use wiremock to create mock HTTP servers and drive the real
//! HTTP fetcher through full crawl passes.

use crate::common::{create_test_config, html_page, open_index, USER_AGENT};
use gugel::access::AccessCoordinator;
use gugel::crawler::CrawlEngine;
use gugel::index::IndexStore;
use gugel::state::{PendingUpdates, VisitedSet};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_page(server: &MockServer, page: &str, links: &[&str], expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html_page(page, links))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_five_page_graph_is_crawled_once_per_page() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    mount_page(&mock_server, "/", &["/a.html", "/b.html"], 1).await;
    mount_page(&mock_server, "/a.html", &["/c.html", "/"], 1).await;
    mount_page(&mock_server, "/b.html", &["d.html", "a.html#section"], 1).await;
    mount_page(&mock_server, "/c.html", &["/d.html", "https://elsewhere.example.org/"], 1).await;
    mount_page(&mock_server, "/d.html", &["/", "c.html"], 1).await;

    let coordinator = AccessCoordinator::start();
    let site = &config.sites[0];
    let mut engine = CrawlEngine::for_site(&config, site, coordinator.handle()).unwrap();
    let report = engine.crawl_all(&site.all_seeds()).await.unwrap();

    assert_eq!(report.fetched, 5);
    assert_eq!(report.flushed, 5);
    assert_eq!(engine.frontier_len(), 0);

    let index = open_index(&config);
    assert_eq!(index.count().unwrap(), 5);
    let base = mock_server.uri();
    for page in ["/", "/a.html", "/b.html", "/c.html", "/d.html"] {
        assert!(index.exists(&format!("{}{}", base, page)).unwrap(), "{} not indexed", page);
    }
    let doc = index.get(&format!("{}/c.html", base)).unwrap().unwrap();
    assert_eq!(doc.title, "/c.html");
    assert!(doc.content.contains("Content of /c.html"));
}

#[tokio::test]
async fn test_rate_limited_page_succeeds_in_second_sweep() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    mount_page(&mock_server, "/", &["/busy.html"], 1).await;
    Mock::given(method("GET"))
        .and(path("/busy.html"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/busy.html", &[], 1).await;

    let coordinator = AccessCoordinator::start();
    let site = &config.sites[0];
    let mut engine = CrawlEngine::for_site(&config, site, coordinator.handle()).unwrap();
    let report = engine.crawl(&site.start_url).await.unwrap();

    assert_eq!(report.retried, 1);
    assert_eq!(report.deferred, 0);
    assert!(engine.pending().is_empty());
    assert!(!engine.visited().contains(&format!("{}/busy.html", mock_server.uri())));

    let index = open_index(&config);
    assert!(index.exists(&format!("{}/busy.html", mock_server.uri())).unwrap());
}

#[tokio::test]
async fn test_not_indexable_pages_are_persisted_and_never_refetched() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);
    let base = mock_server.uri();

    mount_page(&mock_server, "/", &["/archive.zip", "/missing.html"], 2).await;
    Mock::given(method("GET"))
        .and(path("/archive.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 16], "application/zip"))
        .expect(1)
        .mount(&mock_server)
        .await;
    // /missing.html has no mock and answers 404

    let coordinator = AccessCoordinator::start();
    let site = &config.sites[0];
    {
        let mut engine = CrawlEngine::for_site(&config, site, coordinator.handle()).unwrap();
        let report = engine.crawl(&site.start_url).await.unwrap();
        assert_eq!(report.skipped, 2);
    }

    let state_dir = site.state_dir(&config.storage);
    let visited = VisitedSet::load_in(&state_dir).unwrap();
    assert!(visited.contains(&format!("{}/archive.zip", base)));
    assert!(visited.contains(&format!("{}/missing.html", base)));

    // A cold restart reads the visited file and leaves both alone
    let mut engine = CrawlEngine::for_site(&config, site, coordinator.handle()).unwrap();
    assert_eq!(engine.visited().len(), 2);

    // The start page itself is indexed now, so crawl a fresh copy of it
    open_index(&config).delete(&format!("{}/", base)).unwrap();
    let report = engine.crawl(&site.start_url).await.unwrap();
    assert_eq!(report.fetched, 1);
}

#[tokio::test]
async fn test_slow_page_becomes_pending_update() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    mount_page(&mock_server, "/", &["/slow.html"], 1).await;
    Mock::given(method("GET"))
        .and(path("/slow.html"))
        .respond_with(html_page("/slow.html", &[]).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let coordinator = AccessCoordinator::start();
    let site = &config.sites[0];
    let mut engine = CrawlEngine::for_site(&config, site, coordinator.handle()).unwrap();
    let before = chrono::Utc::now() - chrono::Duration::seconds(1);
    let report = engine.crawl(&site.start_url).await.unwrap();

    assert_eq!(report.deferred, 1);

    let pending = PendingUpdates::load_in(&site.state_dir(&config.storage)).unwrap();
    assert_eq!(pending.len(), 1);
    let entry = &pending.entries()[0];
    assert_eq!(entry.url, format!("{}/slow.html", mock_server.uri()));
    assert!(entry.last_seen >= before);

    let index = open_index(&config);
    assert!(!index.exists(&entry.url).unwrap());
    assert_eq!(index.count().unwrap(), 1);
}

#[tokio::test]
async fn test_requests_carry_identifying_user_agent() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(html_page("/", &[]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let coordinator = AccessCoordinator::start();
    let site = &config.sites[0];
    let mut engine = CrawlEngine::for_site(&config, site, coordinator.handle()).unwrap();
    let report = engine.crawl(&site.start_url).await.unwrap();

    assert_eq!(report.indexed, 1);
}
