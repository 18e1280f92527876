//! Integration tests for the update daemon

use crate::common::{create_test_config, html_page, open_index};
use chrono::{DateTime, Duration, TimeZone, Utc};
use gugel::access::AccessCoordinator;
use gugel::config::Config;
use gugel::daemon::{Schedule, UpdateDaemon};
use gugel::index::{Document, IndexStore};
use gugel::state::{PendingEntry, PendingUpdates, VisitedSet};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Whole seconds, as the index and the pending file store them
fn days_ago(days: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(Utc::now().timestamp(), 0).unwrap() - Duration::days(days)
}

fn seed_index(config: &Config, url: &str, observed_at: DateTime<Utc>) {
    open_index(config)
        .add(&Document::new(url, "Old title", "Old content", observed_at))
        .unwrap();
}

fn seed_pending(config: &Config, url: &str, last_seen: DateTime<Utc>) {
    let site = &config.sites[0];
    let mut pending = PendingUpdates::load_in(&site.state_dir(&config.storage)).unwrap();
    pending.push(PendingEntry::new(url, last_seen));
    pending.save().unwrap();
}

fn load_pending(config: &Config) -> PendingUpdates {
    let site = &config.sites[0];
    PendingUpdates::load_in(&site.state_dir(&config.storage)).unwrap()
}

#[tokio::test]
async fn test_stale_page_is_refreshed_and_links_followed() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/news.html"))
        .respond_with(html_page("Fresh news", &["/new.html"]))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new.html"))
        .respond_with(html_page("New page", &["/news.html"]))
        .expect(1)
        .mount(&mock_server)
        .await;

    seed_index(&config, &format!("{}/news.html", base), days_ago(45));

    let coordinator = AccessCoordinator::start();
    let mut daemon = UpdateDaemon::for_site(&config, &config.sites[0], coordinator.handle()).unwrap();
    let report = daemon.run_once().await.unwrap();

    assert_eq!(report.stale, 1);
    assert_eq!(report.refreshed, 1);
    assert_eq!(report.follow_up.flushed, 1);

    let index = open_index(&config);
    let doc = index.get(&format!("{}/news.html", base)).unwrap().unwrap();
    assert_eq!(doc.title, "Fresh news");
    assert!(doc.observed_at > days_ago(1));
    assert!(index.exists(&format!("{}/new.html", base)).unwrap());
}

#[tokio::test]
async fn test_old_slow_pending_entry_is_forgotten() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);
    let url = format!("{}/slow.html", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/slow.html"))
        .respond_with(html_page("Slow", &[]).set_delay(std::time::Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    seed_index(&config, &url, days_ago(200));
    seed_pending(&config, &url, days_ago(200));

    let coordinator = AccessCoordinator::start();
    let mut daemon = UpdateDaemon::for_site(&config, &config.sites[0], coordinator.handle()).unwrap();
    let report = daemon.run_once().await.unwrap();

    assert_eq!(report.carried_over, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.forgotten, 1);
    assert!(!open_index(&config).exists(&url).unwrap());
    assert!(load_pending(&config).is_empty());
}

#[tokio::test]
async fn test_rate_limited_page_keeps_original_timestamp() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);
    let url = format!("{}/busy.html", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/busy.html"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&mock_server)
        .await;

    let last_seen = days_ago(100);
    seed_index(&config, &url, last_seen);

    let coordinator = AccessCoordinator::start();
    let mut daemon = UpdateDaemon::for_site(&config, &config.sites[0], coordinator.handle()).unwrap();
    daemon.run_scheduled(Schedule::Once).await.unwrap();

    assert!(!open_index(&config).exists(&url).unwrap());
    let pending = load_pending(&config);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending.entries()[0], PendingEntry::new(url, last_seen));
}

#[tokio::test]
async fn test_gone_page_is_removed_and_marked_visited() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);
    // No mock: the server answers 404
    let url = format!("{}/gone.html", mock_server.uri());

    seed_index(&config, &url, days_ago(60));

    let coordinator = AccessCoordinator::start();
    let mut daemon = UpdateDaemon::for_site(&config, &config.sites[0], coordinator.handle()).unwrap();
    let report = daemon.run_once().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert!(!open_index(&config).exists(&url).unwrap());

    let site = &config.sites[0];
    let visited = VisitedSet::load_in(&site.state_dir(&config.storage)).unwrap();
    assert!(visited.contains(&url));
    assert!(load_pending(&config).is_empty());
}
