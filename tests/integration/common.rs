//! Shared fixtures for the integration tests

use gugel::config::{Config, CrawlerConfig, SiteConfig, StorageConfig, UpdateConfig, UserAgentConfig};
use gugel::index::SqliteIndex;
use tempfile::TempDir;
use wiremock::ResponseTemplate;

pub const USER_AGENT: &str = "TestBot/1.0.0 (+https://example.com/contact; test@example.com)";

/// Creates a test configuration with one site rooted at `base_url`
pub fn create_test_config(base_url: &str, dir: &TempDir) -> Config {
    Config {
        crawler: CrawlerConfig {
            default_timeout_ms: 200,
            timeout_step_ms: 100,
            timeout_ceiling_ms: 400,
            max_fetch_attempts: 3,
            batch_size: 2,
            max_depth: 10,
        },
        update: UpdateConfig::default(),
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        storage: StorageConfig {
            crawler_dir: dir.path().join("Crawler"),
            index_dir: dir.path().join("Index"),
        },
        sites: vec![SiteConfig {
            name: "test".to_string(),
            start_url: format!("{}/", base_url),
            path: "test".to_string(),
            seeds: Vec::new(),
        }],
    }
}

/// An HTML page with a title, some text and the given links
pub fn html_page(title: &str, links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
        .collect();
    let body = format!(
        "<html><head><title>{}</title></head><body><p>Content of {}</p>{}</body></html>",
        title, title, anchors
    );
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

/// Opens a second connection to the site's index
pub fn open_index(config: &Config) -> SqliteIndex {
    let site = &config.sites[0];
    SqliteIndex::open(&site.index_path(&config.storage)).expect("Failed to open index")
}
