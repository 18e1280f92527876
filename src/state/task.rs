use url::Url;

/// A URL waiting to be fetched, with its distance from the seed of the pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: Url,
    pub depth: u32,
}

impl CrawlTask {
    /// The task a pass starts from
    pub fn seed(url: Url) -> Self {
        Self { url, depth: 0 }
    }

    /// A task for a link discovered on this task's page
    pub fn child(&self, url: Url) -> Self {
        Self {
            url,
            depth: self.depth + 1,
        }
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}
