//! URL handling module for Gugel
//!
//! This module provides link resolution, URL normalization and the
//! same-server check that confines a crawl pass to one server.

mod normalize;

use url::Url;

// Re-export main functions
pub use normalize::{normalize_url, resolve_link};

/// Returns true if both URLs point at the same server
///
/// Compares host and explicit port, ignoring the scheme, so `http://` and
/// `https://` links to the same host belong to one crawl.
///
/// # Examples
///
/// ```
/// use gugel::url::same_server;
/// use url::Url;
///
/// let a = Url::parse("http://example.com/a").unwrap();
/// let b = Url::parse("https://EXAMPLE.com/b").unwrap();
/// assert!(same_server(&a, &b));
/// ```
pub fn same_server(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port() == b.port()
}
