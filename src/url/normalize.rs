use crate::UrlError;
use url::Url;

/// Query parameters that only track the visitor and never change the page
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Link targets the index never stores
const EXCLUDED_EXTENSIONS: &[&str] = &[".img", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".pdf"];

/// `href` prefixes that never lead to a crawlable page
const NON_NAVIGATING_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Normalizes an absolute URL into the identity used for deduplication
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only `http` and `https`
/// 3. Require a host
/// 4. Remove the fragment
/// 5. Remove tracking query parameters, keeping the order of the rest
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use gugel::url::normalize_url;
///
/// let url = normalize_url("http://EXAMPLE.com/page?utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Resolves an `href` found on `base` into an absolute, normalized URL
///
/// Relative forms are resolved against the referencing page. Links that do
/// not navigate (`javascript:`, `mailto:`, fragment-only, ...), links to
/// other schemes and links to images or PDFs are rejected.
///
/// # Arguments
///
/// * `base` - URL of the page the link was found on
/// * `href` - Raw `href` attribute value
///
/// # Returns
///
/// * `Ok(Url)` - Absolute URL without fragment
/// * `Err(UrlError)` - The link is not a crawl candidate
pub fn resolve_link(base: &Url, href: &str) -> Result<Url, UrlError> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return Err(UrlError::Excluded(href.to_string()));
    }

    let lowered = href.to_ascii_lowercase();
    if NON_NAVIGATING_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return Err(UrlError::Excluded(href.to_string()));
    }

    let url = base.join(href).map_err(|e| UrlError::Parse(e.to_string()))?;
    let url = normalize_parsed(url)?;

    if has_excluded_extension(&url) {
        return Err(UrlError::Excluded(url.to_string()));
    }

    Ok(url)
}

fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    // Kept pairs stay byte-for-byte as they were
    if let Some(query) = url.query() {
        let pairs: Vec<&str> = query.split('&').filter(|pair| !pair.is_empty()).collect();
        let kept: Vec<&str> = pairs
            .iter()
            .copied()
            .filter(|pair| !is_tracking_pair(pair))
            .collect();

        if kept.len() < pairs.len() {
            let rewritten = kept.join("&");
            url.set_query(if rewritten.is_empty() { None } else { Some(&rewritten) });
        }
    }

    Ok(url)
}

/// True if the raw `key=value` segment carries a tracking key
fn is_tracking_pair(pair: &str) -> bool {
    url::form_urlencoded::parse(pair.as_bytes())
        .next()
        .map_or(false, |(key, _)| is_tracking_param(&key))
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

fn has_excluded_extension(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    EXCLUDED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://vm009.example.com/crawl/index.html").unwrap()
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.com/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_keeps_http() {
        let result = normalize_url("http://example.com/page").unwrap();
        assert_eq!(result.scheme(), "http");
    }

    #[test]
    fn test_lowercase_host() {
        let result = normalize_url("https://EXAMPLE.COM/Page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/Page");
    }

    #[test]
    fn test_remove_tracking_params() {
        let result = normalize_url(
            "https://example.com/page?keep=yes&utm_medium=email&b=2&fbclid=123",
        )
        .unwrap();
        assert_eq!(result.as_str(), "https://example.com/page?keep=yes&b=2");

        let result = normalize_url("https://example.com/page?utm_source=a&gclid=c").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_query_without_tracking_params_is_untouched() {
        for raw in [
            "https://example.com/page?flag",
            "https://example.com/search?q=a%20b&x=1",
            "https://example.com/list?a=1&&b=2",
        ] {
            assert_eq!(normalize_url(raw).unwrap().as_str(), raw);
        }
    }

    #[test]
    fn test_kept_params_keep_their_encoding() {
        let result = normalize_url("https://example.com/s?flag&utm_source=x&q=a%20b").unwrap();
        assert_eq!(result.as_str(), "https://example.com/s?flag&q=a%20b");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.com/page");
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_malformed_url() {
        assert!(matches!(normalize_url("not a url"), Err(UrlError::Parse(_))));
    }

    #[test]
    fn test_resolve_relative_link() {
        let url = resolve_link(&base(), "page2.html").unwrap();
        assert_eq!(url.as_str(), "https://vm009.example.com/crawl/page2.html");

        let url = resolve_link(&base(), "../top.html#anchor").unwrap();
        assert_eq!(url.as_str(), "https://vm009.example.com/top.html");

        let url = resolve_link(&base(), "/abs/path?q=1").unwrap();
        assert_eq!(url.as_str(), "https://vm009.example.com/abs/path?q=1");
    }

    #[test]
    fn test_resolve_absolute_link() {
        let url = resolve_link(&base(), "http://other.example.org/x#y").unwrap();
        assert_eq!(url.as_str(), "http://other.example.org/x");
    }

    #[test]
    fn test_resolve_rejects_non_navigating() {
        for href in [
            "",
            "   ",
            "#top",
            "javascript:void(0)",
            "JavaScript:alert(1)",
            "mailto:someone@example.com",
            "tel:+4912345",
            "data:text/plain,hi",
        ] {
            assert!(resolve_link(&base(), href).is_err(), "accepted {:?}", href);
        }
    }

    #[test]
    fn test_resolve_rejects_other_schemes() {
        let result = resolve_link(&base(), "ftp://example.com/file");
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_resolve_rejects_images_and_pdfs() {
        for href in ["logo.png", "photo.JPG", "paper.pdf", "x.img", "icon.svg"] {
            assert!(
                matches!(resolve_link(&base(), href), Err(UrlError::Excluded(_))),
                "accepted {}",
                href
            );
        }
        assert!(resolve_link(&base(), "pdf-overview.html").is_ok());
    }

    #[test]
    fn test_resolved_links_are_absolute_without_fragment() {
        for href in ["a.html#x", "./b.html", "/c#d", "https://vm009.example.com/e#f"] {
            let url = resolve_link(&base(), href).unwrap();
            assert!(url.fragment().is_none());
            assert!(url.has_host());
        }
    }
}
