//! URL handling module for Pulscen-Harvest
//!
//! This module provides URL normalization, relative link resolution and the
//! stable product identifier derived from a product URL.

mod normalize;

use sha2::{Digest, Sha256};
use url::Url;

// Re-export main functions
pub use normalize::normalize_url;

/// Derives the stable product identifier for a product URL
///
/// The identifier is the lowercase hex SHA-256 of the normalized URL, so
/// cosmetic differences (tracking parameters, `www.`, trailing slashes,
/// fragments) map to the same product and re-runs upsert instead of
/// inserting duplicates.
///
/// # Examples
///
/// ```
/// use pulscen_harvest::url::product_id;
/// use url::Url;
///
/// let a = Url::parse("https://www.example.com/p/42/?utm_source=x").unwrap();
/// let b = Url::parse("https://example.com/p/42").unwrap();
/// assert_eq!(product_id(&a), product_id(&b));
/// ```
pub fn product_id(url: &Url) -> String {
    let canonical = normalize_url(url.as_str())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string());

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolves an href found on a page against the page URL
///
/// Returns None for empty hrefs, fragment-only anchors, `javascript:`,
/// `mailto:`, `tel:` and `data:` links, and anything that does not resolve
/// to an HTTP(S) URL.
pub fn resolve_href(href: &str, base_url: &Url) -> Option<Url> {
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

    match base_url.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute)
        }
        _ => None,
    }
}
