//! Link enumerator: walks every page of a subcategory listing
//!
//! `ListingPager` is a pull-based cursor over the pages of one listing. The
//! cursor is just the URL of the next page; nothing about it outlives the
//! pager.

use crate::crawler::fetcher::Fetcher;
use crate::crawler::model::ProductLink;
use crate::crawler::parser::parse_listing_page;
use crate::url::normalize_url;
use crate::HarvestError;
use std::collections::HashSet;
use url::Url;

/// One fetched listing page
#[derive(Debug, Clone)]
pub struct ListingPage {
    /// 1-based position of the page within the listing
    pub index: u32,
    /// URL the page was requested from
    pub url: Url,
    pub links: Vec<ProductLink>,
}

/// Pull-based iterator over the pages of a listing
///
/// # Termination
///
/// Enumeration ends when a page has no `rel="next"` control, when a page
/// after the first has no product links, or when the next control points
/// (directly or through a redirect) back at a page already visited. Needing more than `max_pages` pages is
/// an error rather than a silent truncation.
pub struct ListingPager<'a> {
    fetcher: &'a Fetcher,
    listing_url: Url,
    next: Option<Url>,
    pages_fetched: u32,
    max_pages: u32,
    visited: HashSet<String>,
}

impl<'a> ListingPager<'a> {
    pub fn new(fetcher: &'a Fetcher, listing_url: Url, max_pages: u32) -> Self {
        Self {
            fetcher,
            next: Some(listing_url.clone()),
            listing_url,
            pages_fetched: 0,
            max_pages,
            visited: HashSet::new(),
        }
    }

    /// Number of pages fetched so far
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Fetches the next page of the listing
    ///
    /// # Returns
    ///
    /// * `Ok(Some(ListingPage))` - The next page and its product links
    /// * `Ok(None)` - The listing is exhausted
    /// * `Err(HarvestError::Fetch)` - A page could not be retrieved
    /// * `Err(HarvestError::PaginationLimitExceeded)` - More than `max_pages` pages
    pub async fn next_page(&mut self) -> Result<Option<ListingPage>, HarvestError> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };

        if self.pages_fetched >= self.max_pages {
            return Err(HarvestError::PaginationLimitExceeded {
                url: self.listing_url.to_string(),
                limit: self.max_pages,
            });
        }

        let page = self.fetcher.fetch(&url).await?;

        let landed = page_key(&page.final_url);
        if self.visited.contains(&landed) {
            tracing::debug!(
                url = %url,
                final_url = %page.final_url,
                "next page redirected to a visited page, stopping"
            );
            return Ok(None);
        }

        self.pages_fetched += 1;
        self.visited.insert(page_key(&url));
        self.visited.insert(landed);

        let (links, next) = parse_listing_page(&page.body, &page.final_url);
        let index = self.pages_fetched;

        tracing::debug!(
            url = %url,
            status = page.status_code,
            page = index,
            links = links.len(),
            "listing page"
        );

        if index > 1 && links.is_empty() {
            tracing::debug!(url = %url, "empty listing page, stopping");
        } else if let Some(next) = next {
            if self.visited.contains(&page_key(&next)) {
                tracing::debug!(url = %url, next = %next, "next page already visited, stopping");
            } else {
                self.next = Some(next);
            }
        }

        Ok(Some(ListingPage { index, url, links }))
    }
}

/// Key under which a listing page counts as visited
fn page_key(url: &Url) -> String {
    normalize_url(url.as_str())
        .map(String::from)
        .unwrap_or_else(|_| url.to_string())
}

/// Collects the product links of every page of a listing
///
/// Links that appear on more than one page are returned once per
/// appearance.
pub async fn enumerate_links(
    fetcher: &Fetcher,
    listing_url: &Url,
    max_pages: u32,
) -> Result<Vec<ProductLink>, HarvestError> {
    let mut pager = ListingPager::new(fetcher, listing_url.clone(), max_pages);
    let mut links = Vec::new();

    while let Some(page) = pager.next_page().await? {
        links.extend(page.links);
    }

    tracing::info!(
        url = %listing_url,
        pages = pager.pages_fetched(),
        links = links.len(),
        "listing enumerated"
    );
    Ok(links)
}
