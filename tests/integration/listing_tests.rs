//! Integration tests for listing pagination
//!
//! These tests check that a paginated listing is walked page by page, each
//! page exactly once, and that the page cap is enforced.

use pulscen_harvest::config::FetcherConfig;
use pulscen_harvest::crawler::{enumerate_links, Fetcher, ListingPager};
use pulscen_harvest::HarvestError;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> Fetcher {
    Fetcher::new(&FetcherConfig {
        max_attempts: 1,
        retry_base_delay_ms: 1,
        ..FetcherConfig::default()
    })
    .unwrap()
}

/// Mounts a listing of `pages` pages at `/price/77`, `/price/77/page-2`, ...
///
/// Page `n` links to `/p/n-a` and `/p/n-b`, plus `/p/shared` on every page.
async fn mount_listing(server: &MockServer, pages: u32, expected_hits: u64) {
    for n in 1..=pages {
        let route = page_path(n);
        let mut body = format!(
            r#"<div class="product-listing__product-title"><a href="/p/{0}-a">{0}a</a></div>
               <div class="product-listing__product-title"><a href="/p/{0}-b">{0}b</a></div>
               <div class="product-listing__product-title"><a href="/p/shared">shared</a></div>"#,
            n
        );
        if n < pages {
            body.push_str(&format!(r#"<a rel="next" href="{}">→</a>"#, page_path(n + 1)));
        }
        Mock::given(method("GET"))
            .and(path(route.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(expected_hits)
            .mount(server)
            .await;
    }
}

fn page_path(n: u32) -> String {
    if n == 1 {
        "/price/77".to_string()
    } else {
        format!("/price/77/page-{}", n)
    }
}

#[tokio::test]
async fn test_every_page_visited_exactly_once() {
    let server = MockServer::start().await;
    mount_listing(&server, 4, 1).await;

    let url = Url::parse(&format!("{}/price/77", server.uri())).unwrap();
    let links = enumerate_links(&fetcher(), &url, 10).await.unwrap();

    // Two own links per page plus the shared one, duplicates kept
    assert_eq!(links.len(), 12);
    let shared = links.iter().filter(|l| l.url.ends_with("/p/shared")).count();
    assert_eq!(shared, 4);
    assert!(links.iter().any(|l| l.url.ends_with("/p/4-b")));

    server.verify().await;
}

#[tokio::test]
async fn test_page_cap_is_an_error() {
    let server = MockServer::start().await;
    for n in 1..=2 {
        Mock::given(method("GET"))
            .and(path(page_path(n).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<div class="product-listing__product-title"><a href="/p/{0}">{0}</a></div>
                   <a rel="next" href="{1}">→</a>"#,
                n,
                page_path(n + 1)
            )))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(page_path(3).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>never</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/price/77", server.uri())).unwrap();
    let err = enumerate_links(&fetcher(), &url, 2).await.unwrap_err();

    assert!(matches!(
        err,
        HarvestError::PaginationLimitExceeded { limit: 2, .. }
    ));
    assert_eq!(err.kind(), "pagination_limit");
}

#[tokio::test]
async fn test_listing_exactly_at_cap_succeeds() {
    let server = MockServer::start().await;
    mount_listing(&server, 3, 1).await;

    let url = Url::parse(&format!("{}/price/77", server.uri())).unwrap();
    let links = enumerate_links(&fetcher(), &url, 3).await.unwrap();
    assert_eq!(links.len(), 9);
}

#[tokio::test]
async fn test_pager_can_be_driven_manually() {
    let server = MockServer::start().await;
    mount_listing(&server, 2, 1).await;

    let fetcher = fetcher();
    let url = Url::parse(&format!("{}/price/77", server.uri())).unwrap();
    let mut pager = ListingPager::new(&fetcher, url, 10);

    let mut indexes = Vec::new();
    while let Some(page) = pager.next_page().await.unwrap() {
        assert_eq!(page.links.len(), 3);
        indexes.push(page.index);
    }

    assert_eq!(indexes, vec![1, 2]);
    assert_eq!(pager.pages_fetched(), 2);
}

#[tokio::test]
async fn test_failed_page_fails_enumeration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/price/77"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="product-listing__product-title"><a href="/p/1">1</a></div>
               <a rel="next" href="/price/77/page-2">→</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/price/77/page-2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/price/77", server.uri())).unwrap();
    let err = enumerate_links(&fetcher(), &url, 10).await.unwrap_err();
    assert!(matches!(err, HarvestError::Fetch { status: Some(500), .. }));
}
