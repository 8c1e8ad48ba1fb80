//! Integration tests for the collection pipeline
//!
//! These tests use wiremock to serve a small catalogue (category page,
//! paginated listings, product pages) and run full collections against it.

use pulscen_harvest::config::{Config, FetcherConfig};
use pulscen_harvest::crawler::{run_collection, Coordinator, Fetcher};
use pulscen_harvest::output::{JsonlWriter, Sink};
use pulscen_harvest::storage::{DocumentStore, RunStatus, SqliteStore};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing into `dir`
fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.fetcher = FetcherConfig {
        max_attempts: 2,
        retry_base_delay_ms: 5,
        ..FetcherConfig::default()
    };
    config.crawl.link_concurrency = 2;
    config.crawl.product_concurrency = 4;
    config.output.database_path = dir.path().join("pulscen.db").display().to_string();
    config.output.jsonl_path = dir.path().join("products.jsonl").display().to_string();
    config
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

fn category_page(subcategories: &[(&str, &str)]) -> String {
    subcategories
        .iter()
        .map(|(href, name)| format!(r#"<a class="rblb-link" href="{}">{}</a>"#, href, name))
        .collect()
}

fn listing_page(links: &[&str], next: Option<&str>) -> String {
    let mut body: String = links
        .iter()
        .map(|href| {
            format!(
                r#"<div class="product-listing__product-title"><a href="{0}">{0}</a></div>"#,
                href
            )
        })
        .collect();
    if let Some(next) = next {
        body.push_str(&format!(r#"<a rel="next" href="{}">Следующая</a>"#, next));
    }
    body
}

fn product_page(title: &str, price: Option<&str>) -> String {
    let price = price
        .map(|p| format!(r#"<span itemprop="price" content="{}"></span>"#, p))
        .unwrap_or_default();
    format!(
        r#"<html><body><h1>{}</h1>{}
           <div class="product-description-list__item">
             <span class="product-description-list__label">Производитель:</span>
             <span class="product-description-list__value">Завод</span>
           </div></body></html>"#,
        title, price
    )
}

async fn mount(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Mounts a category with subcategory A (two pages, 3 + 2 links) and
/// subcategory B (one page, 1 link)
async fn mount_two_subcategories(server: &MockServer) {
    mount(
        server,
        "/price/11",
        category_page(&[("/price/1101-a", "A"), ("/price/1102-b", "B")]),
    )
    .await;
    mount(
        server,
        "/price/1101-a",
        listing_page(&["/p/a1", "/p/a2", "/p/a3"], Some("/price/1101-a/page-2")),
    )
    .await;
    mount(
        server,
        "/price/1101-a/page-2",
        listing_page(&["/p/a4", "/p/a5"], None),
    )
    .await;
    mount(server, "/price/1102-b", listing_page(&["/p/b1"], None)).await;

    for id in ["a1", "a2", "a3", "a4", "a5", "b1"] {
        mount(
            server,
            &format!("/p/{}", id),
            product_page(&format!("Товар {}", id), Some("100.00")),
        )
        .await;
    }
}

#[tokio::test]
async fn test_two_subcategories_yield_all_records() {
    let server = MockServer::start().await;
    mount_two_subcategories(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);
    let category = Url::parse(&format!("{}/price/11", server.uri())).unwrap();

    let summary = run_collection(config.clone(), &[category], false)
        .await
        .unwrap();

    assert_eq!(summary.status, "completed");
    assert_eq!(summary.subcategories, 2);
    assert_eq!(summary.links_seen, 6);
    assert_eq!(summary.succeeded, 6);
    assert_eq!(summary.skipped, 0);

    let store = SqliteStore::new(Path::new(&config.output.database_path)).unwrap();
    assert_eq!(store.count_products("products").unwrap(), 6);

    let mut titles: Vec<String> = store
        .list_products("products")
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect();
    titles.sort();
    assert_eq!(titles[0], "Товар a1");
    assert_eq!(titles[5], "Товар b1");

    let jsonl = std::fs::read_to_string(&config.output.jsonl_path).unwrap();
    assert_eq!(jsonl.lines().count(), 6);
}

#[tokio::test]
async fn test_failed_link_is_skipped() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/price/11",
        category_page(&[("/price/1101", "Кирпич")]),
    )
    .await;
    mount(
        &server,
        "/price/1101",
        listing_page(&["/p/1", "/p/2", "/p/3", "/p/4", "/p/5"], None),
    )
    .await;
    for id in ["1", "2", "4", "5"] {
        mount(
            &server,
            &format!("/p/{}", id),
            product_page(&format!("Кирпич {}", id), None),
        )
        .await;
    }
    Mock::given(method("GET"))
        .and(path("/p/3"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);
    let category = Url::parse(&format!("{}/price/11", server.uri())).unwrap();

    let summary = run_collection(config.clone(), &[category], false)
        .await
        .unwrap();

    assert_ne!(summary.status, "failed");
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.skipped, 1);

    let store = SqliteStore::new(Path::new(&config.output.database_path)).unwrap();
    assert_eq!(store.count_products("products").unwrap(), 4);
    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.skipped, 1);
}

#[tokio::test]
async fn test_second_run_updates_instead_of_duplicating() {
    let server = MockServer::start().await;
    mount_two_subcategories(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);
    let category = Url::parse(&format!("{}/price/11", server.uri())).unwrap();

    let first = run_collection(config.clone(), &[category.clone()], false)
        .await
        .unwrap();
    assert_eq!(first.inserted, 6);

    let second = run_collection(config.clone(), &[category], false)
        .await
        .unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 6);

    let store = SqliteStore::new(Path::new(&config.output.database_path)).unwrap();
    let products = store.list_products("products").unwrap();
    assert_eq!(products.len(), 6);

    let mut ids: Vec<&str> = products.iter().map(|p| p.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 6);

    // Truncated at the start of the second run
    let jsonl = std::fs::read_to_string(&config.output.jsonl_path).unwrap();
    assert_eq!(jsonl.lines().count(), 6);
}

#[tokio::test]
async fn test_append_keeps_previous_lines() {
    let server = MockServer::start().await;
    mount_two_subcategories(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);
    let category = Url::parse(&format!("{}/price/11", server.uri())).unwrap();

    run_collection(config.clone(), &[category.clone()], false)
        .await
        .unwrap();
    run_collection(config.clone(), &[category], true)
        .await
        .unwrap();

    let jsonl = std::fs::read_to_string(&config.output.jsonl_path).unwrap();
    assert_eq!(jsonl.lines().count(), 12);
}

#[tokio::test]
async fn test_missing_price_keeps_record() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/price/11",
        category_page(&[("/price/1101", "Кирпич")]),
    )
    .await;
    mount(&server, "/price/1101", listing_page(&["/p/1"], None)).await;
    mount(&server, "/p/1", product_page("Кирпич без цены", None)).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);
    let store_path = config.output.database_path.clone();
    let category = Url::parse(&format!("{}/price/11", server.uri())).unwrap();

    run_collection(config, &[category], false).await.unwrap();

    let store = SqliteStore::new(Path::new(&store_path)).unwrap();
    let products = store.list_products("products").unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].title, "Кирпич без цены");
    assert_eq!(products[0].price, None);
    assert_eq!(products[0].brand.as_deref(), Some("Завод"));
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/price/11",
        category_page(&[("/price/1101", "Кирпич")]),
    )
    .await;
    mount(&server, "/price/1101", listing_page(&["/p/1"], None)).await;
    Mock::given(method("GET"))
        .and(path("/p/1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount(&server, "/p/1", product_page("Кирпич", Some("12,50"))).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);
    let category = Url::parse(&format!("{}/price/11", server.uri())).unwrap();

    let summary = run_collection(config, &[category], false).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 0);
}

#[tokio::test]
async fn test_one_failed_category_does_not_fail_run() {
    let server = MockServer::start().await;
    mount_two_subcategories(&server).await;
    Mock::given(method("GET"))
        .and(path("/price/99"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);
    let good = Url::parse(&format!("{}/price/11", server.uri())).unwrap();
    let bad = Url::parse(&format!("{}/price/99", server.uri())).unwrap();

    let summary = run_collection(config, &[bad, good], false).await.unwrap();
    assert_eq!(summary.status, "completed");
    assert_eq!(summary.categories, 2);
    assert_eq!(summary.categories_failed, 1);
    assert_eq!(summary.succeeded, 6);
}

#[tokio::test]
async fn test_coordinator_with_custom_collection() {
    let server = MockServer::start().await;
    mount_two_subcategories(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);
    let writer = JsonlWriter::create(&dir.path().join("archive.jsonl"), false).unwrap();
    let sink = Arc::new(Sink::new(
        Box::new(SqliteStore::new_in_memory().unwrap()),
        writer,
        "archive",
    ));
    let fetcher = Fetcher::new(&config.fetcher).unwrap();
    let coordinator = Coordinator::new(config, sink.clone(), fetcher);

    let category = Url::parse(&format!("{}/price/11", server.uri())).unwrap();
    let summary = coordinator.run(&[category]).await.unwrap();

    assert_eq!(summary.succeeded, 6);
    assert_eq!(sink.collection(), "archive");
    assert_eq!(sink.stored_count().unwrap(), 6);
}
