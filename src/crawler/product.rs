//! Product extractor: turns one product page into a `ProductRecord`

use crate::crawler::fetcher::Fetcher;
use crate::crawler::model::ProductRecord;
use crate::crawler::parser::extract_fields;
use crate::HarvestError;
use chrono::Utc;
use url::Url;

/// Fetches a product page and extracts its record
///
/// The record id and canonical URL come from `product_url` as requested,
/// not from where redirects ended up, so re-running a collection maps the
/// same link to the same document.
///
/// # Returns
///
/// * `Ok(ProductRecord)` - Extracted record
/// * `Err(HarvestError::Fetch)` - The page could not be retrieved
/// * `Err(HarvestError::Parse)` - The page has no product title
pub async fn extract_product(
    fetcher: &Fetcher,
    product_url: &Url,
) -> Result<ProductRecord, HarvestError> {
    let page = fetcher.fetch(product_url).await?;
    let record = extract_fields(&page.body, &page.final_url).into_record(product_url, Utc::now())?;

    tracing::debug!(
        url = %product_url,
        id = %record.id,
        attributes = record.attributes.len(),
        suppliers = record.suppliers.len(),
        "extracted product"
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetcherConfig;
    use crate::url::product_id;
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

    #[tokio::test]
    async fn test_extract_product() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/kirpich_1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<h1> Кирпич  красный </h1>
                   <span itemprop="price" content="18.90"></span>
                   <table><tr><td>Производитель:</td><td>ЛСР</td></tr></table>"#,
            ))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/products/kirpich_1?utm_source=x", server.uri())).unwrap();
        let record = extract_product(&fetcher(), &url).await.unwrap();

        assert_eq!(record.title, "Кирпич красный");
        assert_eq!(record.price, Some(18.9));
        assert_eq!(record.brand.as_deref(), Some("ЛСР"));
        assert_eq!(record.id, product_id(&url));
        assert!(!record.url.contains("utm_source"));
    }

    #[tokio::test]
    async fn test_missing_title_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<div>нет заголовка</div>"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/products/x", server.uri())).unwrap();
        let err = extract_product(&fetcher(), &url).await.unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[tokio::test]
    async fn test_not_found_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/products/gone", server.uri())).unwrap();
        let err = extract_product(&fetcher(), &url).await.unwrap_err();
        assert!(matches!(err, HarvestError::Fetch { status: Some(404), .. }));
    }
}
