//! Category walker: lists the subcategories of a category page

use crate::crawler::fetcher::Fetcher;
use crate::crawler::model::CategoryRef;
use crate::crawler::parser::parse_subcategories;
use crate::HarvestError;
use url::Url;

/// Fetches a category page and returns its subcategories
///
/// Every call fetches the page again. Hrefs are resolved against the final
/// URL after redirects, and the result never contains the same URL twice.
///
/// # Returns
///
/// * `Ok(Vec<CategoryRef>)` - Subcategories in page order
/// * `Err(HarvestError::Fetch)` - The page could not be retrieved
/// * `Err(HarvestError::Parse)` - The page has no subcategory links
pub async fn walk_categories(
    fetcher: &Fetcher,
    category_url: &Url,
) -> Result<Vec<CategoryRef>, HarvestError> {
    let page = fetcher.fetch(category_url).await?;
    let subcategories = parse_subcategories(&page.body, &page.final_url);

    if subcategories.is_empty() {
        return Err(HarvestError::Parse {
            url: category_url.to_string(),
            message: "no subcategory links found".to_string(),
        });
    }

    tracing::info!(
        url = %category_url,
        count = subcategories.len(),
        "found subcategories"
    );
    Ok(subcategories)
}
