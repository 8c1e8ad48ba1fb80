//! HTML parser for category, listing and product pages
//!
//! Every function here is pure: it takes raw HTML and the URL the HTML was
//! served from and returns what it found. Fetching and error policy live in
//! the stage modules that call these.

use crate::crawler::model::{
    CategoryRef, PriceTier, ProductLink, ProductRecord, Supplier, SupplierOffer,
};
use crate::url::{normalize_url, product_id, resolve_href};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Builds a selector from a string literal known to be valid
fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e:?}"))
}

/// Collapsed, trimmed text content of an element
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn first_text(scope: ElementRef<'_>, css: &str) -> Option<String> {
    scope
        .select(&selector(css))
        .next()
        .map(element_text)
        .and_then(non_empty)
}

fn attr(element: ElementRef<'_>, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ===== Category pages =====

/// Extracts subcategory links (`a.rblb-link`) from a category page
///
/// Anchors without an href or visible text are ignored. The result is
/// deduplicated by resolved URL, keeping the first occurrence in page order.
pub fn parse_subcategories(html: &str, base_url: &Url) -> Vec<CategoryRef> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut categories = Vec::new();

    for element in document.select(&selector("a.rblb-link")) {
        let name = element_text(element);
        if name.is_empty() {
            continue;
        }

        let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_href(href, base_url))
        else {
            continue;
        };

        if seen.insert(url.to_string()) {
            categories.push(CategoryRef {
                name,
                url: url.to_string(),
            });
        }
    }

    categories
}

// ===== Listing pages =====

/// Extracts product links from one listing page, in page order
///
/// Duplicates are kept; deduplication is the orchestrator's job.
pub fn parse_product_links(html: &str, base_url: &Url) -> Vec<ProductLink> {
    let document = Html::parse_document(html);
    product_links_in(&document, base_url)
}

fn product_links_in(document: &Html, base_url: &Url) -> Vec<ProductLink> {
    document
        .select(&selector(".product-listing__product-title a"))
        .filter_map(|element| {
            let url = element
                .value()
                .attr("href")
                .and_then(|href| resolve_href(href, base_url))?;
            Some(ProductLink {
                title: element_text(element),
                url: url.to_string(),
            })
        })
        .collect()
}

/// Finds the `a[rel="next"]` pagination control, resolved against the page URL
pub fn find_next_page(html: &str, base_url: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    next_page_in(&document, base_url)
}

fn next_page_in(document: &Html, base_url: &Url) -> Option<Url> {
    document
        .select(&selector(r#"a[rel="next"]"#))
        .find_map(|element| {
            element
                .value()
                .attr("href")
                .and_then(|href| resolve_href(href, base_url))
        })
}

/// Product links and next-page control of a listing page, parsed once
pub fn parse_listing_page(html: &str, base_url: &Url) -> (Vec<ProductLink>, Option<Url>) {
    let document = Html::parse_document(html);
    (
        product_links_in(&document, base_url),
        next_page_in(&document, base_url),
    )
}

// ===== Product pages =====

/// Fields extracted from a product page, each independently optional
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialRecord {
    pub title: Option<String>,
    pub price: Option<f64>,
    pub attributes: BTreeMap<String, String>,
    pub description: Option<String>,
    pub article: Option<String>,
    pub brand: Option<String>,
    pub country_of_origin: Option<String>,
    pub warranty: Option<String>,
    pub category: Option<String>,
    pub posted_at: Option<String>,
    pub suppliers: Vec<Supplier>,
}

impl PartialRecord {
    /// Turns the extracted fields into a record for `url`
    ///
    /// Only the title is mandatory; everything else degrades to absent or
    /// empty.
    ///
    /// # Returns
    ///
    /// * `Ok(ProductRecord)` - Record with id derived from `url`
    /// * `Err(HarvestError::Parse)` - The page had no title
    pub fn into_record(
        self,
        url: &Url,
        fetched_at: DateTime<Utc>,
    ) -> Result<ProductRecord, HarvestError> {
        let title = self.title.ok_or_else(|| HarvestError::Parse {
            url: url.to_string(),
            message: "product title (h1) is missing".to_string(),
        })?;

        let canonical = normalize_url(url.as_str())
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string());

        Ok(ProductRecord {
            id: product_id(url),
            title,
            price: self.price,
            attributes: self.attributes,
            url: canonical,
            fetched_at,
            description: self.description,
            article: self.article,
            brand: self.brand,
            country_of_origin: self.country_of_origin,
            warranty: self.warranty,
            category: self.category,
            posted_at: self.posted_at,
            suppliers: self.suppliers,
        })
    }
}

/// Extracts every known field from a product page
///
/// # Example
///
/// ```
/// use pulscen_harvest::crawler::extract_fields;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/products/brick_1").unwrap();
/// let html = r#"<h1>Кирпич</h1><span itemprop="price" content="12.50"></span>"#;
/// let fields = extract_fields(html, &base);
/// assert_eq!(fields.title.as_deref(), Some("Кирпич"));
/// assert_eq!(fields.price, Some(12.5));
/// ```
pub fn extract_fields(html: &str, base_url: &Url) -> PartialRecord {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let attributes = extract_attributes(&document);
    let suppliers = extract_suppliers(&document, base_url);

    let article = first_text(root, ".product-description-list__article-value")
        .or_else(|| attribute_containing(&attributes, &["Артикул"]));
    let brand = attribute_containing(&attributes, &["Производитель", "Бренд"]);
    let country_of_origin = attribute_containing(&attributes, &["Страна происхождения"]);
    let warranty = attribute_containing(&attributes, &["Гарантийный срок"]);

    let price = extract_price(&document).or_else(|| {
        suppliers
            .iter()
            .flat_map(|s| s.offers.iter())
            .flat_map(|o| o.prices.iter())
            .map(|tier| tier.price)
            .next()
    });

    PartialRecord {
        title: first_text(root, "h1"),
        price,
        description: extract_description(&document),
        article,
        brand,
        country_of_origin,
        warranty,
        category: extract_category(&document),
        posted_at: extract_posted_at(&document),
        attributes,
        suppliers,
    }
}

/// Attribute table of a product page
///
/// Reads the modern `.product-description-list__item` blocks first and the
/// legacy `table tr` rows second. The first value seen for a name wins.
fn extract_attributes(document: &Html) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();

    let label_sel = selector(".product-description-list__label");
    let value_sel = selector(".product-description-list__value");
    for item in document.select(&selector(".product-description-list__item")) {
        let name = item.select(&label_sel).next().map(element_text);
        let value = item.select(&value_sel).next().map(element_text);
        if let (Some(name), Some(value)) = (name, value) {
            let name = name.trim_end_matches(':').trim().to_string();
            if !name.is_empty() && !value.is_empty() {
                attributes.entry(name).or_insert(value);
            }
        }
    }

    let cell_sel = selector("td");
    for row in document.select(&selector("table tr")) {
        let cells: Vec<String> = row.select(&cell_sel).map(element_text).collect();
        if cells.len() >= 2 {
            let name = cells[0].trim_end_matches(':').trim().to_string();
            if !name.is_empty() {
                attributes.entry(name).or_insert_with(|| cells[1].clone());
            }
        }
    }

    attributes
}

/// First attribute whose name contains one of `needles`, in needle order
fn attribute_containing(attributes: &BTreeMap<String, String>, needles: &[&str]) -> Option<String> {
    needles.iter().find_map(|needle| {
        attributes
            .iter()
            .find(|(name, value)| name.contains(needle) && !value.is_empty())
            .map(|(_, value)| value.clone())
    })
}

fn extract_price(document: &Html) -> Option<f64> {
    if let Some(element) = document.select(&selector("[itemprop=price]")).next() {
        let from_content = attr(element, "content").and_then(|c| parse_price(&c));
        if from_content.is_some() {
            return from_content;
        }
        let from_text = parse_price(&element_text(element));
        if from_text.is_some() {
            return from_text;
        }
    }

    document
        .select(&selector(".product-price__value"))
        .next()
        .and_then(|element| parse_price(&element_text(element)))
}

/// Parses a price as printed on the site
///
/// Accepts space / NBSP thousands separators, a comma or dot decimal
/// separator and trailing currency text ("1 250,50 руб."). A range such as
/// "100 - 200" yields its lower bound. Returns None for anything without
/// digits or with a non-positive value.
pub fn parse_price(text: &str) -> Option<f64> {
    let text = text.trim();
    let first = match text.find(|c: char| c == '-' || c == '–' || c == '—') {
        Some(idx) if idx > 0 => &text[..idx],
        _ => text,
    };

    let mut cleaned = String::new();
    for c in first.chars() {
        match c {
            '0'..='9' => cleaned.push(c),
            ',' | '.' => cleaned.push('.'),
            ' ' | '\u{a0}' | '\u{202f}' | '\u{2009}' => {}
            _ if cleaned.is_empty() => {}
            _ => break,
        }
    }

    let cleaned = cleaned.trim_end_matches('.');
    // More than one separator: all but the last were thousands separators
    let normalized = match cleaned.rfind('.') {
        Some(last) if cleaned[..last].contains('.') => {
            let (int_part, frac) = cleaned.split_at(last);
            format!("{}{}", int_part.replace('.', ""), frac)
        }
        _ => cleaned.to_string(),
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
}

fn extract_description(document: &Html) -> Option<String> {
    document
        .select(&selector(".product-description"))
        .next()
        .map(|element| {
            element
                .text()
                .flat_map(str::lines)
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .and_then(non_empty)
}

/// Last breadcrumb, which names the product's own category
fn extract_category(document: &Html) -> Option<String> {
    let items: Vec<ElementRef<'_>> = document
        .select(&selector(".aui-breadcrumbs__item.js-breadcrumb"))
        .collect();

    if let Some(last) = items.last() {
        let name = last
            .select(&selector("[itemprop=name]"))
            .next()
            .unwrap_or(*last);
        return non_empty(element_text(name));
    }

    document
        .select(&selector(".breadcrumbs li:last-child"))
        .last()
        .map(element_text)
        .and_then(non_empty)
}

/// Date the offer was posted: the last two words of the "размещено" line
fn extract_posted_at(document: &Html) -> Option<String> {
    let line = document
        .root_element()
        .text()
        .map(str::trim)
        .find(|text| text.to_lowercase().contains("размещено"))?;

    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }
    Some(words[words.len() - 2..].join(" "))
}

fn extract_suppliers(document: &Html, base_url: &Url) -> Vec<Supplier> {
    let offer_sel = selector(".supplier__offer");
    let price_row_sel = selector(".price-row");

    document
        .select(&selector(".supplier"))
        .map(|block| {
            let offers = block
                .select(&offer_sel)
                .map(|offer| SupplierOffer {
                    prices: offer
                        .select(&price_row_sel)
                        .filter_map(parse_price_tier)
                        .collect(),
                    stock: attr(offer, "data-stock"),
                    delivery_time: attr(offer, "data-delivery"),
                    package_info: attr(offer, "data-package"),
                    purchase_url: attr(offer, "data-purchase-url")
                        .and_then(|href| resolve_href(&href, base_url))
                        .map(|u| u.to_string()),
                })
                .collect();

            Supplier {
                dealer_id: attr(block, "data-dealer-id"),
                name: first_text(block, ".supplier__name"),
                phone: first_text(block, ".supplier__phone"),
                address: first_text(block, ".supplier__address"),
                description: first_text(block, ".supplier__description"),
                offers,
            }
        })
        .collect()
}

/// One `.price-row`; rows without a parsable price are dropped
fn parse_price_tier(row: ElementRef<'_>) -> Option<PriceTier> {
    let price = attr(row, "data-price").and_then(|p| parse_price(&p))?;
    let quantity = attr(row, "data-quantity")
        .and_then(|q| q.parse::<u32>().ok())
        .unwrap_or(1);
    let discount = attr(row, "data-discount").and_then(|d| d.replace(',', ".").parse().ok());

    Some(PriceTier {
        quantity,
        discount,
        price,
    })
}
