//! Crawler module for catalogue page fetching and processing
//!
//! This module contains the core collection logic, including:
//! - HTTP fetching with retry logic and block-page detection
//! - HTML parsing of category, listing and product pages
//! - Category walking, listing pagination and product extraction
//! - Overall collection coordination

mod categories;
mod coordinator;
mod fetcher;
mod listing;
mod model;
mod parser;
mod product;

pub use categories::walk_categories;
pub use coordinator::{run_collection, Coordinator};
pub use fetcher::{build_http_client, FetchedPage, Fetcher};
pub use listing::{enumerate_links, ListingPage, ListingPager};
pub use model::{CategoryRef, PriceTier, ProductLink, ProductRecord, Supplier, SupplierOffer};
pub use parser::{
    extract_fields, find_next_page, parse_listing_page, parse_price, parse_product_links,
    parse_subcategories, PartialRecord,
};
pub use product::extract_product;
