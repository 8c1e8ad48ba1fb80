//! Value types passed between the collection stages
//!
//! Every stage hands its output to the next one by value; nothing here is
//! mutated after construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A subcategory found on a category page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub name: String,
    pub url: String,
}

/// A product link found on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLink {
    pub title: String,
    pub url: String,
}

/// One price break of a supplier offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTier {
    /// Minimum quantity the price applies to
    pub quantity: u32,
    pub discount: Option<f64>,
    pub price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierOffer {
    pub prices: Vec<PriceTier>,
    pub stock: Option<String>,
    pub delivery_time: Option<String>,
    pub package_info: Option<String>,
    pub purchase_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub dealer_id: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub offers: Vec<SupplierOffer>,
}

/// The persisted representation of one product page
///
/// `id` is derived from the normalized product URL (see
/// [`crate::url::product_id`]) and is the upsert key in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub title: String,
    pub price: Option<f64>,
    pub attributes: BTreeMap<String, String>,
    pub url: String,
    pub fetched_at: DateTime<Utc>,

    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub article: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub country_of_origin: Option<String>,
    #[serde(default)]
    pub warranty: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub posted_at: Option<String>,
    #[serde(default)]
    pub suppliers: Vec<Supplier>,
}

impl ProductRecord {
    /// Builds a record with only the mandatory fields set
    pub fn new(id: String, title: String, url: String, fetched_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            price: None,
            attributes: BTreeMap::new(),
            url,
            fetched_at,
            description: None,
            article: None,
            brand: None,
            country_of_origin: None,
            warranty: None,
            category: None,
            posted_at: None,
            suppliers: Vec::new(),
        }
    }
}
