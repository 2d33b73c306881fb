//! Core wire types for the storefront API.
//!
//! This crate provides the shared data types used by both the storefront
//! server and clients that talk to its HTTP API.
//!
//! # Overview
//!
//! The main types are:
//!
//! - [`Listing`] - The result envelope returned by every list endpoint
//! - [`Product`], [`Category`], [`Review`], [`OrderHistory`] - Resource bodies
//! - [`PaymentIntentRequest`], [`PaymentIntentCreated`], [`PaymentIntentUpdated`] - Checkout payloads
//!
//! # Example
//!
//! Fetching a page of products from a storefront server:
//!
//! ```ignore
//! use storefront_core::Listing;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = reqwest::Client::new();
//!
//! let listing: Listing<serde_json::Value> = client
//!     .get("http://localhost:3000/api/products?search=nintendo&limit=5")
//!     .send()
//!     .await?
//!     .json()
//!     .await?;
//!
//! println!("{} of {} products", listing.list_count, listing.records_count);
//! for product in listing.items() {
//!     println!("{}", product["name"]);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Number of pages needed to show `records_count` items, never less than one.
///
/// ```
/// use storefront_core::total_pages;
///
/// assert_eq!(total_pages(0, 20), 1);
/// assert_eq!(total_pages(41, 20), 3);
/// ```
pub fn total_pages(records_count: u64, page_limit: u64) -> u64 {
    if records_count == 0 || page_limit == 0 {
        1
    } else {
        records_count.div_ceil(page_limit)
    }
}

/// The result envelope returned by every list endpoint.
///
/// The item array is keyed by the resource's plural name, so a product
/// listing serialises as
/// `{"records_count":2,"total_pages":1,"list_count":2,"products":[...]}`.
///
/// # Example
///
/// ```
/// use storefront_core::Listing;
///
/// let listing = Listing::new("categories", vec!["a", "b", "c"], 25, 10);
///
/// assert_eq!(listing.records_count, 25);
/// assert_eq!(listing.total_pages, 3);
/// assert_eq!(listing.list_count, 3);
/// assert_eq!(listing.items(), &["a", "b", "c"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing<T> {
    /// Number of records matching the filters, across all pages.
    pub records_count: u64,
    /// Total number of pages at the resolved page size. At least one.
    pub total_pages: u64,
    /// Number of records in this page.
    pub list_count: u64,
    /// The page itself, under the resource's plural name.
    #[serde(flatten)]
    pub items: BTreeMap<String, Vec<T>>,
}

impl<T> Listing<T> {
    /// Creates a new envelope.
    ///
    /// Calculates `total_pages` from `records_count` and `page_limit`, and
    /// `list_count` from the number of items.
    pub fn new(resource: impl Into<String>, items: Vec<T>, records_count: u64, page_limit: u64) -> Self {
        let list_count = items.len() as u64;
        let mut map = BTreeMap::new();
        map.insert(resource.into(), items);
        Self {
            records_count,
            total_pages: total_pages(records_count, page_limit),
            list_count,
            items: map,
        }
    }

    /// The items of this page, whatever the resource key is.
    pub fn items(&self) -> &[T] {
        self.items.values().next().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A titled selling point shown on a product page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Highlight {
    pub heading: String,
    pub overview: String,
}

/// A catalogue product.
///
/// Returned (with extra computed fields such as `review_info` and
/// `discount`) from `/api/products` and `/api/product/{id}`, and accepted
/// as the body of `POST /api/products`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Object identifier. Assigned by the store when absent.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub brand: String,
    /// Selling price in dollars.
    pub price: f64,
    /// List price in dollars, used to compute discounts.
    pub retail_price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
    /// Units in stock. Defaults to 20.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Identifiers of the categories this product belongs to.
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub total_bought: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_src: String,
}

fn default_quantity() -> u32 {
    20
}

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub alias: String,
}

/// A customer's review of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Star rating, 1 to 5.
    pub rating: u8,
    /// Identifier of the reviewing customer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    pub reviewer_name: String,
    pub review_title: String,
    pub review_description: String,
    #[serde(default = "Timestamp::now")]
    pub review_date: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_edit_date: Option<Timestamp>,
    /// Identifier of the reviewed product. Taken from the route when posting.
    #[serde(default)]
    pub product_id: String,
}

/// Shipping option chosen for an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingInfo {
    /// Shipping code: 1 free, 2 ground, 3 next day.
    pub code: u8,
    /// Shipping cost in dollars.
    pub cost: f64,
}

/// A category reference copied into a cart line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartCategory {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// A product line in a cart, as it was when the order was placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    /// Identifier of the ordered product.
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub brand: String,
    pub price: f64,
    pub retail_price: f64,
    pub quantity: u32,
    pub cart_quantity: u32,
    #[serde(default)]
    pub category: Vec<CartCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
}

/// A placed order.
///
/// Listed from `/api/orderhistory` with every cart line enriched by the
/// live product record under `product`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHistory {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub customer_id: String,
    pub order_date: Timestamp,
    pub shipping: ShippingInfo,
    pub cart_total: f64,
    pub cart: Vec<CartItem>,
}

/// A cart line as sent by the checkout page. Other fields are ignored;
/// prices always come from the live product records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(rename = "_id")]
    pub id: String,
    pub cart_quantity: u32,
}

/// Body of `POST /api/payment/intent` and `PUT /api/payment/intent/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentIntentRequest {
    #[serde(default)]
    pub cart: Option<Vec<CartLine>>,
    #[serde(rename = "shippingCode", default)]
    pub shipping_code: Option<u8>,
}

/// Response of `POST /api/payment/intent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentCreated {
    #[serde(rename = "paymentIntentId")]
    pub payment_intent_id: String,
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
    /// Charged amount in dollars.
    #[serde(rename = "payAmount")]
    pub pay_amount: f64,
}

/// Dollar breakdown of a re-priced payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountBreakdown {
    pub total: f64,
    pub shipping: f64,
    #[serde(rename = "cartTotal")]
    pub cart_total: f64,
}

/// Response of `PUT /api/payment/intent/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentUpdated {
    pub amount: AmountBreakdown,
}
