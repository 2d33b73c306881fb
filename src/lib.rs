//! Storefront backend.
//!
//! Catalogue, review, customer and order-history list endpoints built on a
//! small aggregation pipeline builder, plus checkout payment intents.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use storefront::{api, listing, MemoryStore, ListParams};
//!
//! let store = MemoryStore::load("./seed".into()).await?;
//! let params = ListParams::from_query(Some("search=nintendo&limit=5"));
//! let listing = listing::products::list(&store, &params, None).await?;
//! println!("{} of {}", listing.list_count, listing.records_count);
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod ids;
pub mod listing;
pub mod params;
pub mod payment;
pub mod pipeline;
pub mod store;

pub use error::{Error, Result};
pub use params::{ListParams, PageInfo, PageLimit};
pub use payment::{PaymentGateway, SandboxGateway};
pub use pipeline::{Pipeline, Stage};
pub use store::{DocumentStore, MemoryStore, MongoStore};
