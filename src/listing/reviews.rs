use serde_json::{json, Value};
use storefront_core::{Listing, Review};
use tracing::info;

use crate::error::{Error, Result};
use crate::ids;
use crate::listing::{all_exist, collapse_one, fetch_page, require_id, require_text, without_version};
use crate::params::{ListParams, PageLimit};
use crate::pipeline::builder::text_search;
use crate::pipeline::{ListQuery, Lookup, Pipeline, Stage};
use crate::store::{collections, ensure_ready, find_by_id, DocumentStore};

const SEARCH_FIELDS: &[&str] = &[
    "reviewer_name",
    "review_description",
    "product.name",
    "product.brand",
    "product.tags",
];

fn product_join() -> Lookup {
    Lookup {
        from: collections::PRODUCTS.to_string(),
        local_field: "product_id".to_string(),
        foreign_field: "_id".to_string(),
        as_field: "product".to_string(),
        pipeline: vec![without_version()],
    }
}

fn reshape(doc: &mut Value) {
    collapse_one(doc, "product");
}

/// List reviews, newest first, optionally for one product.
///
/// A search term that is an object id matches the review or product id;
/// anything else is matched against the review text and the joined product.
pub async fn list(store: &dyn DocumentStore, params: &ListParams, product: Option<&str>) -> Result<Listing<Value>> {
    let base = match product {
        Some(id) => Pipeline::matching(json!({ "product_id": require_id(id, "product")? })),
        None => Pipeline::new(),
    };

    let mut query = ListQuery::new(base, params, PageLimit::Twenty).populate(product_join());
    if let Some(search) = &params.search {
        let search = search.trim();
        query = if ids::is_valid(search) {
            query.matching(json!({ "$or": [{ "_id": search }, { "product_id": search }] }))
        } else {
            query.matching(text_search(SEARCH_FIELDS, search))
        };
    }
    let (count, paged) = query.filter().split_count();
    let page = paged.sort("-review_date").paginate();

    fetch_page(store, collections::REVIEWS, "reviews", count, page, reshape).await
}

/// One review, which must belong to `product_id`.
pub async fn get(store: &dyn DocumentStore, product_id: &str, review_id: &str) -> Result<Value> {
    let product_id = require_id(product_id, "product")?;
    let review_id = require_id(review_id, "review")?;
    let pipeline = Pipeline::new()
        .then(Stage::Match(json!({ "product_id": product_id })))
        .then(without_version())
        .then(Stage::Lookup(product_join()));
    let mut doc = find_by_id(store, collections::REVIEWS, review_id, pipeline)
        .await?
        .ok_or_else(|| Error::NotFound(format!("review {review_id} of product {product_id}")))?;
    reshape(&mut doc);
    Ok(doc)
}

/// Store a review of an existing product.
pub async fn create(store: &dyn DocumentStore, product_id: &str, mut review: Review) -> Result<Value> {
    let product_id = require_id(product_id, "product")?;
    ensure_ready(store)?;
    if !all_exist(store, collections::PRODUCTS, &[product_id.to_string()]).await? {
        return Err(Error::NotFound(format!("product {product_id}")));
    }
    if !(1..=5).contains(&review.rating) {
        return Err(Error::BadRequest("rating must be between 1 and 5".into()));
    }
    review.id = None;
    review.product_id = product_id.to_string();
    review.reviewer_name = require_text(&review.reviewer_name, "reviewer_name")?;
    review.review_title = require_text(&review.review_title, "review_title")?;
    review.review_description = require_text(&review.review_description, "review_description")?;
    if review.reviewer.as_deref().is_some_and(|id| !ids::is_valid(id)) {
        return Err(Error::BadRequest("reviewer must be a customer id".into()));
    }

    let doc = store
        .insert(collections::REVIEWS, serde_json::to_value(&review)?)
        .await?;
    info!("Created review {} for product {}", doc["_id"], product_id);
    Ok(doc)
}
