use serde_json::{json, Value};
use storefront_core::{Listing, Product};
use tracing::info;

use crate::error::{Error, Result};
use crate::listing::{all_exist, collapse_one, fetch_page, require_id, require_text, without_version};
use crate::params::{ListParams, PageLimit};
use crate::pipeline::builder::{exact_ci, text_search};
use crate::pipeline::{ListQuery, Lookup, PagedQuery, Pipeline, SortKey, Stage};
use crate::store::{collections, ensure_ready, find_by_id, DocumentStore};

const SEARCH_FIELDS: &[&str] = &["name", "brand", "tags", "description"];

const MIN_PRICE: f64 = 0.01;
const MAX_PRICE: f64 = 100_000.0;
const MAX_QUANTITY: u32 = 250;

/// Fraction off the retail price, rounded to two decimals.
fn discount_expr() -> Value {
    json!({
        "$round": [
            { "$subtract": [1, { "$divide": ["$price", "$retail_price"] }] },
            2
        ]
    })
}

/// Average rating and review count, attached as `review_info`.
fn review_stats() -> Vec<Stage> {
    vec![Stage::Group(json!({
        "_id": "$product_id",
        "review_average": { "$avg": "$rating" },
        "review_count": { "$sum": 1 },
    }))]
}

fn with_review_stats(query: PagedQuery<'_>) -> PagedQuery<'_> {
    query.populate(collections::REVIEWS, "_id", "product_id", "review_info", review_stats())
}

fn reshape(doc: &mut Value) {
    collapse_one(doc, "review_info");
}

/// List products, optionally restricted to one category.
pub async fn list(store: &dyn DocumentStore, params: &ListParams, category: Option<&str>) -> Result<Listing<Value>> {
    let base = match category {
        Some(id) => Pipeline::matching(json!({ "category": id })),
        None => Pipeline::new(),
    };

    let mut query = ListQuery::new(base, params, PageLimit::Twenty);
    if let Some(brand) = &params.brand {
        query = query.matching(exact_ci("brand", brand));
    }
    if let Some(search) = &params.search {
        query = query.matching(text_search(SEARCH_FIELDS, search));
    }
    if params.deals {
        query = query.add_fields(vec![("discount".to_string(), discount_expr())]);
    }
    query = query.filter();
    if params.deals {
        query = query.within("discount", params.discount_range());
    }
    let (count, paged) = query.within("price", params.price_range()).split_count();

    // Rating sorts need the joined stats in place before sorting.
    let paged = match params.sort_by.as_deref() {
        Some("rating") => with_review_stats(paged).sort_keys(vec![
            SortKey::desc("review_info.review_average"),
            SortKey::desc("review_info.review_count"),
        ]),
        Some("reviews") => with_review_stats(paged).sort_keys(vec![
            SortKey::desc("review_info.review_count"),
            SortKey::desc("review_info.review_average"),
        ]),
        _ => with_review_stats(paged.sort("name")),
    };

    fetch_page(store, collections::PRODUCTS, "products", count, paged.paginate(), reshape).await
}

/// Products of the category `id`, which must exist.
pub async fn list_by_category(store: &dyn DocumentStore, params: &ListParams, id: &str) -> Result<Listing<Value>> {
    let id = require_id(id, "category")?;
    if !all_exist(store, collections::CATEGORIES, &[id.to_string()]).await? {
        return Err(Error::NotFound(format!("category {id}")));
    }
    list(store, params, Some(id)).await
}

/// One product with its review stats.
pub async fn get(store: &dyn DocumentStore, id: &str) -> Result<Value> {
    let id = require_id(id, "product")?;
    ensure_ready(store)?;
    let pipeline = Pipeline::new().then(without_version()).then(Stage::Lookup(Lookup {
        from: collections::REVIEWS.to_string(),
        local_field: "_id".to_string(),
        foreign_field: "product_id".to_string(),
        as_field: "review_info".to_string(),
        pipeline: review_stats(),
    }));
    let mut doc = find_by_id(store, collections::PRODUCTS, id, pipeline)
        .await?
        .ok_or_else(|| Error::NotFound(format!("product {id}")))?;
    reshape(&mut doc);
    Ok(doc)
}

fn check_price(value: f64, field: &str) -> Result<()> {
    if (MIN_PRICE..=MAX_PRICE).contains(&value) {
        Ok(())
    } else {
        Err(Error::BadRequest(format!(
            "{field} must be between {MIN_PRICE} and {MAX_PRICE}"
        )))
    }
}

/// Validate and store a new product.
pub async fn create(store: &dyn DocumentStore, mut product: Product) -> Result<Value> {
    ensure_ready(store)?;
    product.id = None;
    product.name = require_text(&product.name, "name")?;
    product.brand = require_text(&product.brand, "brand")?;
    check_price(product.price, "price")?;
    check_price(product.retail_price, "retail_price")?;
    if product.quantity > MAX_QUANTITY {
        return Err(Error::BadRequest(format!("quantity must be at most {MAX_QUANTITY}")));
    }
    product.tags.retain(|tag| !tag.trim().is_empty());
    if !all_exist(store, collections::CATEGORIES, &product.category).await? {
        return Err(Error::BadRequest("unknown category".into()));
    }

    let doc = store
        .insert(collections::PRODUCTS, serde_json::to_value(&product)?)
        .await?;
    info!("Created product {} ({})", product.name, doc["_id"]);
    Ok(doc)
}
