//! Resource list handlers.
//!
//! Each resource module assembles its match stages through a
//! [`ListQuery`](crate::pipeline::ListQuery), splits off the count, adds
//! sort, joins and the page window, and hands both pipelines to
//! [`fetch_page`], which runs them and wraps the result in a [`Listing`].

use serde_json::{json, Value};
use storefront_core::Listing;
use tracing::debug;

use crate::error::{Error, Result};
use crate::ids;
use crate::params::PageInfo;
use crate::pipeline::builder::COUNT_FIELD;
use crate::pipeline::{Pipeline, Stage};
use crate::store::{ensure_ready, DocumentStore};

pub mod categories;
pub mod customers;
pub mod orders;
pub mod products;
pub mod reviews;

/// Run the count and page pipelines and build the envelope.
///
/// A page past the first whose offset reaches the total is not found.
/// A windowed count pipeline is rejected before anything runs.
pub(crate) async fn fetch_page(
    store: &dyn DocumentStore,
    collection: &str,
    resource: &str,
    count: Pipeline,
    (list, page): (Pipeline, PageInfo),
    mut reshape: impl FnMut(&mut Value),
) -> Result<Listing<Value>> {
    if count.is_paginated() {
        return Err(Error::InvalidPipeline(format!("{resource} count pipeline has a page window")));
    }
    ensure_ready(store)?;
    let (counted, mut docs) = tokio::try_join!(
        store.aggregate(collection, &count),
        store.aggregate(collection, &list),
    )?;
    let records_count = counted
        .first()
        .and_then(|doc| doc.get(COUNT_FIELD))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    if page.is_past_end(records_count) {
        return Err(Error::NotFound(format!(
            "{} page {} (skip {} of {})",
            resource, page.num, page.skip, records_count
        )));
    }

    docs.iter_mut().for_each(&mut reshape);
    debug!(
        "{}: {} of {} records on page {}",
        resource,
        docs.len(),
        records_count,
        page.num
    );
    Ok(Listing::new(resource, docs, records_count, page.limit.get()))
}

/// Replace the array a join left under `field` with its first element, or null.
pub fn collapse_one(doc: &mut Value, field: &str) {
    if let Some(slot) = doc.get_mut(field) {
        *slot = match slot.take() {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            Value::Array(_) => Value::Null,
            other => other,
        };
    }
}

/// Reject identifiers that can never match a document.
pub(crate) fn require_id<'a>(id: &'a str, what: &str) -> Result<&'a str> {
    if ids::is_valid(id) {
        Ok(id)
    } else {
        Err(Error::NotFound(format!("{what} {id}")))
    }
}

/// Projection stripping the version field.
pub(crate) fn without_version() -> Stage {
    Stage::Project(vec![("__v".to_string(), false)])
}

/// Whether every identifier in `wanted` names a document of `collection`.
pub(crate) async fn all_exist(store: &dyn DocumentStore, collection: &str, wanted: &[String]) -> Result<bool> {
    let mut unique: Vec<&String> = wanted.iter().collect();
    unique.sort();
    unique.dedup();
    if unique.iter().any(|id| !ids::is_valid(id)) {
        return Ok(false);
    }
    ensure_ready(store)?;
    let pipeline = Pipeline::matching(json!({ "_id": { "$in": unique } }))
        .then(Stage::Count(COUNT_FIELD.to_string()));
    let counted = store.aggregate(collection, &pipeline).await?;
    let found = counted
        .first()
        .and_then(|doc| doc.get(COUNT_FIELD))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    Ok(found == unique.len() as u64)
}

/// Trimmed, non-empty text or a bad request naming the field.
pub(crate) fn require_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::BadRequest(format!("{field} must not be empty")))
    } else {
        Ok(trimmed.to_string())
    }
}
