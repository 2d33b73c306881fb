use serde_json::Value;
use storefront_core::Listing;

use crate::error::{Error, Result};
use crate::listing::{fetch_page, require_id};
use crate::params::{ListParams, PageLimit};
use crate::pipeline::builder::text_search;
use crate::pipeline::{ListQuery, Pipeline, Stage};
use crate::store::{collections, find_by_id, DocumentStore};

/// Fields that never leave the server.
fn hide_secrets() -> Vec<(String, bool)> {
    vec![("password".to_string(), false)]
}

/// List customers by username. Passwords are always removed, whatever `fields` asks for.
pub async fn list(store: &dyn DocumentStore, params: &ListParams) -> Result<Listing<Value>> {
    let mut query = ListQuery::new(Pipeline::new(), params, PageLimit::Twenty);
    if let Some(search) = &params.search {
        query = query.matching(text_search(&["username", "email", "first_name", "last_name"], search));
    }
    let (count, paged) = query.filter().project(hide_secrets()).split_count();
    let page = paged.sort("username").paginate();

    fetch_page(store, collections::CUSTOMERS, "customers", count, page, |_| {}).await
}

pub async fn get(store: &dyn DocumentStore, id: &str) -> Result<Value> {
    let id = require_id(id, "customer")?;
    let pipeline = Pipeline::new().then(Stage::Project(vec![
        ("password".to_string(), false),
        ("__v".to_string(), false),
    ]));
    find_by_id(store, collections::CUSTOMERS, id, pipeline)
        .await?
        .ok_or_else(|| Error::NotFound(format!("customer {id}")))
}
