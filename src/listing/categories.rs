use serde_json::Value;
use storefront_core::{Category, Listing};
use tracing::info;

use crate::error::{Error, Result};
use crate::listing::{fetch_page, require_id, require_text, without_version};
use crate::params::{ListParams, PageLimit};
use crate::pipeline::builder::{exact_ci, text_search};
use crate::pipeline::{ListQuery, Pipeline};
use crate::store::{collections, ensure_ready, find_by_id, DocumentStore};

/// List categories, ten per page unless asked otherwise.
pub async fn list(store: &dyn DocumentStore, params: &ListParams) -> Result<Listing<Value>> {
    let mut query = ListQuery::new(Pipeline::new(), params, PageLimit::Ten);
    if let Some(search) = &params.search {
        query = query.matching(text_search(&["name", "alias"], search));
    }
    let (count, paged) = query.filter().split_count();
    let page = paged.sort("name").paginate();

    fetch_page(store, collections::CATEGORIES, "categories", count, page, |_| {}).await
}

pub async fn get(store: &dyn DocumentStore, id: &str) -> Result<Value> {
    let id = require_id(id, "category")?;
    find_by_id(store, collections::CATEGORIES, id, Pipeline::new().then(without_version()))
        .await?
        .ok_or_else(|| Error::NotFound(format!("category {id}")))
}

/// Store a new category. Names are unique regardless of case.
pub async fn create(store: &dyn DocumentStore, mut category: Category) -> Result<Value> {
    ensure_ready(store)?;
    category.id = None;
    category.name = require_text(&category.name, "name")?;
    category.alias = category.alias.trim().to_string();

    let existing = store
        .aggregate(collections::CATEGORIES, &Pipeline::matching(exact_ci("name", &category.name)))
        .await?;
    if !existing.is_empty() {
        return Err(Error::BadRequest(format!("category {} already exists", category.name)));
    }

    let doc = store
        .insert(collections::CATEGORIES, serde_json::to_value(&category)?)
        .await?;
    info!("Created category {}", category.name);
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn category(name: &str) -> Category {
        Category { id: None, name: name.into(), alias: String::new() }
    }

    #[tokio::test]
    async fn names_are_unique_ignoring_case() {
        let store = MemoryStore::new();
        create(&store, category("Toys")).await.unwrap();
        assert!(matches!(create(&store, category(" toys ")).await, Err(Error::BadRequest(_))));
        assert!(matches!(create(&store, category("")).await, Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn default_page_holds_ten_sorted_by_name() {
        let store = MemoryStore::new();
        for i in (0..12).rev() {
            create(&store, category(&format!("cat-{i:02}"))).await.unwrap();
        }

        let listing = list(&store, &ListParams::default()).await.unwrap();
        assert_eq!(listing.records_count, 12);
        assert_eq!(listing.total_pages, 2);
        assert_eq!(listing.list_count, 10);
        assert_eq!(listing.items()[0]["name"], "cat-00");
        assert!(listing.items()[0].get("__v").is_none());

        let second = list(&store, &ListParams::from_query(Some("page=2"))).await.unwrap();
        assert_eq!(second.list_count, 2);
        assert_eq!(second.records_count, 12);
        assert!(matches!(
            list(&store, &ListParams::from_query(Some("page=3"))).await,
            Err(Error::NotFound(_))
        ));
    }
}
