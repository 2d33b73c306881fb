use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::ids;
use crate::pipeline::Pipeline;

pub mod engine;
pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Collection names.
pub mod collections {
    pub const PRODUCTS: &str = "products";
    pub const CATEGORIES: &str = "categories";
    pub const REVIEWS: &str = "reviews";
    pub const CUSTOMERS: &str = "customers";
    pub const ORDERS: &str = "orderhistories";

    pub const ALL: [&str; 5] = [PRODUCTS, CATEGORIES, REVIEWS, CUSTOMERS, ORDERS];
}

/// Document database backing the API
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Whether the store can serve queries
    fn is_ready(&self) -> bool;

    /// Run an aggregation pipeline against a collection
    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<Value>>;

    /// Insert a document, returning it with its assigned `_id`
    async fn insert(&self, collection: &str, document: Value) -> Result<Value>;

    /// Delete a document by `_id`, returning whether it existed
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;
}

/// Fail with `Unavailable` unless the store can serve queries.
pub fn ensure_ready(store: &dyn DocumentStore) -> Result<()> {
    if store.is_ready() {
        Ok(())
    } else {
        Err(Error::Unavailable("not connected to the database".into()))
    }
}

/// Stamp a new document with an `_id` (unless it has one) and version 0.
pub(crate) fn prepare_insert(document: &mut Value) -> Result<&mut Map<String, Value>> {
    let Value::Object(fields) = document else {
        return Err(Error::BadRequest("document must be a JSON object".into()));
    };
    if !fields.get("_id").is_some_and(Value::is_string) {
        fields.insert("_id".to_string(), json!(ids::generate()));
    }
    fields.entry("__v").or_insert(json!(0));
    Ok(fields)
}

/// Fetch one document by `_id`, running `pipeline` after the match.
pub async fn find_by_id(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    pipeline: Pipeline,
) -> Result<Option<Value>> {
    ensure_ready(store)?;
    let mut full = Pipeline::matching(json!({ "_id": id }));
    for stage in pipeline.stages() {
        full = full.then(stage.clone());
    }
    let mut docs = store.aggregate(collection, &full).await?;
    Ok(if docs.is_empty() { None } else { Some(docs.swap_remove(0)) })
}
