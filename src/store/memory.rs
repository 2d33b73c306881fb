use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::store::engine::{self, Collections};
use crate::store::{collections, prepare_insert, DocumentStore};

/// In-process document store
///
/// Seed directory layout, one JSON array per collection:
/// ```text
/// {seed_path}/products.json
/// {seed_path}/categories.json
/// {seed_path}/reviews.json
/// {seed_path}/customers.json
/// {seed_path}/orderhistories.json
/// ```
pub struct MemoryStore {
    collections: RwLock<Collections>,
    ready: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(Collections::new()),
            ready: AtomicBool::new(true),
        }
    }

    /// Create a store and load every collection file found under `path`.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let store = Self::new();
        for name in collections::ALL {
            let file = path.join(format!("{name}.json"));
            match store.load_file(name, &file).await {
                Ok(0) => {}
                Ok(count) => info!("Loaded {} documents into {}", count, name),
                Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("No seed file for {} at {}", name, file.display());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(store)
    }

    async fn load_file(&self, collection: &str, file: &Path) -> Result<usize> {
        let content = fs::read_to_string(file).await?;
        let docs: Vec<Value> = serde_json::from_str(&content)?;
        let count = docs.len();
        for doc in docs {
            self.insert(collection, doc).await?;
        }
        Ok(count)
    }

    /// Mark the store as connected or disconnected.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<Value>> {
        let db = self.collections.read().await;
        let docs = db.get(collection).cloned().unwrap_or_default();
        debug!(collection, stages = ?pipeline.to_documents(), "aggregate");
        engine::run(&db, docs, pipeline.stages())
    }

    async fn insert(&self, collection: &str, mut document: Value) -> Result<Value> {
        prepare_insert(&mut document)?;

        let mut db = self.collections.write().await;
        let docs = db.entry(collection.to_string()).or_default();
        if let Some(id) = document.get("_id") {
            if docs.iter().any(|d| d.get("_id") == Some(id)) {
                return Err(Error::BadRequest(format!("duplicate _id {id} in {collection}")));
            }
        }
        docs.push(document.clone());
        Ok(document)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut db = self.collections.write().await;
        let Some(docs) = db.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| d.get("_id").and_then(Value::as_str) != Some(id));
        Ok(docs.len() != before)
    }
}
