use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use mongodb::{Client, Database};
use serde_json::{json, Map, Value};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::ids;
use crate::pipeline::Pipeline;
use crate::store::{prepare_insert, DocumentStore};

const HEARTBEAT: Duration = Duration::from_secs(10);

const FALLBACK_DATABASE: &str = "storefront";

/// MongoDB-backed document store
///
/// Pipelines run server side through `aggregate`. Identifiers travel as
/// 24-hex strings in the API and are stored as `ObjectId`s; timestamps are
/// stored as BSON dates.
pub struct MongoStore {
    db: Database,
    ready: Arc<AtomicBool>,
}

impl MongoStore {
    /// Connect and ping the server. `database` falls back to the one named
    /// in the URI, then to `storefront`.
    pub async fn connect(uri: &str, database: Option<&str>) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = match database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(FALLBACK_DATABASE)),
        };
        db.run_command(doc! { "ping": 1 }).await?;
        info!("Connected to database {}", db.name());

        let ready = Arc::new(AtomicBool::new(true));
        tokio::spawn(heartbeat(db.clone(), Arc::downgrade(&ready)));
        Ok(Self { db, ready })
    }
}

/// Ping until the store is dropped, tracking whether the server answers.
async fn heartbeat(db: Database, ready: Weak<AtomicBool>) {
    let mut ticks = interval(HEARTBEAT);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        let up = db.run_command(doc! { "ping": 1 }).await.is_ok();
        let Some(ready) = ready.upgrade() else {
            return;
        };
        if ready.swap(up, Ordering::SeqCst) != up {
            if up {
                info!("Reconnected to database {}", db.name());
            } else {
                warn!("Lost connection to database {}", db.name());
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<Value>> {
        let stages: Vec<Document> = pipeline
            .to_documents()
            .iter()
            .filter_map(Value::as_object)
            .map(to_document)
            .collect();
        debug!(collection, stages = stages.len(), "aggregate");

        let mut cursor = self.db.collection::<Document>(collection).aggregate(stages).await?;
        let mut docs = Vec::new();
        while cursor.advance().await? {
            docs.push(from_bson(Bson::Document(cursor.deserialize_current()?)));
        }
        Ok(docs)
    }

    async fn insert(&self, collection: &str, mut document: Value) -> Result<Value> {
        let fields = prepare_insert(&mut document)?;
        let stored = to_document(fields);
        self.db.collection::<Document>(collection).insert_one(stored).await?;
        Ok(document)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let filter = doc! { "_id": to_bson(&json!(id)) };
        let result = self.db.collection::<Document>(collection).delete_one(filter).await?;
        Ok(result.deleted_count > 0)
    }
}

/// Operands compared as raw text; never cast.
fn is_text_operator(key: &str) -> bool {
    key == "$regex" || key == "$options"
}

fn to_document(fields: &Map<String, Value>) -> Document {
    fields
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) if is_text_operator(key) => Bson::String(text.clone()),
                other => to_bson(other),
            };
            (key.clone(), value)
        })
        .collect()
}

fn to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Bson::Int64(i),
            None => n.as_f64().map_or(Bson::Null, Bson::Double),
        },
        Value::String(text) if ids::is_valid(text) => {
            ObjectId::parse_str(text).map_or_else(|_| Bson::String(text.clone()), Bson::ObjectId)
        }
        Value::String(text) => match text.parse::<Timestamp>() {
            Ok(ts) => Bson::DateTime(DateTime::from_millis(ts.as_millisecond())),
            Err(_) => Bson::String(text.clone()),
        },
        Value::Array(items) => Bson::Array(items.iter().map(to_bson).collect()),
        Value::Object(fields) => Bson::Document(to_document(fields)),
    }
}

fn from_bson(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Timestamp::from_millisecond(dt.timestamp_millis())
            .map_or(Value::Null, |ts| Value::String(ts.to_string())),
        Bson::Document(doc) => Value::Object(doc.into_iter().map(|(k, v)| (k, from_bson(v))).collect()),
        Bson::Array(items) => Value::Array(items.into_iter().map(from_bson).collect()),
        Bson::String(text) => Value::String(text),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(n) => json!(n),
        Bson::Int64(n) => json!(n),
        Bson::Double(n) => json!(n),
        Bson::Null | Bson::Undefined => Value::Null,
        other => other.into_relaxed_extjson(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "668d71ba569596eb9af05f19";

    #[test]
    fn identifiers_and_dates_are_stored_natively() {
        let doc = to_document(
            json!({
                "_id": ID,
                "cart": [{ "_id": ID, "cart_quantity": 2 }],
                "order_date": "2024-10-01T22:31:31.507Z",
                "price": 19.99,
                "name": "test-nintendo",
            })
            .as_object()
            .unwrap(),
        );
        assert!(matches!(doc.get("_id"), Some(Bson::ObjectId(_))));
        assert!(matches!(doc.get("order_date"), Some(Bson::DateTime(_))));
        assert_eq!(doc.get("price"), Some(&Bson::Double(19.99)));
        assert_eq!(doc.get("name"), Some(&Bson::String("test-nintendo".into())));
        let cart = doc.get_array("cart").unwrap();
        let line = cart[0].as_document().unwrap();
        assert!(matches!(line.get("_id"), Some(Bson::ObjectId(_))));
        assert_eq!(line.get("cart_quantity"), Some(&Bson::Int64(2)));
    }

    #[test]
    fn regex_operands_stay_text() {
        let filter = json!({ "$or": [{ "review_description": { "$regex": ID, "$options": "i" } }] });
        let doc = to_document(filter.as_object().unwrap());
        let clause = doc.get_array("$or").unwrap()[0].as_document().unwrap();
        let cond = clause.get_document("review_description").unwrap();
        assert_eq!(cond.get("$regex"), Some(&Bson::String(ID.into())));
    }

    #[test]
    fn stored_documents_read_back_as_api_json() {
        let stored = doc! {
            "_id": ObjectId::parse_str(ID).unwrap(),
            "review_date": DateTime::from_millis(1_727_821_891_507),
            "rating": 5_i32,
            "review_info": [{ "review_average": 4.5, "review_count": 2_i32 }],
            "gone": Bson::Null,
        };
        assert_eq!(
            from_bson(Bson::Document(stored)),
            json!({
                "_id": ID,
                "review_date": "2024-10-01T22:31:31.507Z",
                "rating": 5,
                "review_info": [{ "review_average": 4.5, "review_count": 2 }],
                "gone": null,
            })
        );
    }

    #[test]
    fn pipelines_translate_stage_by_stage() {
        let pipeline = Pipeline::matching(json!({ "customer_id": ID }))
            .then(crate::pipeline::Stage::Skip(40))
            .then(crate::pipeline::Stage::Limit(20));
        let stages: Vec<Document> = pipeline
            .to_documents()
            .iter()
            .filter_map(Value::as_object)
            .map(to_document)
            .collect();
        assert_eq!(stages.len(), 3);
        let matched = stages[0].get_document("$match").unwrap();
        assert!(matches!(matched.get("customer_id"), Some(Bson::ObjectId(_))));
        assert_eq!(stages[1].get("$skip"), Some(&Bson::Int64(40)));
    }
}
