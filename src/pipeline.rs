//! Aggregation pipelines.
//!
//! A [`Pipeline`] is an immutable, ordered list of [`Stage`]s. Appending a
//! stage yields a new pipeline value; any pipeline cloned earlier keeps
//! the stages it had. Unmodified prefixes share one allocation.

use std::sync::Arc;

use serde_json::{json, Map, Value};

pub mod builder;

pub use builder::{ListQuery, PagedQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: SortOrder::Ascending }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: SortOrder::Descending }
    }

    /// Parse a comma separated sort list; a leading `-` sorts descending.
    pub fn parse_list(spec: &str) -> Vec<SortKey> {
        spec.split(',')
            .map(|part| part.chars().filter(|c| !c.is_whitespace()).collect::<String>())
            .filter_map(|part| match part.strip_prefix('-') {
                Some("") => None,
                Some(field) => Some(SortKey::desc(field)),
                None if part.is_empty() => None,
                None => Some(SortKey::asc(part)),
            })
            .collect()
    }
}

/// Join stage: attach documents of `from` whose `foreign_field` equals
/// `local_field`, stored as an array under `as_field`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    pub as_field: String,
    /// Stages run on the joined documents before they are attached.
    pub pipeline: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Value),
    /// Field paths with `true` to include and `false` to exclude.
    Project(Vec<(String, bool)>),
    Sort(Vec<SortKey>),
    Skip(u64),
    Limit(u64),
    Lookup(Lookup),
    AddFields(Vec<(String, Value)>),
    /// `$group` specification: `_id` expression plus accumulators.
    Group(Value),
    /// Replace the stream with one document holding the count under this name.
    Count(String),
}

impl Stage {
    /// Render in MongoDB aggregation syntax.
    pub fn to_document(&self) -> Value {
        match self {
            Stage::Match(filter) => json!({ "$match": filter }),
            Stage::Project(fields) => {
                let spec: Map<String, Value> = fields
                    .iter()
                    .map(|(path, include)| (path.clone(), json!(u8::from(*include))))
                    .collect();
                json!({ "$project": spec })
            }
            Stage::Sort(keys) => {
                let spec: Map<String, Value> = keys
                    .iter()
                    .map(|key| {
                        let dir = match key.order {
                            SortOrder::Ascending => 1,
                            SortOrder::Descending => -1,
                        };
                        (key.field.clone(), json!(dir))
                    })
                    .collect();
                json!({ "$sort": spec })
            }
            Stage::Skip(n) => json!({ "$skip": n }),
            Stage::Limit(n) => json!({ "$limit": n }),
            Stage::Lookup(lookup) => {
                let mut spec = json!({
                    "from": lookup.from,
                    "localField": lookup.local_field,
                    "foreignField": lookup.foreign_field,
                    "as": lookup.as_field,
                });
                if !lookup.pipeline.is_empty() {
                    spec["pipeline"] = Value::Array(lookup.pipeline.iter().map(Stage::to_document).collect());
                }
                json!({ "$lookup": spec })
            }
            Stage::AddFields(fields) => {
                let spec: Map<String, Value> = fields.iter().cloned().collect();
                json!({ "$addFields": spec })
            }
            Stage::Group(spec) => json!({ "$group": spec }),
            Stage::Count(name) => json!({ "$count": name }),
        }
    }

    fn is_pagination(&self) -> bool {
        matches!(self, Stage::Skip(_) | Stage::Limit(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Arc<Vec<Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pipeline starting with a single `$match`.
    pub fn matching(filter: Value) -> Self {
        Self::new().then(Stage::Match(filter))
    }

    /// Append a stage. Pipelines cloned from `self` before this call are unaffected.
    pub fn then(mut self, stage: Stage) -> Self {
        Arc::make_mut(&mut self.stages).push(stage);
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Whether a skip or limit stage has been appended.
    pub fn is_paginated(&self) -> bool {
        self.stages.iter().any(Stage::is_pagination)
    }

    pub fn to_documents(&self) -> Vec<Value> {
        self.stages.iter().map(Stage::to_document).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_lists_parse_direction_and_whitespace() {
        assert_eq!(
            SortKey::parse_list(" price , -name,,-"),
            vec![SortKey::asc("price"), SortKey::desc("name")]
        );
        assert_eq!(SortKey::parse_list("-review_date"), vec![SortKey::desc("review_date")]);
    }

    #[test]
    fn appending_leaves_earlier_clones_untouched() {
        let base = Pipeline::matching(json!({ "brand": "Sony" }));
        let snapshot = base.clone();
        let paged = base.then(Stage::Skip(20)).then(Stage::Limit(20));

        assert_eq!(snapshot.stages().len(), 1);
        assert!(!snapshot.is_paginated());
        assert_eq!(paged.stages().len(), 3);
        assert!(paged.is_paginated());
    }

    #[test]
    fn renders_mongo_syntax() {
        let pipeline = Pipeline::matching(json!({ "category": "c1" }))
            .then(Stage::Project(vec![("__v".into(), false)]))
            .then(Stage::Sort(vec![SortKey::asc("name"), SortKey::desc("price")]))
            .then(Stage::Lookup(Lookup {
                from: "reviews".into(),
                local_field: "_id".into(),
                foreign_field: "product_id".into(),
                as_field: "review_info".into(),
                pipeline: vec![Stage::Count("n".into())],
            }))
            .then(Stage::Skip(0))
            .then(Stage::Limit(5));

        let docs = pipeline.to_documents();
        assert_eq!(docs[0], json!({ "$match": { "category": "c1" } }));
        assert_eq!(docs[1], json!({ "$project": { "__v": 0 } }));
        assert_eq!(docs[2], json!({ "$sort": { "name": 1, "price": -1 } }));
        assert_eq!(docs[3]["$lookup"]["localField"], "_id");
        assert_eq!(docs[3]["$lookup"]["pipeline"], json!([{ "$count": "n" }]));
        assert_eq!(docs[4], json!({ "$skip": 0 }));
        assert_eq!(docs[5], json!({ "$limit": 5 }));
    }
}
