//! Chainable list-query builder.
//!
//! Building happens in two phases. [`ListQuery`] accepts the stages that
//! decide *which* documents match: filters, computed fields, projection
//! and range bounds. [`ListQuery::split_count`] then hands back the
//! counting pipeline together with a [`PagedQuery`], which only accepts
//! the stages that decide *how* the matches are presented: sort, joins
//! and the page window. A count can therefore never include pagination,
//! and no filter can be added after the count was taken.

use serde_json::{json, Value};

use crate::params::{ListParams, PageInfo, PageLimit, Range};
use crate::pipeline::{Lookup, Pipeline, SortKey, Stage};

/// Field holding the total in the counting pipeline's only document.
pub const COUNT_FIELD: &str = "records_count";

/// Projection applied when `fields` is absent or unusable.
fn default_projection() -> Vec<(String, bool)> {
    vec![("__v".to_string(), false)]
}

/// Translate a `fields` value into a projection.
///
/// The list must be all inclusions or all exclusions (`-field`). The one
/// exception is `-_id`, which may appear among inclusions. Anything else,
/// including an empty list, yields the default projection that strips
/// the version field.
pub fn projection(fields: Option<&str>) -> Vec<(String, bool)> {
    let Some(raw) = fields else {
        return default_projection();
    };
    let entries: Vec<String> = raw
        .split(',')
        .map(|s| s.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|s| !s.is_empty() && s != "-" && s != "undefined")
        .collect();

    let Some(first) = entries.first() else {
        return default_projection();
    };
    let consistent = if first.starts_with('-') {
        entries.iter().all(|e| e.starts_with('-'))
    } else {
        entries.iter().all(|e| !e.starts_with('-') || e == "-_id")
    };
    if !consistent {
        return default_projection();
    }

    entries
        .into_iter()
        .map(|e| match e.strip_prefix('-') {
            Some(field) => (field.to_string(), false),
            None => (e, true),
        })
        .collect()
}

/// Case-insensitive substring match of `term` on any of `fields`.
pub fn text_search(fields: &[&str], term: &str) -> Value {
    let pattern = regex::escape(term.trim());
    let clauses: Vec<Value> = fields
        .iter()
        .map(|field| json!({ *field: { "$regex": pattern, "$options": "i" } }))
        .collect();
    json!({ "$or": clauses })
}

/// Case-insensitive whole-value match.
pub fn exact_ci(field: &str, value: &str) -> Value {
    let pattern = format!("^{}$", regex::escape(value.trim()));
    json!({ field: { "$regex": pattern, "$options": "i" } })
}

/// First phase of a list query: stages that select documents.
pub struct ListQuery<'a> {
    pipeline: Pipeline,
    params: &'a ListParams,
    default_limit: PageLimit,
}

impl<'a> ListQuery<'a> {
    pub fn new(base: Pipeline, params: &'a ListParams, default_limit: PageLimit) -> Self {
        Self { pipeline: base, params, default_limit }
    }

    pub fn matching(mut self, filter: Value) -> Self {
        self.pipeline = self.pipeline.then(Stage::Match(filter));
        self
    }

    pub fn add_fields(mut self, fields: Vec<(String, Value)>) -> Self {
        self.pipeline = self.pipeline.then(Stage::AddFields(fields));
        self
    }

    pub fn populate(mut self, lookup: Lookup) -> Self {
        self.pipeline = self.pipeline.then(Stage::Lookup(lookup));
        self
    }

    /// Project the fields requested by the client.
    pub fn filter(mut self) -> Self {
        let spec = projection(self.params.fields.as_deref());
        self.pipeline = self.pipeline.then(Stage::Project(spec));
        self
    }

    pub fn project(mut self, spec: Vec<(String, bool)>) -> Self {
        self.pipeline = self.pipeline.then(Stage::Project(spec));
        self
    }

    /// Keep documents whose `field` lies within `range`, when one was given.
    pub fn within(self, field: &str, range: Option<Range>) -> Self {
        match range {
            Some(Range { low, high }) => self.matching(json!({ field: { "$gte": low, "$lte": high } })),
            None => self,
        }
    }

    /// Take the counting pipeline and move on to presentation stages.
    pub fn split_count(self) -> (Pipeline, PagedQuery<'a>) {
        let count = self.pipeline.clone().then(Stage::Count(COUNT_FIELD.to_string()));
        let paged = PagedQuery {
            pipeline: self.pipeline,
            params: self.params,
            default_limit: self.default_limit,
        };
        (count, paged)
    }
}

/// Second phase of a list query: stages that shape and window the matches.
pub struct PagedQuery<'a> {
    pipeline: Pipeline,
    params: &'a ListParams,
    default_limit: PageLimit,
}

impl PagedQuery<'_> {
    fn page_info(&self) -> PageInfo {
        self.params.page_info(self.default_limit)
    }

    /// Sort by the client's `sort` list, or by `default_field` (`-` prefix for descending).
    pub fn sort(self, default_field: &str) -> Self {
        let keys = self
            .params
            .sort
            .as_deref()
            .map(SortKey::parse_list)
            .filter(|keys| !keys.is_empty())
            .unwrap_or_else(|| SortKey::parse_list(default_field));
        self.sort_keys(keys)
    }

    pub fn sort_keys(mut self, keys: Vec<SortKey>) -> Self {
        if !keys.is_empty() {
            self.pipeline = self.pipeline.then(Stage::Sort(keys));
        }
        self
    }

    /// Join `from` documents whose `foreign_field` equals `local_field`,
    /// running `extra` on the joined documents before storing them under `as_field`.
    pub fn populate(
        mut self,
        from: &str,
        local_field: &str,
        foreign_field: &str,
        as_field: &str,
        extra: Vec<Stage>,
    ) -> Self {
        self.pipeline = self.pipeline.then(Stage::Lookup(Lookup {
            from: from.to_string(),
            local_field: local_field.to_string(),
            foreign_field: foreign_field.to_string(),
            as_field: as_field.to_string(),
            pipeline: extra,
        }));
        self
    }

    /// Window the results to the requested page.
    pub fn paginate(self) -> (Pipeline, PageInfo) {
        let page = self.page_info();
        let pipeline = self
            .pipeline
            .then(Stage::Skip(page.skip))
            .then(Stage::Limit(page.limit.get()));
        (pipeline, page)
    }
}
