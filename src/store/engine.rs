//! In-process evaluation of aggregation stages over JSON documents.
//!
//! Covers the stages and operators the list builders emit, with MongoDB
//! semantics where they matter for results: dotted paths traverse arrays,
//! equality on an array field matches any element, sorting uses a fixed
//! cross-type order, and a missing field compares as null.

use std::cmp::Ordering;
use std::collections::HashMap;

use regex::RegexBuilder;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::pipeline::{Lookup, SortKey, SortOrder, Stage};

/// Collection name to documents.
pub type Collections = HashMap<String, Vec<Value>>;

/// Run `stages` over `docs`, resolving joins against `db`.
pub fn run(db: &Collections, mut docs: Vec<Value>, stages: &[Stage]) -> Result<Vec<Value>> {
    for stage in stages {
        docs = apply(db, docs, stage)?;
    }
    Ok(docs)
}

fn apply(db: &Collections, mut docs: Vec<Value>, stage: &Stage) -> Result<Vec<Value>> {
    match stage {
        Stage::Match(filter) => {
            let mut out = Vec::with_capacity(docs.len());
            for doc in docs {
                if matches(&doc, filter)? {
                    out.push(doc);
                }
            }
            Ok(out)
        }
        Stage::Project(spec) => Ok(docs.into_iter().map(|doc| project(doc, spec)).collect()),
        Stage::Sort(keys) => {
            sort(&mut docs, keys);
            Ok(docs)
        }
        Stage::Skip(n) => Ok(docs.into_iter().skip(usize::try_from(*n).unwrap_or(usize::MAX)).collect()),
        Stage::Limit(n) => Ok(docs.into_iter().take(usize::try_from(*n).unwrap_or(usize::MAX)).collect()),
        Stage::Lookup(lookup) => docs.into_iter().map(|doc| join(db, doc, lookup)).collect(),
        Stage::AddFields(fields) => docs
            .into_iter()
            .map(|mut doc| {
                let values = fields
                    .iter()
                    .map(|(_, expr)| evaluate(&doc, expr))
                    .collect::<Result<Vec<_>>>()?;
                for ((path, _), value) in fields.iter().zip(values) {
                    set_path(&mut doc, &split(path), value);
                }
                Ok(doc)
            })
            .collect(),
        Stage::Group(spec) => group(docs, spec),
        Stage::Count(name) => Ok(if docs.is_empty() {
            Vec::new()
        } else {
            vec![json!({ name: docs.len() })]
        }),
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

fn split(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

/// Every value reachable at `path`, descending into arrays. An array at
/// the end of the path contributes itself and each of its elements.
fn path_values<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut out = Vec::new();
    collect(doc, &split(path), &mut out);
    out
}

fn collect<'a>(value: &'a Value, parts: &[&str], out: &mut Vec<&'a Value>) {
    match parts.split_first() {
        None => {
            out.push(value);
            if let Value::Array(items) = value {
                out.extend(items.iter());
            }
        }
        Some((head, rest)) => match value {
            Value::Object(map) => {
                if let Some(next) = map.get(*head) {
                    collect(next, rest, out);
                }
            }
            Value::Array(items) => {
                for item in items {
                    collect(item, parts, out);
                }
            }
            _ => {}
        },
    }
}

/// Expression-style field reference: arrays along the path map to arrays.
fn resolve(value: &Value, parts: &[&str]) -> Option<Value> {
    match parts.split_first() {
        None => Some(value.clone()),
        Some((head, rest)) => match value {
            Value::Object(map) => map.get(*head).and_then(|v| resolve(v, rest)),
            Value::Array(items) => Some(Value::Array(
                items.iter().filter_map(|item| resolve(item, parts)).collect(),
            )),
            _ => None,
        },
    }
}

fn set_path(doc: &mut Value, parts: &[&str], value: Value) {
    let Value::Object(map) = doc else { return };
    match parts {
        [] => {}
        [last] => {
            map.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let child = map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            set_path(child, rest, value);
        }
    }
}

fn remove_path(value: &mut Value, parts: &[&str]) {
    let Some((head, rest)) = parts.split_first() else { return };
    match value {
        Value::Object(map) => {
            if rest.is_empty() {
                map.remove(*head);
            } else if let Some(child) = map.get_mut(*head) {
                remove_path(child, rest);
            }
        }
        Value::Array(items) => {
            for item in items {
                remove_path(item, parts);
            }
        }
        _ => {}
    }
}

fn copy_path(src: &Value, dst: &mut Value, parts: &[&str]) {
    let Some((head, rest)) = parts.split_first() else { return };
    let (Value::Object(src_map), Value::Object(dst_map)) = (src, dst) else { return };
    let Some(child) = src_map.get(*head) else { return };

    if rest.is_empty() {
        dst_map.insert((*head).to_string(), child.clone());
        return;
    }
    match child {
        Value::Object(_) => {
            let entry = dst_map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            copy_path(child, entry, rest);
        }
        Value::Array(items) => {
            let projected = items
                .iter()
                .filter(|item| item.is_object())
                .map(|item| {
                    let mut out = Value::Object(Map::new());
                    copy_path(item, &mut out, rest);
                    out
                })
                .collect();
            dst_map.insert((*head).to_string(), Value::Array(projected));
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

// ---------------------------------------------------------------------------
// $match
// ---------------------------------------------------------------------------

pub(crate) fn matches(doc: &Value, filter: &Value) -> Result<bool> {
    let Value::Object(clauses) = filter else {
        return Err(Error::InvalidPipeline("$match filter must be an object".into()));
    };
    for (key, cond) in clauses {
        let ok = match key.as_str() {
            "$or" => {
                let mut any = false;
                for clause in clause_list(key, cond)? {
                    if matches(doc, clause)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$and" => {
                let mut all = true;
                for clause in clause_list(key, cond)? {
                    if !matches(doc, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$nor" => {
                let mut none = true;
                for clause in clause_list(key, cond)? {
                    if matches(doc, clause)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            op if op.starts_with('$') => {
                return Err(Error::InvalidPipeline(format!("unknown top level operator: {op}")));
            }
            path => field_matches(&path_values(doc, path), cond)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clause_list<'a>(op: &str, cond: &'a Value) -> Result<&'a Vec<Value>> {
    cond.as_array()
        .ok_or_else(|| Error::InvalidPipeline(format!("{op} requires an array")))
}

fn field_matches(values: &[&Value], cond: &Value) -> Result<bool> {
    let Value::Object(ops) = cond else {
        return Ok(equals_any(values, cond));
    };
    if !ops.keys().any(|k| k.starts_with('$')) {
        return Ok(equals_any(values, cond));
    }

    for (op, arg) in ops {
        let ok = match op.as_str() {
            "$eq" => equals_any(values, arg),
            "$ne" => !equals_any(values, arg),
            "$gt" => compares_any(values, arg, |o| o == Ordering::Greater),
            "$gte" => compares_any(values, arg, |o| o != Ordering::Less),
            "$lt" => compares_any(values, arg, |o| o == Ordering::Less),
            "$lte" => compares_any(values, arg, |o| o != Ordering::Greater),
            "$in" => clause_list(op, arg)?.iter().any(|c| equals_any(values, c)),
            "$nin" => !clause_list(op, arg)?.iter().any(|c| equals_any(values, c)),
            "$exists" => values.is_empty() != arg.as_bool().unwrap_or(true),
            "$regex" => {
                let options = ops.get("$options").and_then(Value::as_str).unwrap_or("");
                regex_any(values, arg, options)?
            }
            "$options" => true,
            other => return Err(Error::InvalidPipeline(format!("unknown operator: {other}"))),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn equals_any(values: &[&Value], target: &Value) -> bool {
    if target.is_null() && values.is_empty() {
        return true;
    }
    values.iter().any(|v| values_equal(v, target))
}

fn compares_any(values: &[&Value], target: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    values
        .iter()
        .filter(|v| type_rank(v) == type_rank(target))
        .any(|v| accept(compare_values(v, target)))
}

fn regex_any(values: &[&Value], pattern: &Value, options: &str) -> Result<bool> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| Error::InvalidPipeline("$regex has to be a string".into()))?;
    let re = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .build()
        .map_err(|e| Error::InvalidPipeline(e.to_string()))?;
    Ok(values.iter().filter_map(|v| v.as_str()).any(|s| re.is_match(s)))
}

// ---------------------------------------------------------------------------
// $project, $sort, $lookup
// ---------------------------------------------------------------------------

fn project(doc: Value, spec: &[(String, bool)]) -> Value {
    let inclusive = spec.iter().any(|(_, include)| *include);
    if !inclusive {
        let mut doc = doc;
        for (path, _) in spec {
            remove_path(&mut doc, &split(path));
        }
        return doc;
    }

    let mut out = Value::Object(Map::new());
    let keep_id = !spec.iter().any(|(path, include)| path == "_id" && !include);
    if keep_id {
        copy_path(&doc, &mut out, &["_id"]);
    }
    for (path, include) in spec {
        if *include {
            copy_path(&doc, &mut out, &split(path));
        }
    }
    out
}

fn sort_value(doc: &Value, key: &SortKey) -> Value {
    let candidates = path_values(doc, &key.field)
        .into_iter()
        .filter(|v| !v.is_array());
    let pick = match key.order {
        SortOrder::Ascending => candidates.min_by(|a, b| compare_values(a, b)),
        SortOrder::Descending => candidates.max_by(|a, b| compare_values(a, b)),
    };
    pick.cloned().unwrap_or(Value::Null)
}

fn sort(docs: &mut [Value], keys: &[SortKey]) {
    docs.sort_by(|a, b| {
        for key in keys {
            let ord = compare_values(&sort_value(a, key), &sort_value(b, key));
            let ord = match key.order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn join_keys(doc: &Value, path: &str) -> Vec<Value> {
    let keys: Vec<Value> = path_values(doc, path)
        .into_iter()
        .filter(|v| !v.is_array())
        .cloned()
        .collect();
    if keys.is_empty() {
        vec![Value::Null]
    } else {
        keys
    }
}

fn join(db: &Collections, mut doc: Value, lookup: &Lookup) -> Result<Value> {
    let foreign = db.get(&lookup.from).map(Vec::as_slice).unwrap_or(&[]);
    let locals = join_keys(&doc, &lookup.local_field);
    let joined: Vec<Value> = foreign
        .iter()
        .filter(|f| {
            join_keys(f, &lookup.foreign_field)
                .iter()
                .any(|k| locals.iter().any(|l| values_equal(k, l)))
        })
        .cloned()
        .collect();
    let joined = run(db, joined, &lookup.pipeline)?;
    set_path(&mut doc, &split(&lookup.as_field), Value::Array(joined));
    Ok(doc)
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

fn number_to_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

pub(crate) fn evaluate(doc: &Value, expr: &Value) -> Result<Value> {
    match expr {
        Value::String(s) if s.starts_with('$') => Ok(resolve(doc, &split(&s[1..])).unwrap_or(Value::Null)),
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some((op, arg)) = map.iter().next() {
                    if op.starts_with('$') {
                        return operator(doc, op, arg);
                    }
                }
            }
            let mut out = Map::new();
            for (key, value) in map {
                out.insert(key.clone(), evaluate(doc, value)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| evaluate(doc, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn operator(doc: &Value, op: &str, arg: &Value) -> Result<Value> {
    let args = match arg {
        Value::Array(items) => items
            .iter()
            .map(|item| evaluate(doc, item))
            .collect::<Result<Vec<_>>>()?,
        other => vec![evaluate(doc, other)?],
    };
    let numbers: Option<Vec<f64>> = args.iter().map(Value::as_f64).collect();

    match op {
        "$add" => Ok(numbers.map_or(Value::Null, |n| number_to_value(n.iter().sum()))),
        "$multiply" => Ok(numbers.map_or(Value::Null, |n| number_to_value(n.iter().product()))),
        "$subtract" | "$divide" => {
            let Some(n) = numbers else { return Ok(Value::Null) };
            let [a, b] = n[..] else {
                return Err(Error::InvalidPipeline(format!("{op} takes exactly 2 arguments")));
            };
            if op == "$subtract" {
                Ok(number_to_value(a - b))
            } else if b == 0.0 {
                Err(Error::InvalidPipeline("can't $divide by zero".into()))
            } else {
                Ok(number_to_value(a / b))
            }
        }
        "$round" => {
            let place = args.get(1).and_then(Value::as_i64).unwrap_or(0);
            Ok(match args.first().and_then(Value::as_f64) {
                Some(x) => {
                    let factor = 10f64.powi(place.clamp(-20, 100) as i32);
                    number_to_value((x * factor).round_ties_even() / factor)
                }
                None => Value::Null,
            })
        }
        "$ifNull" => Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null)),
        "$arrayElemAt" => Ok(match (args.first(), args.get(1).and_then(Value::as_i64)) {
            (Some(Value::Array(items)), Some(i)) => {
                let idx = if i < 0 { items.len() as i64 + i } else { i };
                usize::try_from(idx)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            _ => Value::Null,
        }),
        other => Err(Error::InvalidPipeline(format!("unknown expression operator: {other}"))),
    }
}

// ---------------------------------------------------------------------------
// $group
// ---------------------------------------------------------------------------

fn group(docs: Vec<Value>, spec: &Value) -> Result<Vec<Value>> {
    let Value::Object(spec) = spec else {
        return Err(Error::InvalidPipeline("$group specification must be an object".into()));
    };
    let key_expr = spec
        .get("_id")
        .ok_or_else(|| Error::InvalidPipeline("$group requires an _id".into()))?;

    let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for doc in docs {
        let key = evaluate(&doc, key_expr)?;
        let slot = match index.get(&key.to_string()) {
            Some(slot) => *slot,
            None => {
                index.insert(key.to_string(), groups.len());
                groups.push((key, Vec::new()));
                groups.len() - 1
            }
        };
        groups[slot].1.push(doc);
    }

    let mut out = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        let mut doc = Map::new();
        doc.insert("_id".to_string(), key);
        for (name, acc) in spec.iter().filter(|(name, _)| *name != "_id") {
            doc.insert(name.clone(), accumulate(&members, name, acc)?);
        }
        out.push(Value::Object(doc));
    }
    Ok(out)
}

fn accumulate(members: &[Value], name: &str, acc: &Value) -> Result<Value> {
    let Some((op, expr)) = acc.as_object().filter(|m| m.len() == 1).and_then(|m| m.iter().next()) else {
        return Err(Error::InvalidPipeline(format!("accumulator {name} must be a single-operator object")));
    };
    let values = members
        .iter()
        .map(|doc| evaluate(doc, expr))
        .collect::<Result<Vec<_>>>()?;
    let numbers: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();

    Ok(match op.as_str() {
        "$sum" => number_to_value(numbers.iter().sum()),
        "$avg" if numbers.is_empty() => Value::Null,
        "$avg" => number_to_value(numbers.iter().sum::<f64>() / numbers.len() as f64),
        "$min" => values
            .into_iter()
            .filter(|v| !v.is_null())
            .min_by(compare_values)
            .unwrap_or(Value::Null),
        "$max" => values
            .into_iter()
            .filter(|v| !v.is_null())
            .max_by(compare_values)
            .unwrap_or(Value::Null),
        "$first" => values.into_iter().next().unwrap_or(Value::Null),
        "$last" => values.into_iter().last().unwrap_or(Value::Null),
        "$push" => Value::Array(values),
        "$count" => json!(members.len()),
        other => return Err(Error::InvalidPipeline(format!("unknown group operator: {other}"))),
    })
}
