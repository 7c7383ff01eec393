//! Shared loading routines used by the per-backend resolvers

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::metadata::Relation;
use super::traits::EagerLoad;
use crate::backends::Document;
use crate::database::DatabaseService;
use crate::error::OrmResult;

/// Lazily fetch the records related to one source record
pub async fn resolve_related(
    db: &Arc<DatabaseService>,
    source_connection: &str,
    source: &Document,
    relation: &Relation,
) -> OrmResult<Value> {
    let key = match source.get(relation.source_key()) {
        Some(value) if !value.is_null() => value.clone(),
        _ => return Ok(empty_relation(relation)),
    };

    let query = db
        .table_on(relation.connection_from(source_connection), &relation.related_table)
        .where_eq(relation.related_key(), key);

    if relation.is_collection() {
        let related = query.get().await?;
        Ok(Value::Array(related.into_iter().map(Value::Object).collect()))
    } else {
        Ok(query.first().await?.map(Value::Object).unwrap_or(Value::Null))
    }
}

/// Load one relationship for every parent with a single `IN` query and
/// embed the matches under the relationship name
pub async fn load_batched(
    db: &Arc<DatabaseService>,
    source_connection: &str,
    parents: &mut [Document],
    load: &EagerLoad,
) -> OrmResult<()> {
    let relation = &load.relation;

    let mut keys: Vec<Value> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for parent in parents.iter() {
        if let Some(key) = parent.get(relation.source_key()) {
            if let Some(canonical) = key_of(key) {
                if !seen.contains(&canonical) {
                    seen.push(canonical);
                    keys.push(key.clone());
                }
            }
        }
    }

    let mut grouped: HashMap<String, Vec<Document>> = HashMap::new();
    if !keys.is_empty() {
        debug!(
            relation = %load.name,
            table = %relation.related_table,
            keys = keys.len(),
            "batched eager load"
        );
        let related = db
            .table_on(relation.connection_from(source_connection), &relation.related_table)
            .where_in(relation.related_key(), keys)
            .get()
            .await?;
        for record in related {
            if let Some(key) = record.get(relation.related_key()).and_then(key_of) {
                grouped.entry(key).or_default().push(record);
            }
        }
    }

    for parent in parents.iter_mut() {
        let matches = parent
            .get(relation.source_key())
            .and_then(key_of)
            .and_then(|key| grouped.get(&key))
            .cloned()
            .unwrap_or_default();
        parent.insert(load.name.clone(), shape(relation, matches));
    }
    Ok(())
}

/// Fold a list of matches into the relationship's value shape
pub fn shape(relation: &Relation, mut matches: Vec<Document>) -> Value {
    if relation.is_collection() {
        Value::Array(matches.into_iter().map(Value::Object).collect())
    } else if matches.is_empty() {
        Value::Null
    } else {
        Value::Object(matches.swap_remove(0))
    }
}

pub fn empty_relation(relation: &Relation) -> Value {
    if relation.is_collection() {
        Value::Array(Vec::new())
    } else {
        Value::Null
    }
}

/// Canonical form of a key so that `1`, `1.0` and `"1"` group together
pub fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(i.to_string()),
            (None, Some(f)) if f.fract() == 0.0 => Some((f as i64).to_string()),
            _ => Some(n.to_string()),
        },
        other => Some(other.to_string()),
    }
}
