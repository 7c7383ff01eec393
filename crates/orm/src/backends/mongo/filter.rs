//! Translation of query expressions into MongoDB filter documents

use mongodb::bson::{self, doc, Bson, Document as BsonDocument, Regex};
use serde_json::Value;

use crate::error::OrmResult;
use crate::query::{OrderDirection, QueryOperator, WhereCondition};

/// The common `id` key lives in `_id` on the wire
pub fn storage_field(column: &str) -> &str {
    if column == "id" {
        "_id"
    } else {
        column
    }
}

/// Skip and limit counts as the server's signed integers
pub fn bounded(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

pub fn to_bson(value: &Value) -> OrmResult<Bson> {
    Ok(bson::to_bson(value)?)
}

fn to_bson_list(values: &[Value]) -> OrmResult<Bson> {
    let converted = values.iter().map(to_bson).collect::<OrmResult<Vec<_>>>()?;
    Ok(Bson::Array(converted))
}

/// Anchored regex equivalent of a `LIKE` pattern
pub fn like_pattern(pattern: &str) -> Regex {
    let mut translated = String::with_capacity(pattern.len() + 2);
    translated.push('^');
    for c in pattern.chars() {
        match c {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    Regex {
        pattern: translated,
        options: String::new(),
    }
}

fn operand(condition: &WhereCondition) -> OrmResult<Bson> {
    condition
        .value
        .as_ref()
        .map(to_bson)
        .unwrap_or(Ok(Bson::Null))
}

pub fn compile_condition(condition: &WhereCondition) -> OrmResult<BsonDocument> {
    let field = storage_field(&condition.column);
    let predicate = match condition.operator {
        QueryOperator::Equal => doc! { "$eq": operand(condition)? },
        // Negations never match a null or missing field
        QueryOperator::NotEqual => doc! { "$nin": [operand(condition)?, Bson::Null] },
        QueryOperator::GreaterThan => doc! { "$gt": operand(condition)? },
        QueryOperator::GreaterThanOrEqual => doc! { "$gte": operand(condition)? },
        QueryOperator::LessThan => doc! { "$lt": operand(condition)? },
        QueryOperator::LessThanOrEqual => doc! { "$lte": operand(condition)? },
        QueryOperator::Like | QueryOperator::NotLike => {
            let pattern = condition
                .value
                .as_ref()
                .and_then(Value::as_str)
                .unwrap_or_default();
            let regex = Bson::RegularExpression(like_pattern(pattern));
            if condition.operator == QueryOperator::Like {
                doc! { "$regex": regex }
            } else {
                doc! { "$ne": Bson::Null, "$not": regex }
            }
        }
        QueryOperator::In => doc! { "$in": to_bson_list(&condition.values)? },
        QueryOperator::NotIn => {
            let mut excluded = condition
                .values
                .iter()
                .map(to_bson)
                .collect::<OrmResult<Vec<_>>>()?;
            excluded.push(Bson::Null);
            doc! { "$nin": excluded }
        }
        // `null` matches both explicit nulls and missing fields
        QueryOperator::IsNull => doc! { "$eq": Bson::Null },
        QueryOperator::IsNotNull => doc! { "$ne": Bson::Null },
        QueryOperator::Between => {
            let low = condition.values.first().map(to_bson).unwrap_or(Ok(Bson::Null))?;
            let high = condition.values.get(1).map(to_bson).unwrap_or(Ok(Bson::Null))?;
            doc! { "$gte": low, "$lte": high }
        }
    };
    Ok(doc! { field: predicate })
}

/// Conjunction of every condition
pub fn compile_filter(conditions: &[WhereCondition]) -> OrmResult<BsonDocument> {
    match conditions {
        [] => Ok(BsonDocument::new()),
        [single] => compile_condition(single),
        many => {
            let clauses = many
                .iter()
                .map(|c| compile_condition(c).map(Bson::Document))
                .collect::<OrmResult<Vec<_>>>()?;
            Ok(doc! { "$and": clauses })
        }
    }
}

pub fn sort_document(order_by: &[(String, OrderDirection)]) -> BsonDocument {
    let mut sort = BsonDocument::new();
    for (column, direction) in order_by {
        let weight = match direction {
            OrderDirection::Asc => 1,
            OrderDirection::Desc => -1,
        };
        sort.insert(storage_field(column), weight);
    }
    sort
}
