//! Predicate evaluation over in-process documents

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

use crate::backends::Document;
use crate::error::QueryError;
use crate::query::{OrderDirection, QueryExpression, QueryOperator, WhereCondition};

/// Read a possibly dotted field path
pub fn field<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Total order used for sorting: missing and null first, then booleans,
/// numbers and strings
pub fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Equality with `1 == 1.0`
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between values of comparable types only
fn ordered(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_))
        | (Value::String(_), Value::String(_))
        | (Value::Bool(_), Value::Bool(_)) => Some(compare(Some(a), Some(b))),
        _ => None,
    }
}

/// Translate a `LIKE` pattern into an anchored regex
pub fn like_regex(pattern: &str) -> Result<Regex, QueryError> {
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
    Regex::new(&translated).map_err(|e| QueryError::Backend(e.to_string()))
}

fn matches_like(value: Option<&Value>, pattern: Option<&Value>) -> Result<bool, QueryError> {
    match (value, pattern) {
        (Some(Value::String(text)), Some(Value::String(pattern))) => {
            Ok(like_regex(pattern)?.is_match(text))
        }
        _ => Ok(false),
    }
}

pub fn matches_condition(document: &Document, condition: &WhereCondition) -> Result<bool, QueryError> {
    let value = field(document, &condition.column).filter(|v| !v.is_null());
    let operand = condition.value.as_ref();

    let compared = |accept: fn(Ordering) -> bool| match (value, operand) {
        (Some(v), Some(o)) => ordered(v, o).map(accept).unwrap_or(false),
        _ => false,
    };

    let matched = match condition.operator {
        QueryOperator::Equal => match (value, operand) {
            (Some(v), Some(o)) => values_equal(v, o),
            _ => false,
        },
        QueryOperator::NotEqual => match (value, operand) {
            (Some(v), Some(o)) => !values_equal(v, o),
            _ => false,
        },
        QueryOperator::GreaterThan => compared(|o| o == Ordering::Greater),
        QueryOperator::GreaterThanOrEqual => compared(|o| o != Ordering::Less),
        QueryOperator::LessThan => compared(|o| o == Ordering::Less),
        QueryOperator::LessThanOrEqual => compared(|o| o != Ordering::Greater),
        QueryOperator::Like => matches_like(value, operand)?,
        QueryOperator::NotLike => value.is_some() && !matches_like(value, operand)?,
        QueryOperator::In => value
            .map(|v| condition.values.iter().any(|candidate| values_equal(v, candidate)))
            .unwrap_or(false),
        QueryOperator::NotIn => value
            .map(|v| !condition.values.iter().any(|candidate| values_equal(v, candidate)))
            .unwrap_or(false),
        QueryOperator::IsNull => value.is_none(),
        QueryOperator::IsNotNull => value.is_some(),
        QueryOperator::Between => match (value, condition.values.first(), condition.values.get(1)) {
            (Some(v), Some(low), Some(high)) => {
                matches!(ordered(v, low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(ordered(v, high), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        },
    };
    Ok(matched)
}

/// Every condition must hold
pub fn matches(document: &Document, conditions: &[WhereCondition]) -> Result<bool, QueryError> {
    for condition in conditions {
        if !matches_condition(document, condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Sort, skip and truncate a filtered result set
pub fn arrange(mut documents: Vec<Document>, expr: &QueryExpression) -> Vec<Document> {
    if !expr.order_by.is_empty() {
        documents.sort_by(|a, b| {
            for (column, direction) in &expr.order_by {
                let ordering = compare(field(a, column), field(b, column));
                let ordering = match direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    let offset = expr.offset.unwrap_or(0) as usize;
    let limit = expr.limit.map(|l| l as usize).unwrap_or(usize::MAX);
    documents.into_iter().skip(offset).take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_comparisons_and_lists() {
        let user = doc(json!({"name": "John", "age": 30, "profile": {"city": "Oslo"}}));

        let gt = WhereCondition::new("age", QueryOperator::GreaterThan, json!(29.5));
        assert!(matches_condition(&user, &gt).unwrap());

        let nested = WhereCondition::new("profile.city", QueryOperator::Equal, json!("Oslo"));
        assert!(matches_condition(&user, &nested).unwrap());

        let within = WhereCondition::list("age", QueryOperator::In, vec![json!(30), json!(40)]);
        assert!(matches_condition(&user, &within).unwrap());

        let between = WhereCondition::list("age", QueryOperator::Between, vec![json!(18), json!(30)]);
        assert!(matches_condition(&user, &between).unwrap());

        let mismatched = WhereCondition::new("age", QueryOperator::LessThan, json!("40"));
        assert!(!matches_condition(&user, &mismatched).unwrap());
    }

    #[test]
    fn test_like_and_null_handling() {
        let user = doc(json!({"name": "Jane", "email": null}));

        assert!(matches_condition(&user, &WhereCondition::new("name", QueryOperator::Like, json!("J_n%"))).unwrap());
        assert!(!matches_condition(&user, &WhereCondition::new("name", QueryOperator::Like, json!("j%"))).unwrap());
        assert!(matches_condition(&user, &WhereCondition::unary("email", QueryOperator::IsNull)).unwrap());
        assert!(matches_condition(&user, &WhereCondition::unary("missing", QueryOperator::IsNull)).unwrap());
    }

    #[test]
    fn test_negations_skip_missing_and_null_fields() {
        let user = doc(json!({"name": "Tim", "email": null}));

        assert!(!matches_condition(&user, &WhereCondition::new("missing", QueryOperator::NotEqual, json!(1))).unwrap());
        assert!(!matches_condition(&user, &WhereCondition::new("email", QueryOperator::NotEqual, json!("a@b.c"))).unwrap());
        assert!(!matches_condition(&user, &WhereCondition::list("email", QueryOperator::NotIn, vec![json!("a@b.c")])).unwrap());
        assert!(!matches_condition(&user, &WhereCondition::new("email", QueryOperator::NotLike, json!("%@b.c"))).unwrap());
        assert!(matches_condition(&user, &WhereCondition::new("name", QueryOperator::NotEqual, json!("Jane"))).unwrap());
    }

    #[test]
    fn test_like_escapes_regex_metacharacters() {
        let regex = like_regex("a.b%").unwrap();
        assert!(regex.is_match("a.bc"));
        assert!(!regex.is_match("axbc"));
    }

    #[test]
    fn test_arrange_sorts_nulls_first_and_pages() {
        let documents = vec![
            doc(json!({"n": 3})),
            doc(json!({"n": null})),
            doc(json!({"n": 1})),
            doc(json!({"n": 2})),
        ];
        let mut expr = QueryExpression::new("t");
        expr.order_by.push(("n".to_string(), OrderDirection::Asc));
        expr.offset = Some(1);
        expr.limit = Some(2);

        let arranged = arrange(documents, &expr);
        let values: Vec<&Value> = arranged.iter().map(|d| &d["n"]).collect();
        assert_eq!(values, vec![&json!(1), &json!(2)]);
    }
}
