//! Query Builder WHERE clause operations

use serde_json::Value;

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(WhereCondition::new(column, QueryOperator::Equal, value.into()))
    }

    /// Add WHERE condition with not equal
    pub fn where_ne<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(WhereCondition::new(column, QueryOperator::NotEqual, value.into()))
    }

    /// Add WHERE condition with greater than
    pub fn where_gt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(WhereCondition::new(column, QueryOperator::GreaterThan, value.into()))
    }

    /// Add WHERE condition with greater than or equal
    pub fn where_gte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(WhereCondition::new(
            column,
            QueryOperator::GreaterThanOrEqual,
            value.into(),
        ))
    }

    /// Add WHERE condition with less than
    pub fn where_lt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(WhereCondition::new(column, QueryOperator::LessThan, value.into()))
    }

    /// Add WHERE condition with less than or equal
    pub fn where_lte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(WhereCondition::new(
            column,
            QueryOperator::LessThanOrEqual,
            value.into(),
        ))
    }

    /// Add a WHERE condition from an operator string such as `">="` or
    /// `"not in"`. Unknown operators surface when the query executes.
    pub fn where_op<T: Into<Value>>(self, column: &str, operator: &str, value: T) -> Self {
        match operator.parse::<QueryOperator>() {
            Ok(op) => self.push_condition(WhereCondition::from_value(column, op, value.into())),
            Err(error) => self.defer(error),
        }
    }

    /// Add WHERE condition with LIKE
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.push_condition(WhereCondition::new(
            column,
            QueryOperator::Like,
            Value::String(pattern.to_string()),
        ))
    }

    /// Add WHERE condition with NOT LIKE
    pub fn where_not_like(self, column: &str, pattern: &str) -> Self {
        self.push_condition(WhereCondition::new(
            column,
            QueryOperator::NotLike,
            Value::String(pattern.to_string()),
        ))
    }

    /// Add WHERE IN condition; an empty list matches nothing
    pub fn where_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.push_condition(WhereCondition::list(
            column,
            QueryOperator::In,
            values.into_iter().map(Into::into).collect(),
        ))
    }

    /// Add WHERE NOT IN condition; an empty list matches everything
    pub fn where_not_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.push_condition(WhereCondition::list(
            column,
            QueryOperator::NotIn,
            values.into_iter().map(Into::into).collect(),
        ))
    }

    /// Add WHERE BETWEEN condition (inclusive bounds)
    pub fn where_between<T: Into<Value>>(self, column: &str, start: T, end: T) -> Self {
        self.push_condition(WhereCondition::list(
            column,
            QueryOperator::Between,
            vec![start.into(), end.into()],
        ))
    }

    /// Add WHERE condition with IS NULL
    pub fn where_null(self, column: &str) -> Self {
        self.push_condition(WhereCondition::unary(column, QueryOperator::IsNull))
    }

    /// Add WHERE condition with IS NOT NULL
    pub fn where_not_null(self, column: &str) -> Self {
        self.push_condition(WhereCondition::unary(column, QueryOperator::IsNotNull))
    }
}
