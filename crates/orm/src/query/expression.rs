//! Query expressions
//!
//! A [`QueryExpression`] is the backend-agnostic description a builder
//! accumulates. It is a plain value: cloning it yields an independent copy,
//! and adapters compile it to native operations only when executing.

use serde_json::Value;

use super::types::{OrderDirection, WhereCondition};
use crate::error::QueryError;
use crate::relationships::EagerLoad;
use crate::security::validate_identifier;

/// Backend-native statement passed through untouched
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatement {
    pub statement: String,
    pub bindings: Vec<Value>,
}

impl RawStatement {
    pub fn new(statement: impl Into<String>, bindings: Vec<Value>) -> Self {
        Self {
            statement: statement.into(),
            bindings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryExpression {
    pub table: String,
    /// Conjunctive predicates in insertion order
    pub conditions: Vec<WhereCondition>,
    pub order_by: Vec<(String, OrderDirection)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub with: Vec<EagerLoad>,
}

impl QueryExpression {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Default::default()
        }
    }

    pub fn is_filtered(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// The same filters without sorting, paging or eager loads
    pub fn count_variant(&self) -> Self {
        Self {
            table: self.table.clone(),
            conditions: self.conditions.clone(),
            ..Default::default()
        }
    }

    /// Check identifiers and predicate operands before anything reaches a
    /// backend
    pub fn validate(&self) -> Result<(), QueryError> {
        validate_identifier(&self.table)?;
        for condition in &self.conditions {
            condition.validate()?;
        }
        for (column, _) in &self.order_by {
            validate_identifier(column)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryOperator;
    use serde_json::json;

    #[test]
    fn test_clone_is_independent() {
        let mut base = QueryExpression::new("users");
        base.conditions
            .push(WhereCondition::new("age", QueryOperator::GreaterThan, json!(20)));

        let mut fork = base.clone();
        fork.conditions
            .push(WhereCondition::new("name", QueryOperator::Equal, json!("John")));
        fork.limit = Some(5);

        assert_eq!(base.conditions.len(), 1);
        assert_eq!(base.limit, None);
        assert_eq!(fork.conditions.len(), 2);
    }

    #[test]
    fn test_count_variant_drops_paging() {
        let mut expr = QueryExpression::new("users");
        expr.conditions
            .push(WhereCondition::new("age", QueryOperator::Equal, json!(1)));
        expr.order_by.push(("name".to_string(), OrderDirection::Desc));
        expr.limit = Some(10);
        expr.offset = Some(20);

        let count = expr.count_variant();
        assert_eq!(count.conditions, expr.conditions);
        assert!(count.order_by.is_empty());
        assert_eq!(count.limit, None);
        assert_eq!(count.offset, None);
    }

    #[test]
    fn test_validate_checks_table_and_sort_columns() {
        assert!(QueryExpression::new("users;").validate().is_err());

        let mut expr = QueryExpression::new("users");
        expr.order_by.push(("name desc".to_string(), OrderDirection::Asc));
        assert!(expr.validate().is_err());
    }
}
