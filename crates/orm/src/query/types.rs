//! Query Builder Types - Core types and enums for query building

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::QueryError;

/// Query operator types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Between,
}

impl QueryOperator {
    /// Operators that compare against a list of values
    pub fn takes_list(&self) -> bool {
        matches!(
            self,
            QueryOperator::In | QueryOperator::NotIn | QueryOperator::Between
        )
    }

    /// Operators that take no value at all
    pub fn is_unary(&self) -> bool {
        matches!(self, QueryOperator::IsNull | QueryOperator::IsNotNull)
    }
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
            QueryOperator::Like => write!(f, "LIKE"),
            QueryOperator::NotLike => write!(f, "NOT LIKE"),
            QueryOperator::In => write!(f, "IN"),
            QueryOperator::NotIn => write!(f, "NOT IN"),
            QueryOperator::IsNull => write!(f, "IS NULL"),
            QueryOperator::IsNotNull => write!(f, "IS NOT NULL"),
            QueryOperator::Between => write!(f, "BETWEEN"),
        }
    }
}

impl FromStr for QueryOperator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        match normalized.as_str() {
            "=" | "==" => Ok(QueryOperator::Equal),
            "!=" | "<>" => Ok(QueryOperator::NotEqual),
            ">" => Ok(QueryOperator::GreaterThan),
            ">=" => Ok(QueryOperator::GreaterThanOrEqual),
            "<" => Ok(QueryOperator::LessThan),
            "<=" => Ok(QueryOperator::LessThanOrEqual),
            "like" => Ok(QueryOperator::Like),
            "not like" => Ok(QueryOperator::NotLike),
            "in" => Ok(QueryOperator::In),
            "not in" => Ok(QueryOperator::NotIn),
            "is null" => Ok(QueryOperator::IsNull),
            "is not null" => Ok(QueryOperator::IsNotNull),
            "between" => Ok(QueryOperator::Between),
            _ => Err(QueryError::InvalidOperator(s.to_string())),
        }
    }
}

/// Where clause condition
#[derive(Debug, Clone, PartialEq)]
pub struct WhereCondition {
    pub column: String,
    pub operator: QueryOperator,
    pub value: Option<Value>,
    pub values: Vec<Value>, // For IN, NOT IN, BETWEEN
}

impl WhereCondition {
    pub fn new(column: &str, operator: QueryOperator, value: Value) -> Self {
        Self {
            column: column.to_string(),
            operator,
            value: Some(value),
            values: Vec::new(),
        }
    }

    pub fn list(column: &str, operator: QueryOperator, values: Vec<Value>) -> Self {
        Self {
            column: column.to_string(),
            operator,
            value: None,
            values,
        }
    }

    pub fn unary(column: &str, operator: QueryOperator) -> Self {
        Self {
            column: column.to_string(),
            operator,
            value: None,
            values: Vec::new(),
        }
    }

    /// Build a condition from an operator and a single value, spreading
    /// arrays into the value list for list operators
    pub fn from_value(column: &str, operator: QueryOperator, value: Value) -> Self {
        if operator.is_unary() {
            return Self::unary(column, operator);
        }
        if operator.takes_list() {
            return match value {
                Value::Array(values) => Self::list(column, operator, values),
                other => Self::new(column, operator, other),
            };
        }
        Self::new(column, operator, value)
    }

    /// Check that the condition carries the operands its operator needs
    pub fn validate(&self) -> Result<(), QueryError> {
        crate::security::validate_identifier(&self.column)?;

        let invalid = |reason: &str| QueryError::InvalidPredicate {
            column: self.column.clone(),
            reason: reason.to_string(),
        };

        match self.operator {
            QueryOperator::IsNull | QueryOperator::IsNotNull => Ok(()),
            QueryOperator::In | QueryOperator::NotIn => {
                if self.value.is_some() {
                    Err(invalid("expects a list of values"))
                } else {
                    Ok(())
                }
            }
            QueryOperator::Between => {
                if self.values.len() != 2 {
                    Err(invalid("BETWEEN expects exactly two bounds"))
                } else {
                    Ok(())
                }
            }
            QueryOperator::Like | QueryOperator::NotLike => match &self.value {
                Some(Value::String(_)) => Ok(()),
                _ => Err(invalid("LIKE expects a string pattern")),
            },
            _ => match &self.value {
                None | Some(Value::Null) => Err(invalid("comparison against null; use where_null")),
                Some(Value::Array(_)) | Some(Value::Object(_)) => {
                    Err(invalid("comparison value must be a scalar"))
                }
                Some(_) => Ok(()),
            },
        }
    }
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}
