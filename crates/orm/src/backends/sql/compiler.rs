//! Compiles query expressions into parameterized SQL

use serde_json::Value;

use super::dialect::SqlDialect;
use crate::backends::Document;
use crate::query::{QueryExpression, QueryOperator, WhereCondition};

/// SQL text plus its bound parameters, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct SqlCompiler {
    dialect: SqlDialect,
}

impl SqlCompiler {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn select(&self, expr: &QueryExpression) -> CompiledQuery {
        let mut params = Vec::new();
        let mut sql = format!("SELECT * FROM {}", self.dialect.quote(&expr.table));
        sql.push_str(&self.where_clause(&expr.conditions, &mut params));

        if !expr.order_by.is_empty() {
            let keys: Vec<String> = expr
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", self.dialect.quote(column), direction))
                .collect();
            sql.push_str(&format!(" ORDER BY {}", keys.join(", ")));
        }

        // Engines read these as signed 64-bit integers
        let limit = expr.limit.map(|n| n.min(i64::MAX as u64));
        let offset = expr.offset.map(|n| n.min(i64::MAX as u64));
        match (limit, offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset))
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => match self.dialect.unbounded_limit() {
                Some(unbounded) => sql.push_str(&format!(" LIMIT {} OFFSET {}", unbounded, offset)),
                None => sql.push_str(&format!(" OFFSET {}", offset)),
            },
            (None, None) => {}
        }

        CompiledQuery { sql, params }
    }

    pub fn count(&self, expr: &QueryExpression) -> CompiledQuery {
        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT COUNT(*) AS aggregate FROM {}",
            self.dialect.quote(&expr.table)
        );
        sql.push_str(&self.where_clause(&expr.conditions, &mut params));
        CompiledQuery { sql, params }
    }

    /// INSERT for one row. Null values are left to the column default.
    pub fn insert(&self, table: &str, row: &Document) -> CompiledQuery {
        let mut params = Vec::new();
        let mut columns = Vec::new();
        let mut placeholders = Vec::new();
        for (column, value) in row {
            if value.is_null() {
                continue;
            }
            columns.push(self.dialect.quote(column));
            placeholders.push(self.bind(&mut params, value.clone()));
        }

        let sql = if columns.is_empty() {
            match self.dialect {
                SqlDialect::MySQL => format!("INSERT INTO {} () VALUES ()", self.dialect.quote(table)),
                _ => format!("INSERT INTO {} DEFAULT VALUES", self.dialect.quote(table)),
            }
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.dialect.quote(table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        CompiledQuery { sql, params }
    }

    pub fn update(&self, expr: &QueryExpression, changes: &Document) -> CompiledQuery {
        let mut params = Vec::new();
        let assignments: Vec<String> = changes
            .iter()
            .map(|(column, value)| {
                let placeholder = self.bind(&mut params, value.clone());
                format!("{} = {}", self.dialect.quote(column), placeholder)
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.dialect.quote(&expr.table),
            assignments.join(", ")
        );
        sql.push_str(&self.where_clause(&expr.conditions, &mut params));
        CompiledQuery { sql, params }
    }

    pub fn delete(&self, expr: &QueryExpression) -> CompiledQuery {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", self.dialect.quote(&expr.table));
        sql.push_str(&self.where_clause(&expr.conditions, &mut params));
        CompiledQuery { sql, params }
    }

    fn where_clause(&self, conditions: &[WhereCondition], params: &mut Vec<Value>) -> String {
        if conditions.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = conditions
            .iter()
            .map(|condition| self.condition(condition, params))
            .collect();
        format!(" WHERE {}", parts.join(" AND "))
    }

    fn condition(&self, condition: &WhereCondition, params: &mut Vec<Value>) -> String {
        let column = self.dialect.quote(&condition.column);
        match condition.operator {
            QueryOperator::IsNull | QueryOperator::IsNotNull => {
                format!("{} {}", column, condition.operator)
            }
            QueryOperator::In | QueryOperator::NotIn => {
                if condition.values.is_empty() {
                    // IN () is not valid SQL
                    return match condition.operator {
                        QueryOperator::In => "1 = 0".to_string(),
                        _ => "1 = 1".to_string(),
                    };
                }
                let placeholders: Vec<String> = condition
                    .values
                    .iter()
                    .map(|value| self.bind(params, value.clone()))
                    .collect();
                format!("{} {} ({})", column, condition.operator, placeholders.join(", "))
            }
            QueryOperator::Between => {
                let start = self.bind(params, condition.values.first().cloned().unwrap_or(Value::Null));
                let end = self.bind(params, condition.values.get(1).cloned().unwrap_or(Value::Null));
                format!("{} BETWEEN {} AND {}", column, start, end)
            }
            _ => {
                let placeholder =
                    self.bind(params, condition.value.clone().unwrap_or(Value::Null));
                format!("{} {} {}", column, condition.operator, placeholder)
            }
        }
    }

    fn bind(&self, params: &mut Vec<Value>, value: Value) -> String {
        let placeholder = self.dialect.parameter_placeholder(params.len());
        params.push(value);
        placeholder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::OrderDirection;
    use serde_json::json;

    fn users() -> QueryExpression {
        let mut expr = QueryExpression::new("users");
        expr.conditions
            .push(WhereCondition::new("age", QueryOperator::GreaterThan, json!(18)));
        expr.conditions.push(WhereCondition::list(
            "name",
            QueryOperator::In,
            vec![json!("John"), json!("Jane")],
        ));
        expr
    }

    #[test]
    fn test_select_with_numbered_placeholders() {
        let mut expr = users();
        expr.order_by.push(("name".to_string(), OrderDirection::Desc));
        expr.limit = Some(10);
        expr.offset = Some(20);

        let compiled = SqlCompiler::new(SqlDialect::PostgreSQL).select(&expr);
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"users\" WHERE \"age\" > $1 AND \"name\" IN ($2, $3) \
             ORDER BY \"name\" DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(compiled.params, vec![json!(18), json!("John"), json!("Jane")]);
    }

    #[test]
    fn test_offset_without_limit_on_sqlite() {
        let mut expr = QueryExpression::new("users");
        expr.offset = Some(5);
        let compiled = SqlCompiler::new(SqlDialect::SQLite).select(&expr);
        assert_eq!(compiled.sql, "SELECT * FROM \"users\" LIMIT -1 OFFSET 5");
    }

    #[test]
    fn test_paging_is_clamped_to_signed_range() {
        let mut expr = QueryExpression::new("users");
        expr.limit = Some(u64::MAX);
        expr.offset = Some(u64::MAX);
        let compiled = SqlCompiler::new(SqlDialect::SQLite).select(&expr);
        assert_eq!(
            compiled.sql,
            format!("SELECT * FROM \"users\" LIMIT {0} OFFSET {0}", i64::MAX)
        );
    }

    #[test]
    fn test_empty_in_list_matches_nothing() {
        let mut expr = QueryExpression::new("users");
        expr.conditions
            .push(WhereCondition::list("id", QueryOperator::In, Vec::new()));
        let compiled = SqlCompiler::new(SqlDialect::SQLite).count(&expr);
        assert_eq!(
            compiled.sql,
            "SELECT COUNT(*) AS aggregate FROM \"users\" WHERE 1 = 0"
        );
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_update_binds_changes_before_filters() {
        let mut expr = QueryExpression::new("users");
        expr.conditions
            .push(WhereCondition::new("id", QueryOperator::Equal, json!("u1")));
        let mut changes = Document::new();
        changes.insert("name".to_string(), json!("Jane"));

        let compiled = SqlCompiler::new(SqlDialect::PostgreSQL).update(&expr, &changes);
        assert_eq!(
            compiled.sql,
            "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" = $2"
        );
        assert_eq!(compiled.params, vec![json!("Jane"), json!("u1")]);
    }

    #[test]
    fn test_insert_skips_nulls_and_quotes_for_mysql() {
        let mut row = Document::new();
        row.insert("id".to_string(), json!("u1"));
        row.insert("nickname".to_string(), Value::Null);

        let compiled = SqlCompiler::new(SqlDialect::MySQL).insert("users", &row);
        assert_eq!(compiled.sql, "INSERT INTO `users` (`id`) VALUES (?)");
        assert_eq!(compiled.params, vec![json!("u1")]);
    }

    #[test]
    fn test_between_and_null_checks() {
        let mut expr = QueryExpression::new("users");
        expr.conditions.push(WhereCondition::list(
            "age",
            QueryOperator::Between,
            vec![json!(18), json!(30)],
        ));
        expr.conditions
            .push(WhereCondition::unary("deleted_at", QueryOperator::IsNull));

        let compiled = SqlCompiler::new(SqlDialect::SQLite).delete(&expr);
        assert_eq!(
            compiled.sql,
            "DELETE FROM \"users\" WHERE \"age\" BETWEEN ? AND ? AND \"deleted_at\" IS NULL"
        );
    }
}
