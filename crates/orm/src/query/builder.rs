//! Query Builder - Core builder implementation

use std::sync::Arc;

use super::expression::QueryExpression;
use super::types::WhereCondition;
use crate::database::DatabaseService;
use crate::error::QueryError;

/// Fluent, clonable query composition bound to a registry and a connection
/// name. Cloning forks the underlying expression; the clone and the original
/// evolve independently.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub(crate) db: Arc<DatabaseService>,
    pub(crate) connection: Option<String>,
    pub(crate) expr: QueryExpression,
    pub(crate) primary_key: String,
    pub(crate) unfiltered: bool,
    pub(crate) deferred_error: Option<QueryError>,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new(db: Arc<DatabaseService>, connection: Option<String>, table: &str) -> Self {
        Self {
            db,
            connection,
            expr: QueryExpression::new(table),
            primary_key: "id".to_string(),
            unfiltered: false,
            deferred_error: None,
        }
    }

    /// Run against another connection
    pub fn on_connection(mut self, connection: &str) -> Self {
        self.connection = Some(connection.to_string());
        self
    }

    /// Key used by `find` and by identifier generation on insert
    pub fn primary_key(mut self, key: &str) -> Self {
        self.primary_key = key.to_string();
        self
    }

    /// Allow `update` / `delete` without any predicate
    pub fn unfiltered(mut self) -> Self {
        self.unfiltered = true;
        self
    }

    pub fn expression(&self) -> &QueryExpression {
        &self.expr
    }

    pub fn table_name(&self) -> &str {
        &self.expr.table
    }

    /// Connection name this builder resolves to
    pub fn connection_name(&self) -> &str {
        self.connection
            .as_deref()
            .unwrap_or_else(|| self.db.default_connection())
    }

    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    pub(crate) fn push_condition(mut self, condition: WhereCondition) -> Self {
        self.expr.conditions.push(condition);
        self
    }

    /// Record an error to surface at execution time; the first one wins
    pub(crate) fn defer(mut self, error: QueryError) -> Self {
        if self.deferred_error.is_none() {
            self.deferred_error = Some(error);
        }
        self
    }

    pub(crate) fn check(&self) -> Result<(), QueryError> {
        if let Some(error) = &self.deferred_error {
            return Err(error.clone());
        }
        self.expr.validate()
    }

    pub(crate) fn check_mutation(&self, operation: &str) -> Result<(), QueryError> {
        self.check()?;
        if !self.expr.is_filtered() && !self.unfiltered {
            return Err(QueryError::UnfilteredMutation {
                operation: operation.to_string(),
                table: self.expr.table.clone(),
            });
        }
        Ok(())
    }
}
