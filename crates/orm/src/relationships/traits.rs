//! Relationship resolver contract

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::eager_loading;
use super::metadata::Relation;
use crate::backends::Document;
use crate::database::DatabaseService;
use crate::error::OrmResult;
use crate::query::QueryExpression;

/// How an eager load is completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EagerStrategy {
    /// Embedded by the backend during the parent fetch
    Lookup,
    /// One follow-up query per relationship, keyed with `IN`
    Batched,
    /// One follow-up query per parent record
    PerRecord,
}

/// An eager load attached to a query expression
#[derive(Debug, Clone, PartialEq)]
pub struct EagerLoad {
    pub name: String,
    pub relation: Relation,
    pub strategy: EagerStrategy,
}

/// Backend-specific fetching of related records. One resolver is bound to
/// each connection.
#[async_trait]
pub trait RelationshipResolver: Send + Sync {
    /// Connection the resolver belongs to
    fn connection(&self) -> &str;

    /// Strategy used for eager loads of `relation`
    fn strategy_for(&self, relation: &Relation) -> EagerStrategy;

    /// Fetch the records related to `source`: an array for to-many
    /// relationships, an object or null otherwise
    async fn resolve_data(
        &self,
        db: &Arc<DatabaseService>,
        source: &Document,
        relation: &Relation,
    ) -> OrmResult<Value> {
        eager_loading::resolve_related(db, self.connection(), source, relation).await
    }

    /// Register an eager load of `name` on a query expression
    fn attach_relationship(&self, expr: &mut QueryExpression, name: &str, relation: &Relation) {
        expr.with.retain(|load| load.name != name);
        expr.with.push(EagerLoad {
            name: name.to_string(),
            relation: relation.clone(),
            strategy: self.strategy_for(relation),
        });
    }

    /// Complete the eager loads the backend did not embed during the fetch
    async fn load_eager(
        &self,
        db: &Arc<DatabaseService>,
        parents: &mut [Document],
        loads: &[EagerLoad],
    ) -> OrmResult<()> {
        for load in loads {
            match load.strategy {
                EagerStrategy::Lookup => {}
                EagerStrategy::Batched => {
                    eager_loading::load_batched(db, self.connection(), parents, load).await?
                }
                EagerStrategy::PerRecord => {
                    for parent in parents.iter_mut() {
                        let value = self.resolve_data(db, parent, &load.relation).await?;
                        parent.insert(load.name.clone(), value);
                    }
                }
            }
        }
        Ok(())
    }
}
