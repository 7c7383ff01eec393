use crate::relationships::{EagerStrategy, Relation, RelationshipResolver};

/// Relational connections complete eager loads with one `IN` query per
/// relationship
pub struct SqlRelationshipResolver {
    connection: String,
}

impl SqlRelationshipResolver {
    pub fn new(connection: &str) -> Self {
        Self {
            connection: connection.to_string(),
        }
    }
}

impl RelationshipResolver for SqlRelationshipResolver {
    fn connection(&self) -> &str {
        &self.connection
    }

    fn strategy_for(&self, _relation: &Relation) -> EagerStrategy {
        EagerStrategy::Batched
    }
}
