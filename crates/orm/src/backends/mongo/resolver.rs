use crate::relationships::{EagerStrategy, Relation, RelationshipResolver};

/// Relationships within one database embed through `$lookup`; anything that
/// crosses connections falls back to batched follow-up queries
pub struct MongoResolver {
    connection: String,
}

impl MongoResolver {
    pub fn new(connection: &str) -> Self {
        Self {
            connection: connection.to_string(),
        }
    }
}

impl RelationshipResolver for MongoResolver {
    fn connection(&self) -> &str {
        &self.connection
    }

    fn strategy_for(&self, relation: &Relation) -> EagerStrategy {
        if relation.is_local_to(&self.connection) {
            EagerStrategy::Lookup
        } else {
            EagerStrategy::Batched
        }
    }
}
