use crate::relationships::{EagerStrategy, Relation, RelationshipResolver};

/// The in-process store has no join primitive; related records are fetched
/// per parent
pub struct MemoryResolver {
    connection: String,
}

impl MemoryResolver {
    pub fn new(connection: &str) -> Self {
        Self {
            connection: connection.to_string(),
        }
    }
}

impl RelationshipResolver for MemoryResolver {
    fn connection(&self) -> &str {
        &self.connection
    }

    fn strategy_for(&self, _relation: &Relation) -> EagerStrategy {
        EagerStrategy::PerRecord
    }
}
