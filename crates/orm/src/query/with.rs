//! Query Builder eager loading

use super::builder::QueryBuilder;
use crate::relationships::Relation;

impl QueryBuilder {
    /// Eagerly load `relation` under `name`. The connection's resolver picks
    /// the loading strategy.
    pub fn with_relation(mut self, name: &str, relation: Relation) -> Self {
        match self.db.adapter(self.connection.as_deref()) {
            Ok(adapter) => {
                adapter
                    .resolver()
                    .attach_relationship(&mut self.expr, name, &relation);
                self
            }
            Err(error) => self.defer(crate::error::QueryError::Backend(error.to_string())),
        }
    }

    /// Names of the eager loads attached so far
    pub fn eager_loads(&self) -> Vec<&str> {
        self.expr.with.iter().map(|load| load.name.as_str()).collect()
    }
}
