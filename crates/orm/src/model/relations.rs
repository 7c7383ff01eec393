//! Lazy relationship access on model instances

use serde_json::Value;
use tracing::debug;

use super::{Model, ModelDefinition};
use crate::error::{OrmError, OrmResult};

impl<D: ModelDefinition> Model<D> {
    /// Related records of a to-many relationship, loaded on first access
    pub async fn related_many<R: ModelDefinition>(&mut self, name: &str) -> OrmResult<Vec<Model<R>>> {
        match self.load_relation(name).await? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.related_model::<R>(name, item))
                .collect(),
            Value::Null => Ok(Vec::new()),
            _ => Err(OrmError::Relationship(format!(
                "'{}' on '{}' is not a to-many relationship",
                name,
                D::table()
            ))),
        }
    }

    /// Related record of a to-one relationship, loaded on first access
    pub async fn related_one<R: ModelDefinition>(&mut self, name: &str) -> OrmResult<Option<Model<R>>> {
        match self.load_relation(name).await? {
            Value::Null => Ok(None),
            Value::Array(mut items) => {
                if items.is_empty() {
                    Ok(None)
                } else {
                    self.related_model::<R>(name, items.swap_remove(0)).map(Some)
                }
            }
            item => self.related_model::<R>(name, item).map(Some),
        }
    }

    pub fn relation_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Raw value of a loaded relation
    pub fn loaded_relation(&self, name: &str) -> Option<&Value> {
        self.relations.get(name)
    }

    pub(crate) fn set_relation(&mut self, name: &str, value: Value) {
        self.relations.insert(name.to_string(), value);
    }

    pub fn forget_relation(&mut self, name: &str) {
        self.relations.remove(name);
    }

    async fn load_relation(&mut self, name: &str) -> OrmResult<Value> {
        if let Some(cached) = self.relations.get(name) {
            return Ok(cached.clone());
        }

        let relation = D::relation(name)
            .ok_or_else(|| {
                OrmError::Relationship(format!(
                    "'{}' has no relationship named '{}'",
                    D::table(),
                    name
                ))
            })?
            .for_source::<D>();
        let resolver = self.db.adapter(Some(self.connection_name()))?.resolver();
        debug!(table = D::table(), relation = name, "lazy load");
        let value = resolver
            .resolve_data(&self.db, &self.attributes, &relation)
            .await?;

        self.relations.insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn related_model<R: ModelDefinition>(&self, name: &str, item: Value) -> OrmResult<Model<R>> {
        match item {
            Value::Object(document) => Model::<R>::hydrate(&self.db, document),
            other => Err(OrmError::Relationship(format!(
                "relation '{}' produced a non-record value: {}",
                name, other
            ))),
        }
    }
}
