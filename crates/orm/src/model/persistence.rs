//! Saving, deleting and reloading model records

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use super::{Model, ModelDefinition};
use crate::error::{OrmError, OrmResult};
use crate::events::LifecycleEvent;
use crate::query::QueryBuilder;

impl<D: ModelDefinition> Model<D> {
    fn builder(&self) -> QueryBuilder {
        QueryBuilder::new(
            self.db.clone(),
            D::connection().map(str::to_string),
            D::table(),
        )
        .primary_key(D::primary_key())
    }

    fn key(&self) -> OrmResult<Value> {
        match self.id() {
            Some(id) if !id.is_null() => Ok(id.clone()),
            _ => Err(OrmError::UnidentifiableDocument {
                table: D::table().to_string(),
                reason: format!("missing primary key '{}'", D::primary_key()),
            }),
        }
    }

    /// Insert a new record or update the dirty attributes of an existing
    /// one. Observer hooks run around persistence; an error from any of them
    /// aborts the save.
    pub async fn save(&mut self) -> OrmResult<()> {
        self.fire(LifecycleEvent::Saving).await?;
        if self.exists {
            self.fire(LifecycleEvent::Updating).await?;
            self.fire_attribute_changes().await?;
            self.perform_update().await?;
            self.fire(LifecycleEvent::Updated).await?;
        } else {
            self.fire(LifecycleEvent::Creating).await?;
            self.fire_attribute_changes().await?;
            self.perform_insert().await?;
            self.fire(LifecycleEvent::Created).await?;
        }
        self.fire(LifecycleEvent::Saved).await?;
        Ok(())
    }

    async fn perform_insert(&mut self) -> OrmResult<()> {
        if D::timestamps() {
            let now = Value::String(Utc::now().to_rfc3339());
            if self.attributes.get("created_at").map_or(true, Value::is_null) {
                self.set_attribute("created_at", now.clone());
            }
            self.set_attribute("updated_at", now);
        }

        let row = self.cast_to_storage(self.attributes.iter())?;
        let stored = self.builder().insert_one(row).await?;
        if let Some(id) = stored.get(D::primary_key()) {
            self.attributes
                .insert(D::primary_key().to_string(), id.clone());
        }

        self.exists = true;
        self.sync_original();
        debug!(table = D::table(), "model created");
        Ok(())
    }

    async fn perform_update(&mut self) -> OrmResult<()> {
        if !self.is_dirty() {
            return Ok(());
        }
        if D::timestamps() {
            self.set_attribute("updated_at", Value::String(Utc::now().to_rfc3339()));
        }

        let key = self.key()?;
        let changes = self.cast_to_storage(
            self.attributes
                .iter()
                .filter(|(name, _)| self.dirty.contains(name.as_str())),
        )?;
        self.builder()
            .where_eq(D::primary_key(), key)
            .update(changes)
            .await?;

        self.sync_original();
        debug!(table = D::table(), "model updated");
        Ok(())
    }

    /// Delete the record. Returns `false` for a model that was never saved.
    pub async fn delete(&mut self) -> OrmResult<bool> {
        if !self.exists {
            return Ok(false);
        }
        self.fire(LifecycleEvent::Deleting).await?;
        let key = self.key()?;
        self.builder()
            .where_eq(D::primary_key(), key)
            .delete()
            .await?;
        self.exists = false;
        self.fire(LifecycleEvent::Deleted).await?;
        Ok(true)
    }

    /// Reload attributes from storage, discarding unsaved changes and
    /// cached relations
    pub async fn refresh(&mut self) -> OrmResult<()> {
        let key = self.key()?;
        let document = self.builder().find_or_fail(key).await?;
        self.attributes = self.cast_from_storage(document)?;
        self.sync_original();
        self.relations.clear();
        self.exists = true;
        Ok(())
    }
}
