//! Observer dispatch for model lifecycle events

use tracing::debug;

use super::{Model, ModelDefinition};
use crate::error::OrmResult;
use crate::events::LifecycleEvent;

impl<D: ModelDefinition> Model<D> {
    /// Run `event` on every observer bound to this model type
    pub async fn fire(&mut self, event: LifecycleEvent) -> OrmResult<()> {
        let Some(registry) = self.db.observers().registry_for::<Model<D>>() else {
            return Ok(());
        };
        debug!(table = D::table(), %event, observers = registry.observer_count(), "dispatching");
        registry.dispatch(event, self).await?;
        Ok(())
    }

    /// Run `attribute_changed` for every dirty attribute an observer watches
    pub(crate) async fn fire_attribute_changes(&mut self) -> OrmResult<()> {
        let Some(registry) = self.db.observers().registry_for::<Model<D>>() else {
            return Ok(());
        };
        let changed = self.dirty_attributes();
        if changed.is_empty() {
            return Ok(());
        }
        registry.dispatch_attribute_changes(self, &changed).await?;
        Ok(())
    }
}
