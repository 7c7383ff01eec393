use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::event_error::EventError;
use crate::events::{LifecycleEvent, ModelObserver};

/// Observers registered for one model type
pub struct ObserverRegistry<T: Send + Sync> {
    observers: Vec<Arc<dyn ModelObserver<T>>>,
}

impl<T: Send + Sync> ObserverRegistry<T> {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Run one lifecycle hook on every observer, stopping at the first error
    pub async fn dispatch(&self, event: LifecycleEvent, model: &mut T) -> Result<(), EventError> {
        for observer in &self.observers {
            match event {
                LifecycleEvent::Saving => observer.saving(model).await?,
                LifecycleEvent::Creating => observer.creating(model).await?,
                LifecycleEvent::Created => observer.created(model).await?,
                LifecycleEvent::Updating => observer.updating(model).await?,
                LifecycleEvent::Updated => observer.updated(model).await?,
                LifecycleEvent::Saved => observer.saved(model).await?,
                LifecycleEvent::Deleting => observer.deleting(model).await?,
                LifecycleEvent::Deleted => observer.deleted(model).await?,
            }
        }
        Ok(())
    }

    /// Run attribute hooks for every changed attribute an observer watches
    pub async fn dispatch_attribute_changes(
        &self,
        model: &mut T,
        changed: &[String],
    ) -> Result<(), EventError> {
        for observer in &self.observers {
            for attribute in changed {
                if observer.watches().iter().any(|watched| *watched == attribute.as_str()) {
                    observer.attribute_changed(model, attribute).await?;
                }
            }
        }
        Ok(())
    }
}

impl<T: Send + Sync> Default for ObserverRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync> Clone for ObserverRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            observers: self.observers.clone(),
        }
    }
}

/// Per-type observer registries, keyed by the observed type
pub struct ObserverManager {
    model_observers: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ObserverManager {
    pub fn new() -> Self {
        Self {
            model_observers: DashMap::new(),
        }
    }

    pub fn register_for_model<T: Send + Sync + 'static>(&self, observer: Arc<dyn ModelObserver<T>>) {
        let type_id = TypeId::of::<T>();

        let mut registry = self
            .registry_for::<T>()
            .map(|existing| (*existing).clone())
            .unwrap_or_default();
        registry.observers.push(observer);

        debug!(
            model = std::any::type_name::<T>(),
            observers = registry.observer_count(),
            "observer registered"
        );
        self.model_observers.insert(type_id, Arc::new(registry));
    }

    /// Snapshot of the observers for `T`; later registrations do not affect it
    pub fn registry_for<T: Send + Sync + 'static>(&self) -> Option<Arc<ObserverRegistry<T>>> {
        let entry = self.model_observers.get(&TypeId::of::<T>())?;
        let erased = Arc::clone(entry.value());
        drop(entry);
        erased.downcast::<ObserverRegistry<T>>().ok()
    }

    pub fn has_observers<T: Send + Sync + 'static>(&self) -> bool {
        self.registry_for::<T>()
            .map(|registry| registry.observer_count() > 0)
            .unwrap_or(false)
    }

    pub fn clear_for_model<T: Send + Sync + 'static>(&self) {
        self.model_observers.remove(&TypeId::of::<T>());
    }
}

impl Default for ObserverManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Account {
        name: String,
        email: String,
    }

    struct Recorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ModelObserver<Account> for Recorder {
        async fn creating(&self, model: &mut Account) -> Result<(), EventError> {
            self.events.lock().unwrap().push(format!("creating: {}", model.name));
            model.name = model.name.to_uppercase();
            Ok(())
        }

        async fn deleting(&self, _model: &Account) -> Result<(), EventError> {
            Err(EventError::propagation_stopped("accounts are never deleted"))
        }

        fn watches(&self) -> &[&'static str] {
            &["email"]
        }

        async fn attribute_changed(
            &self,
            model: &mut Account,
            attribute: &str,
        ) -> Result<(), EventError> {
            self.events.lock().unwrap().push(format!("changed: {}", attribute));
            model.email = model.email.to_lowercase();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_runs_hooks_and_mutates() {
        let manager = ObserverManager::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        manager.register_for_model::<Account>(Arc::new(Recorder {
            events: events.clone(),
        }));

        let registry = manager.registry_for::<Account>().unwrap();
        let mut account = Account {
            name: "john".to_string(),
            email: "John@Example.com".to_string(),
        };

        registry
            .dispatch(LifecycleEvent::Creating, &mut account)
            .await
            .unwrap();
        registry
            .dispatch_attribute_changes(&mut account, &["name".to_string(), "email".to_string()])
            .await
            .unwrap();

        assert_eq!(account.name, "JOHN");
        assert_eq!(account.email, "john@example.com");
        assert_eq!(
            *events.lock().unwrap(),
            vec!["creating: john".to_string(), "changed: email".to_string()]
        );
    }

    #[tokio::test]
    async fn test_hook_error_stops_dispatch() {
        let manager = ObserverManager::new();
        manager.register_for_model::<Account>(Arc::new(Recorder {
            events: Arc::new(Mutex::new(Vec::new())),
        }));

        let registry = manager.registry_for::<Account>().unwrap();
        let result = registry
            .dispatch(LifecycleEvent::Deleting, &mut Account::default())
            .await;
        assert!(matches!(result, Err(EventError::PropagationStopped { .. })));
    }

    #[test]
    fn test_registries_are_per_type() {
        let manager = ObserverManager::new();
        manager.register_for_model::<Account>(Arc::new(Recorder {
            events: Arc::new(Mutex::new(Vec::new())),
        }));

        assert!(manager.has_observers::<Account>());
        assert!(!manager.has_observers::<String>());
        manager.clear_for_model::<Account>();
        assert!(!manager.has_observers::<Account>());
    }
}
