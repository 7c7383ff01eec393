//! Model lifecycle events and the observer contract

use std::fmt;

use async_trait::async_trait;

use crate::event_error::EventError;

/// Lifecycle points at which observers run, in the order a save fires them:
/// `Saving`, then `Creating` or `Updating`, persistence, then `Created` or
/// `Updated`, then `Saved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Saving,
    Creating,
    Created,
    Updating,
    Updated,
    Saved,
    Deleting,
    Deleted,
}

impl LifecycleEvent {
    /// Events fired before persistence; observers may still mutate the model
    pub fn is_before(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::Saving
                | LifecycleEvent::Creating
                | LifecycleEvent::Updating
                | LifecycleEvent::Deleting
        )
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleEvent::Saving => "saving",
            LifecycleEvent::Creating => "creating",
            LifecycleEvent::Created => "created",
            LifecycleEvent::Updating => "updating",
            LifecycleEvent::Updated => "updated",
            LifecycleEvent::Saved => "saved",
            LifecycleEvent::Deleting => "deleting",
            LifecycleEvent::Deleted => "deleted",
        };
        write!(f, "{}", name)
    }
}

/// Hooks run around persistence. Every hook defaults to a no-op; returning
/// an error from any of them aborts the operation.
#[async_trait]
pub trait ModelObserver<T: Send + Sync>: Send + Sync {
    async fn saving(&self, _model: &mut T) -> Result<(), EventError> {
        Ok(())
    }

    async fn creating(&self, _model: &mut T) -> Result<(), EventError> {
        Ok(())
    }

    async fn created(&self, _model: &T) -> Result<(), EventError> {
        Ok(())
    }

    async fn updating(&self, _model: &mut T) -> Result<(), EventError> {
        Ok(())
    }

    async fn updated(&self, _model: &T) -> Result<(), EventError> {
        Ok(())
    }

    async fn saved(&self, _model: &T) -> Result<(), EventError> {
        Ok(())
    }

    async fn deleting(&self, _model: &T) -> Result<(), EventError> {
        Ok(())
    }

    async fn deleted(&self, _model: &T) -> Result<(), EventError> {
        Ok(())
    }

    /// Attributes whose changes trigger [`ModelObserver::attribute_changed`]
    fn watches(&self) -> &[&'static str] {
        &[]
    }

    /// Runs before persistence for each watched attribute that is dirty
    async fn attribute_changed(&self, _model: &mut T, _attribute: &str) -> Result<(), EventError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_before_events() {
        assert!(LifecycleEvent::Creating.is_before());
        assert!(LifecycleEvent::Deleting.is_before());
        assert!(!LifecycleEvent::Saved.is_before());
        assert_eq!(LifecycleEvent::Updated.to_string(), "updated");
    }
}
