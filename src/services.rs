//! Ambient services for pipeline configuration.
//!
//! Configuration functions may depend on ambient state (feature flags,
//! an auth policy, a clock). `Services` is the typed map they read it from:
//! one value per type, inserted up front, shared read-only afterwards.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Services {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, replacing any earlier value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get(&TypeId::of::<T>())?.downcast_ref::<T>()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").field("len", &self.values.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct FeatureFlags { audit: bool }

    #[test]
    fn typed_lookup() {
        let mut services = Services::new();
        services.insert(FeatureFlags { audit: true }).insert(42_u32);

        assert_eq!(services.get::<FeatureFlags>(), Some(&FeatureFlags { audit: true }));
        assert_eq!(services.get::<u32>(), Some(&42));
        assert!(services.get::<String>().is_none());
        assert_eq!(services.len(), 2);
    }

    #[test]
    fn insert_replaces_same_type() {
        let mut services = Services::new();
        services.insert(1_u8).insert(2_u8);
        assert_eq!(services.get::<u8>(), Some(&2));
        assert_eq!(services.len(), 1);
    }
}
