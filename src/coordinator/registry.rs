//! Ordered, name-keyed collection of service handles

use std::collections::HashMap;

use super::handle::Lifecycle;
use super::ServiceError;

/// Registered services in registration order
#[derive(Default)]
pub struct ServiceRegistry {
    entries: Vec<Box<dyn Lifecycle>>,
    /// Name -> position in `entries`
    index: HashMap<String, usize>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: Box<dyn Lifecycle>) -> Result<(), ServiceError> {
        let name = handle.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ServiceError::DuplicateName(name));
        }
        self.index.insert(name, self.entries.len());
        self.entries.push(handle);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&dyn Lifecycle, ServiceError> {
        self.index
            .get(name)
            .map(|&i| self.entries[i].as_ref())
            .ok_or_else(|| ServiceError::UnknownService(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Handles in registration order. Can be called any number of times.
    pub fn all(&self) -> impl Iterator<Item = &dyn Lifecycle> + '_ {
        self.entries.iter().map(|h| h.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|h| h.name())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{instance, ServiceHandle};

    fn handle(name: &str) -> Box<dyn Lifecycle> {
        Box::new(ServiceHandle::builder(name, instance(())).build())
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ServiceRegistry::new();
        registry.register(handle("web")).unwrap();

        assert!(registry.contains("web"));
        assert_eq!(registry.lookup("web").unwrap().name(), "web");
        assert!(matches!(
            registry.lookup("db"),
            Err(ServiceError::UnknownService(_))
        ));
    }

    #[test]
    fn test_duplicate_name() {
        let mut registry = ServiceRegistry::new();
        registry.register(handle("web")).unwrap();

        let err = registry.register(handle("web")).unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateName(ref n) if n == "web"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_all_is_ordered_and_restartable() {
        let mut registry = ServiceRegistry::new();
        for name in ["c", "a", "b"] {
            registry.register(handle(name)).unwrap();
        }

        let first: Vec<_> = registry.all().map(|h| h.name().to_string()).collect();
        let second: Vec<_> = registry.names().collect();
        assert_eq!(first, vec!["c", "a", "b"]);
        assert_eq!(second, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_empty() {
        let registry = ServiceRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.all().count(), 0);
    }
}
