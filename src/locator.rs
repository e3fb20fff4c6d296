//! Name and type keyed instance factories
//!
//! A [`Locator`] is handed explicitly to the services that need it; there is
//! no process-wide provider. Share one between several handles through an
//! `Arc` and [`Locator::resolver`].

use std::any::{self, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::coordinator::{from_fn, BoxError, Resolve};

type Factory = Box<dyn Any + Send + Sync>;
type TypedFactory<T> = Box<dyn Fn() -> T + Send + Sync>;

#[derive(Default)]
pub struct Locator {
    factories: HashMap<(TypeId, String), Factory>,
}

impl Locator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for instances of `T` named `name`.
    ///
    /// A later registration for the same name and type replaces the earlier one.
    pub fn register<T, F>(&mut self, name: impl Into<String>, factory: F)
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let key = (TypeId::of::<T>(), name.into());
        let factory: TypedFactory<T> = Box::new(factory);
        self.factories.insert(key, Box::new(factory));
    }

    /// Build a fresh instance of `T` registered under `name`
    pub fn get_instance<T: 'static>(&self, name: &str) -> Result<T, LocatorError> {
        self.factories
            .get(&(TypeId::of::<T>(), name.to_string()))
            .and_then(|factory| factory.downcast_ref::<TypedFactory<T>>())
            .map(|factory| factory())
            .ok_or_else(|| LocatorError::NotRegistered {
                name: name.to_string(),
                type_name: any::type_name::<T>(),
            })
    }

    pub fn contains<T: 'static>(&self, name: &str) -> bool {
        self.factories
            .contains_key(&(TypeId::of::<T>(), name.to_string()))
    }

    /// A resolver that looks services up by their own name
    pub fn resolver<T: Send + 'static>(self: &Arc<Self>) -> impl Resolve<T> + 'static {
        let locator = Arc::clone(self);
        from_fn(move |name: &str| locator.get_instance::<T>(name).map_err(BoxError::from))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("No instance of {type_name} registered as {name}")]
    NotRegistered { name: String, type_name: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Database(u32);

    #[test]
    fn test_register_and_get() {
        let mut locator = Locator::new();
        locator.register("db", || Database(5432));

        assert!(locator.contains::<Database>("db"));
        assert_eq!(locator.get_instance::<Database>("db").unwrap(), Database(5432));
    }

    #[test]
    fn test_same_name_different_types() {
        let mut locator = Locator::new();
        locator.register("db", || Database(1));
        locator.register("db", || "sqlite".to_string());

        assert_eq!(locator.get_instance::<Database>("db").unwrap(), Database(1));
        assert_eq!(locator.get_instance::<String>("db").unwrap(), "sqlite");
    }

    #[test]
    fn test_missing_instance() {
        let locator = Locator::new();
        let err = locator.get_instance::<Database>("db").unwrap_err();
        assert!(matches!(err, LocatorError::NotRegistered { .. }));
        assert!(err.to_string().contains("Database"));
    }

    #[test]
    fn test_lookup_is_keyed_by_type() {
        let mut locator = Locator::new();
        locator.register("db", || Database(1));

        assert!(!locator.contains::<String>("db"));
        let err = locator.get_instance::<String>("db").unwrap_err();
        assert!(matches!(err, LocatorError::NotRegistered { ref name, .. } if name == "db"));
    }

    #[test]
    fn test_resolver_uses_service_name() {
        let mut locator = Locator::new();
        locator.register("primary", || Database(1));
        locator.register("replica", || Database(2));
        let locator = Arc::new(locator);

        let resolver = locator.resolver::<Database>();
        assert_eq!(resolver.resolve("replica").unwrap(), Database(2));
        assert!(resolver.resolve("backup").is_err());
    }
}
