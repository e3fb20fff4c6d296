//! Resolvers produce the concrete instance behind a service name

use std::marker::PhantomData;
use std::sync::Mutex;

use super::BoxError;

/// Produces the instance of type `T` for the service called `name`.
///
/// A handle calls its resolver at most once successfully; a failed
/// resolution is retried on the next command.
pub trait Resolve<T>: Send + Sync {
    fn resolve(&self, name: &str) -> Result<T, BoxError>;
}

/// Resolver backed by a closure
pub struct FnResolver<T, F> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

/// Use a closure as a resolver
pub fn from_fn<T, F>(f: F) -> FnResolver<T, F>
where
    F: Fn(&str) -> Result<T, BoxError> + Send + Sync,
{
    FnResolver {
        f,
        _marker: PhantomData,
    }
}

impl<T, F> Resolve<T> for FnResolver<T, F>
where
    F: Fn(&str) -> Result<T, BoxError> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Result<T, BoxError> {
        (self.f)(name)
    }
}

/// Resolver that hands out one pre-built instance
pub struct Instance<T>(Mutex<Option<T>>);

/// Resolve to `value`. Resolving a second time is an error.
pub fn instance<T>(value: T) -> Instance<T> {
    Instance(Mutex::new(Some(value)))
}

impl<T: Send> Resolve<T> for Instance<T> {
    fn resolve(&self, name: &str) -> Result<T, BoxError> {
        self.0
            .lock()
            .map_err(|_| format!("instance for {} is poisoned", name))?
            .take()
            .ok_or_else(|| format!("instance for {} already taken", name).into())
    }
}
