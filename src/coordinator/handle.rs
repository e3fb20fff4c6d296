//! Per-service wrapper
//!
//! A [`ServiceHandle`] owns one concretely-typed service instance and the
//! four actions that drive it. The coordinator only sees the type-erased
//! [`Lifecycle`] trait.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::resolve::Resolve;
use super::state::{Action, Command, ServiceState, Transition};
use super::{factory, BoxError, ServiceError, ServiceFactory};

type ActionFn<T> = Box<dyn Fn(&mut T) -> Result<(), BoxError> + Send + Sync>;

/// Type-erased view of a service handle.
///
/// `apply` runs the service action synchronously and holds the handle's
/// lock for its whole duration. An action that never returns blocks every
/// later command on that handle, including aggregate commands that reach it.
pub trait Lifecycle: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str>;

    fn state(&self) -> ServiceState;

    /// Validate `command` against the current state, run the matching action
    /// and record the new state. On error the state is left untouched.
    fn apply(&self, command: Command) -> Result<Transition, ServiceError>;
}

struct Inner<T> {
    state: ServiceState,
    /// Resolved on first use, then kept for the handle's lifetime
    instance: Option<T>,
}

/// Lifecycle wrapper around a service instance of type `T`
pub struct ServiceHandle<T> {
    name: String,
    description: Option<String>,
    resolver: Box<dyn Resolve<T>>,
    start: ActionFn<T>,
    stop: ActionFn<T>,
    pause: ActionFn<T>,
    resume: ActionFn<T>,
    inner: Mutex<Inner<T>>,
}

impl<T: Send + 'static> ServiceHandle<T> {
    pub fn builder(
        name: impl Into<String>,
        resolver: impl Resolve<T> + 'static,
    ) -> ServiceBuilder<T> {
        ServiceBuilder {
            name: name.into(),
            description: None,
            resolver: Box::new(resolver),
            start: None,
            stop: None,
            pause: None,
            resume: None,
        }
    }

    /// Whether the resolver has produced the instance yet
    pub fn is_resolved(&self) -> bool {
        self.lock().instance.is_some()
    }

    /// Run `f` against the resolved instance, if there is one
    pub fn with_instance<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.lock().instance.as_ref().map(f)
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // Actions run under catch_unwind, so a poisoned lock still holds a
        // consistent state
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn action(&self, action: Action) -> &ActionFn<T> {
        match action {
            Action::Start => &self.start,
            Action::Stop => &self.stop,
            Action::Pause => &self.pause,
            Action::Continue => &self.resume,
        }
    }
}

impl<T: Send + 'static> Lifecycle for ServiceHandle<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn state(&self) -> ServiceState {
        self.lock().state
    }

    fn apply(&self, command: Command) -> Result<Transition, ServiceError> {
        let mut guard = self.lock();
        let Inner { state, instance } = &mut *guard;

        let transition = state
            .transition(command)
            .ok_or_else(|| ServiceError::InvalidTransition {
                service: self.name.clone(),
                state: *state,
                command,
            })?;

        let instance = match instance {
            Some(instance) => instance,
            None => {
                let resolved = self.resolver.resolve(&self.name).map_err(|source| {
                    ServiceError::ResolutionFault {
                        service: self.name.clone(),
                        source,
                    }
                })?;
                log::debug!("Resolved instance for {}", self.name);
                instance.insert(resolved)
            }
        };

        let action = self.action(transition.action);
        let result = match panic::catch_unwind(AssertUnwindSafe(|| action(instance))) {
            Ok(result) => result,
            Err(payload) => Err(panic_message(payload).into()),
        };

        result.map_err(|source| ServiceError::ActionFault {
            service: self.name.clone(),
            command,
            source,
        })?;

        *state = transition.to;
        Ok(transition)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("action panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("action panicked: {}", s)
    } else {
        "action panicked".to_string()
    }
}

/// Builder for [`ServiceHandle`]. Actions left unset do nothing.
pub struct ServiceBuilder<T> {
    name: String,
    description: Option<String>,
    resolver: Box<dyn Resolve<T>>,
    start: Option<ActionFn<T>>,
    stop: Option<ActionFn<T>>,
    pause: Option<ActionFn<T>>,
    resume: Option<ActionFn<T>>,
}

impl<T: Send + 'static> ServiceBuilder<T> {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn on_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.start = Some(Box::new(f));
        self
    }

    pub fn on_stop<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.stop = Some(Box::new(f));
        self
    }

    pub fn on_pause<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.pause = Some(Box::new(f));
        self
    }

    pub fn on_continue<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.resume = Some(Box::new(f));
        self
    }

    pub fn build(self) -> ServiceHandle<T> {
        ServiceHandle {
            name: self.name,
            description: self.description,
            resolver: self.resolver,
            start: self.start.unwrap_or_else(noop),
            stop: self.stop.unwrap_or_else(noop),
            pause: self.pause.unwrap_or_else(noop),
            resume: self.resume.unwrap_or_else(noop),
            inner: Mutex::new(Inner {
                state: ServiceState::Stopped,
                instance: None,
            }),
        }
    }

    /// Defer building the handle until it is registered
    pub fn into_factory(self) -> ServiceFactory {
        factory(move || self.build())
    }
}

fn noop<T>() -> ActionFn<T> {
    Box::new(|_| Ok(()))
}
