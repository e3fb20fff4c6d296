//! Service coordinator
//!
//! Registers services, then drives them through start/stop/pause/continue
//! either all at once (aggregate commands) or one at a time by name
//! (targeted commands).
//!
//! Aggregate commands are best-effort: a failing service is reported to the
//! fault hook and the remaining services are still processed. Targeted
//! commands return every failure to the caller and fire no hook.

mod handle;
mod registry;
mod resolve;
mod state;

pub use handle::{Lifecycle, ServiceBuilder, ServiceHandle};
pub use registry::ServiceRegistry;
pub use resolve::{from_fn, instance, FnResolver, Instance, Resolve};
pub use state::{Action, Command, ServiceState, Transition};

use std::collections::HashSet;
use std::fmt;

/// Error type produced by resolvers and service actions
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Lazy constructor for a service handle, invoked at registration time
pub type ServiceFactory = Box<dyn FnOnce() -> Box<dyn Lifecycle>>;

/// Wrap a closure that builds a handle into a [`ServiceFactory`]
pub fn factory<T, F>(f: F) -> ServiceFactory
where
    T: Send + 'static,
    F: FnOnce() -> ServiceHandle<T> + 'static,
{
    Box::new(move || Box::new(f()) as Box<dyn Lifecycle>)
}

type CoordinatorHook = Box<dyn Fn(&ServiceCoordinator) + Send + Sync>;
type FaultHook = Box<dyn Fn(&Fault) + Send + Sync>;

/// A per-service failure raised during an aggregate command
#[derive(Debug)]
pub struct Fault {
    pub service: String,
    pub command: Command,
    pub error: ServiceError,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed for {}: {}", self.command, self.service, self.error)
    }
}

/// Outcome of an aggregate command, in registration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateReport {
    pub command: Command,
    /// Services that completed the transition
    pub transitioned: Vec<String>,
    /// Services whose transition faulted (already reported to the fault hook)
    pub faulted: Vec<String>,
}

impl AggregateReport {
    fn new(command: Command) -> Self {
        Self {
            command,
            transitioned: Vec::new(),
            faulted: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.faulted.is_empty()
    }
}

/// Status snapshot of one registered service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub state: ServiceState,
    pub description: Option<String>,
}

impl ServiceInfo {
    fn of(handle: &dyn Lifecycle) -> Self {
        Self {
            name: handle.name().to_string(),
            state: handle.state(),
            description: handle.description().map(str::to_string),
        }
    }
}

/// Coordinates the lifecycle of every registered service
pub struct ServiceCoordinator {
    registry: ServiceRegistry,
    on_started: CoordinatorHook,
    on_stopped: CoordinatorHook,
    on_fault: FaultHook,
}

impl ServiceCoordinator {
    /// Create a coordinator with its three lifecycle hooks
    pub fn new<S, P, F>(on_started: S, on_stopped: P, on_fault: F) -> Self
    where
        S: Fn(&ServiceCoordinator) + Send + Sync + 'static,
        P: Fn(&ServiceCoordinator) + Send + Sync + 'static,
        F: Fn(&Fault) + Send + Sync + 'static,
    {
        Self {
            registry: ServiceRegistry::new(),
            on_started: Box::new(on_started),
            on_stopped: Box::new(on_stopped),
            on_fault: Box::new(on_fault),
        }
    }

    /// Materialize and register services, in order.
    ///
    /// Either every produced service is registered or none is: a name that
    /// collides with an existing service or with another one in the same
    /// batch fails the whole call with [`ServiceError::DuplicateName`].
    pub fn register_services<I>(&mut self, factories: I) -> Result<(), ServiceError>
    where
        I: IntoIterator<Item = ServiceFactory>,
    {
        let handles: Vec<Box<dyn Lifecycle>> = factories.into_iter().map(|f| f()).collect();

        let mut seen = HashSet::new();
        for handle in &handles {
            let name = handle.name();
            if self.registry.contains(name) || !seen.insert(name) {
                return Err(ServiceError::DuplicateName(name.to_string()));
            }
        }

        for handle in handles {
            log::debug!("Registered service {}", handle.name());
            self.registry.register(handle)?;
        }

        Ok(())
    }

    /// Start every registered service, then fire the started hook
    pub fn start(&self) -> AggregateReport {
        let report = self.broadcast(Command::Start);
        (self.on_started)(self);
        report
    }

    /// Stop every registered service, then fire the stopped hook
    pub fn stop(&self) -> AggregateReport {
        let report = self.broadcast(Command::Stop);
        (self.on_stopped)(self);
        report
    }

    /// Pause every registered service
    pub fn pause(&self) -> AggregateReport {
        self.broadcast(Command::Pause)
    }

    /// Continue every registered service
    pub fn resume(&self) -> AggregateReport {
        self.broadcast(Command::Continue)
    }

    pub fn start_service(&self, name: &str) -> Result<(), ServiceError> {
        self.dispatch(name, Command::Start)
    }

    pub fn stop_service(&self, name: &str) -> Result<(), ServiceError> {
        self.dispatch(name, Command::Stop)
    }

    pub fn pause_service(&self, name: &str) -> Result<(), ServiceError> {
        self.dispatch(name, Command::Pause)
    }

    pub fn resume_service(&self, name: &str) -> Result<(), ServiceError> {
        self.dispatch(name, Command::Continue)
    }

    /// Stop a service if it is running, then start it again
    pub fn restart_service(&self, name: &str) -> Result<(), ServiceError> {
        let handle = self.registry.lookup(name)?;
        if handle.state().is_active() {
            handle.apply(Command::Stop)?;
        }
        handle.apply(Command::Start)?;
        log::info!("Restarted {}", name);
        Ok(())
    }

    /// Apply a command to every service, or to one service if `name` is given
    pub fn apply(
        &self,
        command: Command,
        name: Option<&str>,
    ) -> Result<Option<AggregateReport>, ServiceError> {
        match (name, command) {
            (Some(name), _) => self.dispatch(name, command).map(|()| None),
            (None, Command::Start) => Ok(Some(self.start())),
            (None, Command::Stop) => Ok(Some(self.stop())),
            (None, Command::Pause) => Ok(Some(self.pause())),
            (None, Command::Continue) => Ok(Some(self.resume())),
        }
    }

    /// Current state of a single service
    pub fn state(&self, name: &str) -> Result<ServiceState, ServiceError> {
        Ok(self.registry.lookup(name)?.state())
    }

    pub fn status(&self, name: &str) -> Result<ServiceInfo, ServiceError> {
        Ok(ServiceInfo::of(self.registry.lookup(name)?))
    }

    /// Status of every registered service, in registration order
    pub fn services(&self) -> Vec<ServiceInfo> {
        self.registry.all().map(ServiceInfo::of).collect()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    fn dispatch(&self, name: &str, command: Command) -> Result<(), ServiceError> {
        let handle = self.registry.lookup(name)?;
        let transition = handle.apply(command)?;
        log::info!("{} {} ({} -> {})", command, name, transition.from, transition.to);
        Ok(())
    }

    fn broadcast(&self, command: Command) -> AggregateReport {
        log::info!("Sending {} to {} services", command, self.registry.len());

        let mut report = AggregateReport::new(command);
        for handle in self.registry.all() {
            let name = handle.name();
            match handle.apply(command) {
                Ok(transition) => {
                    log::debug!("{}: {} -> {}", name, transition.from, transition.to);
                    report.transitioned.push(name.to_string());
                }
                Err(error) => {
                    log::warn!("{} failed for {}: {}", command, name, error);
                    report.faulted.push(name.to_string());
                    (self.on_fault)(&Fault {
                        service: name.to_string(),
                        command,
                        error,
                    });
                }
            }
        }

        report
    }
}

impl Default for ServiceCoordinator {
    fn default() -> Self {
        Self::new(|_| {}, |_| {}, |fault| log::error!("{}", fault))
    }
}

impl fmt::Debug for ServiceCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCoordinator")
            .field("services", &self.registry.names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Service already registered: {0}")]
    DuplicateName(String),

    #[error("Service not found: {0}")]
    UnknownService(String),

    #[error("Cannot {command} {service}: service is {state}")]
    InvalidTransition {
        service: String,
        state: ServiceState,
        command: Command,
    },

    #[error("Failed to resolve {service}: {source}")]
    ResolutionFault {
        service: String,
        #[source]
        source: BoxError,
    },

    #[error("{command} action failed for {service}: {source}")]
    ActionFault {
        service: String,
        command: Command,
        #[source]
        source: BoxError,
    },
}
