//! svcd - in-process service lifecycle coordinator
//!
//! Drives a set of named services through start/stop/pause/continue, either
//! all together or one at a time, the way a service control manager drives
//! OS services.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               ServiceCoordinator                 │
//! │     aggregate + targeted commands, hooks         │
//! ├─────────────────────────────────────────────────┤
//! │                ServiceRegistry                   │
//! ├─────────────────────────────────────────────────┤
//! │  ServiceHandle<T>  │  ServiceHandle<U>  │  ...   │
//! │  state + actions   │  state + actions   │        │
//! ├─────────────────────────────────────────────────┤
//! │        Resolve<T>: closure, Locator, ...         │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! The `units` and `console` modules back the `svcd` binary, which hosts
//! command-backed services described by unit files.

pub mod console;
pub mod coordinator;
pub mod locator;
pub mod units;

pub use coordinator::{
    factory, AggregateReport, BoxError, Command, Fault, Lifecycle, Resolve, ServiceCoordinator,
    ServiceError, ServiceFactory, ServiceHandle, ServiceInfo, ServiceState,
};
pub use locator::Locator;
