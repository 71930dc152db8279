//! Document Events - listener registry and dispatch for the headless tree
//!
//! Builds on the `dom` crate: the tree lives in a [`dom::DomArena`], listeners
//! live in an [`EventRegistry`] worker, and [`Document`] ties both together.
//!
//! # Architecture
//!
//! 1. **Registry as a service**: one task owns every registration, callers
//!    talk to it through a cloneable [`RegistryHandle`]
//! 2. **Liveness by watch**: nodes with listeners carry a watchdog, disposal
//!    purges their entries through the same request channel
//! 3. **Synchronous listeners**: a dispatch runs its listeners in order on
//!    the caller's task, one at a time

pub mod dispatch;
pub mod document;
pub mod error;
pub mod events;
pub mod registry;
pub mod watchdog;

pub use dispatch::{dispatch_event, Event, EventPhase};
pub use document::{Document, DocumentConfig};
pub use error::{EventError, ListenerError, Result};
pub use events::{EventBus, RegistryEvent};
pub use registry::{
    EventRegistry, Listener, ListenerId, ListenerResult, Registration, RegistryConfig,
    RegistryHandle,
};
pub use watchdog::RegistryWatchdog;
