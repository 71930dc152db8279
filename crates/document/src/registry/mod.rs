//! Event listener registry
//!
//! A dedicated worker task owns the table
//! `node → event type → [registration]` and serves requests from a channel.
//! Nodes with at least one registration carry a liveness watch, so their
//! entries disappear when the node is disposed.

mod handle;
pub mod protocol;
mod worker;

pub use handle::RegistryHandle;
pub use protocol::{Listener, ListenerId, ListenerResult, Registration};

use crate::error::Result;
use crate::events::{EventBus, RegistryEvent};
use dom::DomArena;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use worker::RegistryWorker;

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Prefix for log lines and the watchdog name
    pub name: String,
    /// Capacity of the lifecycle event bus
    pub event_capacity: usize,
    /// Warn once a single node/type list reaches this length
    pub listener_warning_threshold: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: "registry".to_string(),
            event_capacity: 1024,
            listener_warning_threshold: 64,
        }
    }
}

/// Running registry service
///
/// Dropping it without [`stop`](Self::stop) enqueues a stop and leaves the
/// worker to release its watches in the background.
pub struct EventRegistry {
    handle: RegistryHandle,
    bus: EventBus,
    task: Option<JoinHandle<()>>,
}

impl EventRegistry {
    /// Spawn the worker. Must be called from within a Tokio runtime.
    pub fn start(arena: Arc<DomArena>, config: RegistryConfig) -> Self {
        let bus = EventBus::with_capacity(config.event_capacity);
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = RegistryWorker::new(config, arena, bus.clone(), tx.clone(), rx);
        let task = tokio::spawn(worker.run());

        Self {
            handle: RegistryHandle::new(tx),
            bus,
            task: Some(task),
        }
    }

    pub fn handle(&self) -> &RegistryHandle {
        &self.handle
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.bus.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some() && self.handle.is_running()
    }

    /// Drop every registration and watch, then wait for the worker to exit
    pub async fn stop(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        let stopped = self.handle.stop().await;
        if let Err(e) = task.await {
            tracing::warn!("Event registry task ended abnormally: {}", e);
        }
        stopped
    }
}

impl Drop for EventRegistry {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            if !self.handle.request_stop() {
                task.abort();
            }
        }
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("running", &self.is_running())
            .finish()
    }
}
