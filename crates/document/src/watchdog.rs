//! Liveness watchdog
//!
//! The registry attaches one shared watchdog to every node that has at
//! least one listener. Disposal of such a node turns into a `Purge` request
//! on the worker's channel.
//!
//! The arena calls `on_dispose` synchronously from inside `dispose`, on
//! whatever thread did the disposing, so the watchdog only enqueues and
//! never touches registry state itself.

use crate::registry::protocol::Command;
use dom::{NodeId, NodeWatcher};
use tokio::sync::mpsc;

pub struct RegistryWatchdog {
    name: String,
    tx: mpsc::UnboundedSender<Command>,
}

impl RegistryWatchdog {
    pub(crate) fn new(name: impl Into<String>, tx: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }
}

impl NodeWatcher for RegistryWatchdog {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_dispose(&self, node: NodeId) {
        if self.tx.send(Command::Purge { node }).is_err() {
            // Registry already stopped, it holds no entries to purge
            tracing::trace!("[{}] Dropped purge for node {}", self.name, node);
        }
    }
}
