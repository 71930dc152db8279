//! Liveness watches
//!
//! A watcher is attached to one node and told when that node is disposed.
//! This is how long-lived services (the event registry) avoid holding
//! dangling entries for nodes that no longer exist.

use crate::types::{NodeId, WatchId};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Observer of node disposal
///
/// Called synchronously from `DomArena::dispose`, after the node has been
/// removed from the arena. Implementations must not block.
pub trait NodeWatcher: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &str;

    fn on_dispose(&self, node: NodeId);
}

/// Watchers attached to a single node
#[derive(Default)]
pub(crate) struct Watchers {
    entries: SmallVec<[(WatchId, Arc<dyn NodeWatcher>); 1]>,
}

impl Watchers {
    pub(crate) fn add(&mut self, id: WatchId, watcher: Arc<dyn NodeWatcher>) {
        self.entries.push((id, watcher));
    }

    pub(crate) fn remove(&mut self, id: WatchId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(watch_id, _)| *watch_id != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Notify and drop every watcher
    pub(crate) fn notify_all(self, node: NodeId) {
        for (_, watcher) in self.entries {
            tracing::debug!("Notifying watcher {} of disposal: {}", watcher.name(), node);
            watcher.on_dispose(node);
        }
    }
}

impl fmt::Debug for Watchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(id, w)| (id, w.name())))
            .finish()
    }
}
