//! Registry worker
//!
//! Owns the listener table. Requests are served strictly in channel order,
//! so a purge enqueued by `dispose` is applied before any request sent
//! after `dispose` returned.

use super::protocol::{Command, Listener, ListenerId, Registration};
use super::RegistryConfig;
use crate::error::Result;
use crate::events::{EventBus, RegistryEvent};
use crate::watchdog::RegistryWatchdog;
use ahash::AHashMap;
use dom::{DomArena, NodeId, NodeWatcher, WatchId};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything registered on one node
#[derive(Debug)]
struct NodeEntry {
    watch: WatchId,
    types: AHashMap<String, Vec<Registration>>,
}

impl NodeEntry {
    fn listener_count(&self) -> usize {
        self.types.values().map(Vec::len).sum()
    }
}

pub(super) struct RegistryWorker {
    config: RegistryConfig,
    arena: Arc<DomArena>,
    bus: EventBus,
    watchdog: Arc<dyn NodeWatcher>,
    rx: mpsc::UnboundedReceiver<Command>,
    entries: AHashMap<NodeId, NodeEntry>,
    /// Reverse index for removal by id
    locations: AHashMap<ListenerId, (NodeId, String)>,
}

impl RegistryWorker {
    pub(super) fn new(
        config: RegistryConfig,
        arena: Arc<DomArena>,
        bus: EventBus,
        tx: mpsc::UnboundedSender<Command>,
        rx: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let watchdog = Arc::new(RegistryWatchdog::new(config.name.clone(), tx));
        Self {
            config,
            arena,
            bus,
            watchdog,
            rx,
            entries: AHashMap::new(),
            locations: AHashMap::new(),
        }
    }

    pub(super) async fn run(mut self) {
        tracing::info!("[{}] Event registry started", self.config.name);
        self.bus.publish(RegistryEvent::Started);

        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Add {
                    node,
                    event_type,
                    listener,
                    capture,
                    reply,
                } => {
                    let _ = reply.send(self.add(node, event_type, listener, capture));
                }
                Command::Remove {
                    node,
                    event_type,
                    listener,
                    capture,
                    reply,
                } => {
                    let _ = reply.send(self.remove(node, &event_type, &listener, capture));
                }
                Command::RemoveById { id, reply } => {
                    let _ = reply.send(self.remove_by_id(id));
                }
                Command::Snapshot {
                    nodes,
                    event_type,
                    reply,
                } => {
                    let _ = reply.send(self.snapshot(&nodes, &event_type));
                }
                Command::ListenerTypes { node, reply } => {
                    let _ = reply.send(self.entries.get(&node).map(|entry| {
                        let mut types: Vec<String> = entry.types.keys().cloned().collect();
                        types.sort();
                        types
                    }));
                }
                Command::HasEntry { node, reply } => {
                    let _ = reply.send(self.entries.contains_key(&node));
                }
                Command::Purge { node } => self.purge(node),
                Command::Stop { reply } => {
                    self.clear();
                    let _ = reply.send(());
                    break;
                }
            }
        }

        self.clear();
        tracing::info!("[{}] Event registry stopped", self.config.name);
        self.bus.publish(RegistryEvent::Stopped);
    }

    fn add(
        &mut self,
        node: NodeId,
        event_type: String,
        listener: Listener,
        capture: bool,
    ) -> Result<ListenerId> {
        let entry = match self.entries.entry(node) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(slot) => {
                // First registration on this node, start watching it
                let watch = self.arena.watch(node, Arc::clone(&self.watchdog))?;
                slot.insert(NodeEntry {
                    watch,
                    types: AHashMap::new(),
                })
            }
        };

        let id = ListenerId::new();
        let list = entry.types.entry(event_type.clone()).or_default();
        list.push(Registration {
            id,
            capture,
            listener,
        });

        if list.len() == self.config.listener_warning_threshold {
            tracing::warn!(
                "[{}] Node {} has {} '{}' listeners, possible leak",
                self.config.name,
                node,
                list.len(),
                event_type
            );
        }
        tracing::debug!(
            "[{}] Added listener {} for '{}' on node {} (capture: {})",
            self.config.name,
            id,
            event_type,
            node,
            capture
        );

        self.locations.insert(id, (node, event_type.clone()));
        self.bus.publish(RegistryEvent::ListenerAdded {
            node,
            event_type,
            id,
            capture,
        });
        Ok(id)
    }

    fn remove(&mut self, node: NodeId, event_type: &str, listener: &Listener, capture: bool) -> bool {
        let id = self
            .entries
            .get(&node)
            .and_then(|entry| entry.types.get(event_type))
            .and_then(|list| {
                list.iter()
                    .find(|reg| reg.capture == capture && reg.listener.same_as(listener))
                    .map(|reg| reg.id)
            });

        match id {
            Some(id) => self.remove_registration(node, event_type, id),
            None => false,
        }
    }

    fn remove_by_id(&mut self, id: ListenerId) -> bool {
        match self.locations.get(&id).cloned() {
            Some((node, event_type)) => self.remove_registration(node, &event_type, id),
            None => false,
        }
    }

    /// Drop one registration and collapse empty levels
    fn remove_registration(&mut self, node: NodeId, event_type: &str, id: ListenerId) -> bool {
        let Some(entry) = self.entries.get_mut(&node) else {
            return false;
        };
        let Some(list) = entry.types.get_mut(event_type) else {
            return false;
        };
        let Some(index) = list.iter().position(|reg| reg.id == id) else {
            return false;
        };

        list.remove(index);
        if list.is_empty() {
            entry.types.remove(event_type);
        }
        if entry.types.is_empty() {
            let watch = entry.watch;
            self.entries.remove(&node);
            self.arena.unwatch(node, watch);
            tracing::debug!("[{}] Node {} has no listeners left", self.config.name, node);
        }

        self.locations.remove(&id);
        tracing::debug!(
            "[{}] Removed listener {} for '{}' on node {}",
            self.config.name,
            id,
            event_type,
            node
        );
        self.bus.publish(RegistryEvent::ListenerRemoved {
            node,
            event_type: event_type.to_string(),
            id,
        });
        true
    }

    fn snapshot(&self, nodes: &[NodeId], event_type: &str) -> Vec<Vec<Registration>> {
        nodes
            .iter()
            .map(|node| {
                self.entries
                    .get(node)
                    .and_then(|entry| entry.types.get(event_type))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect()
    }

    /// The node is gone; its watch was consumed by the disposal itself
    fn purge(&mut self, node: NodeId) {
        let Some(entry) = self.entries.remove(&node) else {
            return;
        };

        let listeners = entry.listener_count();
        for list in entry.types.values() {
            for reg in list {
                self.locations.remove(&reg.id);
            }
        }

        tracing::debug!(
            "[{}] Purged {} listeners of disposed node {}",
            self.config.name,
            listeners,
            node
        );
        self.bus.publish(RegistryEvent::NodePurged { node, listeners });
    }

    /// Release every watch and entry
    fn clear(&mut self) {
        for (node, entry) in self.entries.drain() {
            self.arena.unwatch(node, entry.watch);
        }
        self.locations.clear();
    }
}
