//! Cloneable client side of the registry
//!
//! Every call is one request on the worker's channel and one reply on a
//! fresh oneshot. A closed channel on either leg means the worker is gone.

use super::protocol::{Command, Listener, ListenerId, Registration};
use crate::error::{EventError, Result};
use dom::NodeId;
use tokio::sync::{mpsc, oneshot};

#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl RegistryHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| EventError::RegistryStopped)?;
        rx.await.map_err(|_| EventError::RegistryStopped)
    }

    /// Register `listener` for `event_type` on `node`
    ///
    /// Fails with `InvalidNode` if the node is not live.
    pub async fn add_listener(
        &self,
        node: NodeId,
        event_type: impl Into<String>,
        listener: Listener,
        capture: bool,
    ) -> Result<ListenerId> {
        let event_type = event_type.into();
        self.request(|reply| Command::Add {
            node,
            event_type,
            listener,
            capture,
            reply,
        })
        .await?
    }

    /// Remove the first registration matching listener and capture flag
    ///
    /// Returns false when nothing matched; that is not an error.
    pub async fn remove_listener(
        &self,
        node: NodeId,
        event_type: &str,
        listener: &Listener,
        capture: bool,
    ) -> Result<bool> {
        self.request(|reply| Command::Remove {
            node,
            event_type: event_type.to_string(),
            listener: listener.clone(),
            capture,
            reply,
        })
        .await
    }

    pub async fn remove_listener_by_id(&self, id: ListenerId) -> Result<bool> {
        self.request(|reply| Command::RemoveById { id, reply }).await
    }

    /// Event types with registrations on `node`, `None` if it has no entry at all
    pub async fn listener_types(&self, node: NodeId) -> Result<Option<Vec<String>>> {
        self.request(|reply| Command::ListenerTypes { node, reply })
            .await
    }

    pub async fn has_entry(&self, node: NodeId) -> Result<bool> {
        self.request(|reply| Command::HasEntry { node, reply }).await
    }

    /// Registrations for `event_type` on each of `nodes`, in the same order
    pub async fn snapshot(
        &self,
        nodes: Vec<NodeId>,
        event_type: &str,
    ) -> Result<Vec<Vec<Registration>>> {
        self.request(|reply| Command::Snapshot {
            nodes,
            event_type: event_type.to_string(),
            reply,
        })
        .await
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    pub(crate) async fn stop(&self) -> Result<()> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Enqueue a stop without waiting for the reply
    pub(crate) fn request_stop(&self) -> bool {
        let (reply, _) = oneshot::channel();
        self.tx.send(Command::Stop { reply }).is_ok()
    }
}

impl std::fmt::Debug for RegistryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryHandle")
            .field("running", &self.is_running())
            .finish()
    }
}
