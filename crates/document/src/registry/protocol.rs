//! Registry Protocol Types
//!
//! Requests travel to the worker as [`Command`] values; each one that
//! expects an answer carries its own oneshot reply channel.

use crate::dispatch::Event;
use crate::error::{ListenerError, Result};
use dom::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Registration id, time-ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub(crate) fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of one listener invocation
pub type ListenerResult = std::result::Result<(), ListenerError>;

type Callback = dyn Fn(&mut Event) -> ListenerResult + Send + Sync;

/// Event callback
///
/// Identity is the allocation: clones of one `Listener` are the same
/// listener, two closures with identical bodies are not.
#[derive(Clone)]
pub struct Listener(Arc<Callback>);

impl Listener {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Event) -> ListenerResult + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Wrap a callback that cannot fail
    pub fn infallible<F>(f: F) -> Self
    where
        F: Fn(&mut Event) + Send + Sync + 'static,
    {
        Self::new(move |event| {
            f(event);
            Ok(())
        })
    }

    pub fn same_as(&self, other: &Listener) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn call(&self, event: &mut Event) -> ListenerResult {
        (self.0)(event)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Arc::as_ptr(&self.0))
    }
}

/// One entry in a node's listener list
#[derive(Debug, Clone)]
pub struct Registration {
    pub id: ListenerId,
    pub capture: bool,
    pub listener: Listener,
}

/// Worker requests
pub(crate) enum Command {
    Add {
        node: NodeId,
        event_type: String,
        listener: Listener,
        capture: bool,
        reply: oneshot::Sender<Result<ListenerId>>,
    },
    Remove {
        node: NodeId,
        event_type: String,
        listener: Listener,
        capture: bool,
        reply: oneshot::Sender<bool>,
    },
    RemoveById {
        id: ListenerId,
        reply: oneshot::Sender<bool>,
    },
    /// Per-node registrations for one event type, aligned with `nodes`
    Snapshot {
        nodes: Vec<NodeId>,
        event_type: String,
        reply: oneshot::Sender<Vec<Vec<Registration>>>,
    },
    ListenerTypes {
        node: NodeId,
        reply: oneshot::Sender<Option<Vec<String>>>,
    },
    HasEntry {
        node: NodeId,
        reply: oneshot::Sender<bool>,
    },
    /// Sent by the liveness watcher, no reply
    Purge { node: NodeId },
    Stop { reply: oneshot::Sender<()> },
}
