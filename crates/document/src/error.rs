//! Error types for the event layer

use crate::registry::ListenerId;
use dom::{DomError, NodeId};
use thiserror::Error;

/// Failure raised from inside a listener
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for event and document operations
pub type Result<T> = std::result::Result<T, EventError>;

#[derive(Error, Debug)]
pub enum EventError {
    #[error(transparent)]
    Dom(#[from] DomError),

    /// A listener failed; the rest of the dispatch was abandoned
    #[error("Listener {listener} for '{event_type}' on node {node} failed: {source}")]
    Dispatch {
        node: NodeId,
        event_type: String,
        listener: ListenerId,
        source: ListenerError,
    },

    #[error("Event registry is not running")]
    RegistryStopped,
}
