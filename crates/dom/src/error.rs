//! Error types for DOM operations
//!
//! Simple, flat error hierarchy. No over-engineering.

use crate::types::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    /// The reference does not resolve to a live node unit.
    #[error("Invalid node: {0}")]
    InvalidNode(NodeId),

    /// A structural argument is not where the operation expects it.
    #[error("Node {child} is not a child of {parent}")]
    NotFound { parent: NodeId, child: NodeId },

    #[error("Hierarchy request error: {child} cannot be inserted into {parent}")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    #[error("Invalid node type: expected {expected}, got {actual}")]
    InvalidNodeType { expected: String, actual: String },

    #[error("Selector syntax error at offset {position} in {selector:?}: {reason}")]
    SelectorSyntax {
        selector: String,
        position: usize,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl DomError {
    pub(crate) fn selector(selector: &str, position: usize, reason: impl Into<String>) -> Self {
        DomError::SelectorSyntax {
            selector: selector.to_string(),
            position,
            reason: reason.into(),
        }
    }
}
