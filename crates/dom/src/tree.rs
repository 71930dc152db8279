//! Structural mutation protocol
//!
//! Each operation updates the directly affected nodes, then walks the
//! now-explicit ancestor chain applying the same membership delta to every
//! strict ancestor, one node lock at a time:
//!
//! ```text
//! append_child(P, C):
//!   C.parent = P
//!   P.children += C ; P.members += C.members
//!   for A in ancestors(P): A.members += C.members
//! ```
//!
//! The sequence is not a cross-node transaction. A concurrent reader may
//! observe a child whose parent link is set before every ancestor's
//! membership has caught up.

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::membership::MembershipDelta;
use crate::node::NodeUnit;
use crate::types::{NodeData, NodeId, NodeSnapshot};
use std::sync::Arc;

impl DomArena {
    /// Append `child` as the last child of `parent`
    ///
    /// A child that already has a parent (including `parent` itself) is
    /// detached first. Returns the parent's updated snapshot.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<NodeSnapshot> {
        self.insert_at(parent, child, None)
    }

    /// Insert `new` immediately before `reference` in `parent`'s children
    pub fn insert_before(
        &self,
        parent: NodeId,
        new: NodeId,
        reference: NodeId,
    ) -> Result<NodeSnapshot> {
        let parent_unit = self.unit(parent)?;
        self.unit(new)?;

        if parent_unit.lock().child_index(reference).is_none() {
            return Err(DomError::NotFound {
                parent,
                child: reference,
            });
        }
        if new == reference {
            return Ok(parent_unit.snapshot());
        }

        self.insert_at(parent, new, Some(reference))
    }

    /// Remove `child` from `parent`
    ///
    /// The child stays live as a detached root keeping its own subtree.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<NodeSnapshot> {
        let parent_unit = self.unit(parent)?;
        let child_unit = self.unit(child)?;

        let delta = {
            let state = child_unit.lock();
            if state.parent != Some(parent) {
                return Err(DomError::NotFound { parent, child });
            }
            MembershipDelta::lose(&state.membership)
        };

        let (grandparent, snapshot) = {
            let mut state = parent_unit.lock();
            let index = state
                .child_index(child)
                .ok_or(DomError::NotFound { parent, child })?;
            state.children.remove(index);
            state.membership.apply(&delta);
            (state.parent, state.snapshot(parent))
        };

        {
            let mut state = child_unit.lock();
            if state.parent == Some(parent) {
                state.parent = None;
            }
        }

        self.propagate(grandparent, &delta)?;
        tracing::debug!("Removed {} from {}", child, parent);
        Ok(snapshot)
    }

    /// Put `new` where `old` is, removing `old`
    ///
    /// Every affected membership set moves from "contains old" to "contains
    /// new" in one locked step, so no node ever holds both or neither.
    pub fn replace_child(&self, parent: NodeId, new: NodeId, old: NodeId) -> Result<NodeSnapshot> {
        let parent_unit = self.unit(parent)?;
        let new_unit = self.unit(new)?;
        let old_unit = self.unit(old)?;

        if parent_unit.lock().child_index(old).is_none() {
            return Err(DomError::NotFound { parent, child: old });
        }
        if new == old {
            return Ok(parent_unit.snapshot());
        }
        self.check_hierarchy(&parent_unit, &new_unit)?;

        let current_parent = new_unit.lock().parent;
        if let Some(current_parent) = current_parent {
            self.remove_child(current_parent, new)?;
        }

        let lost = old_unit.lock().membership.to_vec();
        let delta = {
            let mut state = new_unit.lock();
            state.ensure_live(new)?;
            state.parent = Some(parent);
            MembershipDelta {
                gained: state.membership.to_vec(),
                lost,
            }
        };

        let (grandparent, snapshot) = {
            let mut state = parent_unit.lock();
            let position = if state.disposed {
                Err(DomError::InvalidNode(parent))
            } else {
                state
                    .child_index(old)
                    .ok_or(DomError::NotFound { parent, child: old })
            };
            let index = match position {
                Ok(index) => index,
                Err(e) => {
                    drop(state);
                    Self::unlink(&new_unit, parent);
                    return Err(e);
                }
            };
            state.children[index] = new;
            state.membership.apply(&delta);
            (state.parent, state.snapshot(parent))
        };

        {
            let mut state = old_unit.lock();
            if state.parent == Some(parent) {
                state.parent = None;
            }
        }

        self.propagate(grandparent, &delta)?;
        tracing::debug!("Replaced {} with {} in {}", old, new, parent);
        Ok(snapshot)
    }

    fn insert_at(
        &self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> Result<NodeSnapshot> {
        let parent_unit = self.unit(parent)?;
        let child_unit = self.unit(child)?;
        self.insert_units(&parent_unit, &child_unit, before)
    }

    /// Link two resolved units; either may have been disposed since lookup
    pub(crate) fn insert_units(
        &self,
        parent_unit: &Arc<NodeUnit>,
        child_unit: &Arc<NodeUnit>,
        before: Option<NodeId>,
    ) -> Result<NodeSnapshot> {
        let parent = parent_unit.id();
        let child = child_unit.id();
        self.check_hierarchy(parent_unit, child_unit)?;

        let current_parent = child_unit.lock().parent;
        if let Some(current_parent) = current_parent {
            self.remove_child(current_parent, child)?;
        }

        let delta = {
            let mut state = child_unit.lock();
            state.ensure_live(child)?;
            state.parent = Some(parent);
            MembershipDelta::gain(&state.membership)
        };

        let (grandparent, snapshot) = {
            let mut state = parent_unit.lock();
            let position = match before {
                _ if state.disposed => Err(DomError::InvalidNode(parent)),
                None => Ok(state.children.len()),
                Some(reference) => state.child_index(reference).ok_or(DomError::NotFound {
                    parent,
                    child: reference,
                }),
            };
            let index = match position {
                Ok(index) => index,
                Err(e) => {
                    drop(state);
                    Self::unlink(child_unit, parent);
                    return Err(e);
                }
            };
            state.children.insert(index, child);
            state.membership.apply(&delta);
            (state.parent, state.snapshot(parent))
        };

        self.propagate(grandparent, &delta)?;
        tracing::debug!("Inserted {} into {}", child, parent);
        Ok(snapshot)
    }

    /// Undo a parent link set ahead of a failed insertion
    fn unlink(child_unit: &NodeUnit, parent: NodeId) {
        let mut state = child_unit.lock();
        if state.parent == Some(parent) {
            state.parent = None;
        }
    }

    /// Reject insertions that would create a cycle or misplace a node
    fn check_hierarchy(&self, parent_unit: &Arc<NodeUnit>, child_unit: &Arc<NodeUnit>) -> Result<()> {
        let parent = parent_unit.id();
        let child = child_unit.id();

        let accepts_children = parent_unit.lock().data.accepts_children();
        let (is_inclusive_ancestor, is_document) = {
            let state = child_unit.lock();
            (
                state.membership.contains(parent),
                matches!(state.data, NodeData::Document(_)),
            )
        };

        if !accepts_children || is_inclusive_ancestor || is_document {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        Ok(())
    }

    /// Apply `delta` to `start` and every node above it
    fn propagate(&self, start: Option<NodeId>, delta: &MembershipDelta) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }

        let limit = self.len();
        let mut cursor = start;
        let mut hops = 0usize;

        while let Some(id) = cursor {
            let unit = self.unit(id)?;
            let mut state = unit.lock();
            state.membership.apply(delta);
            cursor = state.parent;
            drop(state);

            hops += 1;
            tracing::trace!("Membership delta applied to ancestor {} (hop {})", id, hops);
            if hops > limit {
                tracing::warn!("Ancestor chain above {:?} does not terminate", start);
                break;
            }
        }

        Ok(())
    }
}
