//! Node units
//!
//! A unit owns exactly one node's state behind its own lock. Every read and
//! write of that node goes through the unit, so two mutations that target
//! the same node are totally ordered while unrelated nodes never contend.

use crate::error::{DomError, Result};
use crate::membership::Membership;
use crate::types::{ChildList, Field, NodeData, NodeId, NodeSnapshot, NodeType};
use crate::watch::Watchers;
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct NodeUnit {
    id: NodeId,
    state: Mutex<NodeState>,
}

impl NodeUnit {
    pub(crate) fn new(id: NodeId, data: NodeData) -> Self {
        Self {
            id,
            state: Mutex::new(NodeState::new(id, data)),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock()
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        self.lock().snapshot(self.id)
    }
}

/// Private state of one node
#[derive(Debug)]
pub(crate) struct NodeState {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: ChildList,
    pub(crate) owner_document: Option<NodeId>,
    pub(crate) membership: Membership,
    pub(crate) data: NodeData,
    pub(crate) properties: BTreeMap<String, serde_json::Value>,
    pub(crate) watchers: Watchers,
    /// Set once, under this lock, when the unit is destroyed
    pub(crate) disposed: bool,
}

impl NodeState {
    fn new(id: NodeId, data: NodeData) -> Self {
        Self {
            parent: None,
            children: ChildList::new(),
            owner_document: None,
            membership: Membership::of(id),
            data,
            properties: BTreeMap::new(),
            watchers: Watchers::default(),
            disposed: false,
        }
    }

    pub(crate) fn snapshot(&self, id: NodeId) -> NodeSnapshot {
        NodeSnapshot {
            id,
            parent: self.parent,
            children: self.children.clone(),
            owner_document: self.owner_document,
            data: self.data.clone(),
            properties: self.properties.clone(),
        }
    }

    /// Fail with `InvalidNode` once the unit has been destroyed
    pub(crate) fn ensure_live(&self, id: NodeId) -> Result<()> {
        if self.disposed {
            return Err(DomError::InvalidNode(id));
        }
        Ok(())
    }

    pub(crate) fn child_index(&self, child: NodeId) -> Option<usize> {
        self.children.iter().position(|&id| id == child)
    }

    /// Check that a field update applies to this node's variant
    pub(crate) fn validate(&self, field: &Field) -> Result<()> {
        let actual = self.data.node_type();
        let expect = |expected: NodeType, ok: bool| {
            if ok {
                Ok(())
            } else {
                Err(DomError::InvalidNodeType {
                    expected: expected.name().to_string(),
                    actual: actual.name().to_string(),
                })
            }
        };

        match field {
            Field::Attribute { .. }
            | Field::RemoveAttribute(_)
            | Field::AddClass(_)
            | Field::RemoveClass(_)
            | Field::ToggleClass(_) => expect(NodeType::Element, actual == NodeType::Element),
            Field::CharacterData(_) => expect(
                NodeType::Text,
                matches!(actual, NodeType::Text | NodeType::Comment),
            ),
            Field::OwnerDocument(_) | Field::Property { .. } => Ok(()),
        }
    }

    /// Apply a previously validated field update
    pub(crate) fn apply(&mut self, field: Field) {
        match field {
            Field::Attribute { name, value } => {
                if let Some(el) = self.data.as_element_mut() {
                    el.set_attribute(&name, value);
                }
            }
            Field::RemoveAttribute(name) => {
                if let Some(el) = self.data.as_element_mut() {
                    el.remove_attribute(&name);
                }
            }
            Field::AddClass(class) => {
                if let Some(el) = self.data.as_element_mut() {
                    el.add_class(&class);
                }
            }
            Field::RemoveClass(class) => {
                if let Some(el) = self.data.as_element_mut() {
                    el.remove_class(&class);
                }
            }
            Field::ToggleClass(class) => {
                if let Some(el) = self.data.as_element_mut() {
                    if el.has_class(&class) {
                        el.remove_class(&class);
                    } else {
                        el.add_class(&class);
                    }
                }
            }
            Field::CharacterData(value) => match &mut self.data {
                NodeData::Text { data } | NodeData::Comment { data } => *data = value,
                _ => {}
            },
            Field::OwnerDocument(owner) => self.owner_document = owner,
            Field::Property { name, value } => {
                self.properties.insert(name, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_unit_is_its_own_member() {
        let unit = NodeUnit::new(7, NodeData::element("div"));
        let state = unit.lock();
        assert!(state.membership.contains(7));
        assert_eq!(state.membership.len(), 1);
        assert!(state.parent.is_none());
    }

    #[test]
    fn test_validate_rejects_mismatched_variant() {
        let unit = NodeUnit::new(1, NodeData::text("hello"));
        let state = unit.lock();

        assert!(matches!(
            state.validate(&Field::attribute("id", "x")),
            Err(DomError::InvalidNodeType { .. })
        ));
        assert!(state
            .validate(&Field::CharacterData("bye".to_string()))
            .is_ok());
        assert!(state
            .validate(&Field::property("checked", serde_json::json!(true)))
            .is_ok());
    }
}
