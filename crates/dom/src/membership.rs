//! Membership index
//!
//! Every node keeps the set {self} ∪ descendants(self). Structural changes
//! produce a [`MembershipDelta`] which is applied to the changed node and
//! then to each strict ancestor in turn. The parent/child links stay the
//! source of truth; this set is derived data kept in sync by the mutation
//! protocol.

use crate::types::NodeId;
use ahash::AHashSet;

/// Set of a node plus all of its current descendants
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    members: AHashSet<NodeId>,
}

impl Membership {
    /// Fresh set for a node with no children
    pub fn of(id: NodeId) -> Self {
        let mut members = AHashSet::with_capacity(1);
        members.insert(id);
        Self { members }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.members.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<NodeId> {
        self.members.iter().copied().collect()
    }

    pub fn apply(&mut self, delta: &MembershipDelta) {
        for id in &delta.lost {
            self.members.remove(id);
        }
        self.members.extend(delta.gained.iter().copied());
    }
}

/// References gained and lost by a subtree after one structural change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDelta {
    pub gained: Vec<NodeId>,
    pub lost: Vec<NodeId>,
}

impl MembershipDelta {
    pub fn gain(members: &Membership) -> Self {
        Self {
            gained: members.to_vec(),
            lost: Vec::new(),
        }
    }

    pub fn lose(members: &Membership) -> Self {
        Self {
            gained: Vec::new(),
            lost: members.to_vec(),
        }
    }

    /// Swap one subtree for another in a single step
    pub fn swap(old: &Membership, new: &Membership) -> Self {
        Self {
            gained: new.to_vec(),
            lost: old.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gained.is_empty() && self.lost.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_gain_then_lose() {
        let mut parent = Membership::of(1);
        let mut child = Membership::of(2);
        child.apply(&MembershipDelta::gain(&Membership::of(3)));

        parent.apply(&MembershipDelta::gain(&child));
        assert_eq!(parent.len(), 3);
        assert!(parent.contains(3));

        parent.apply(&MembershipDelta::lose(&child));
        assert_eq!(parent, Membership::of(1));
    }

    #[test]
    fn test_swap_removes_before_adding() {
        let mut parent = Membership::of(1);
        parent.apply(&MembershipDelta::gain(&Membership::of(2)));

        // Replacing a node with itself must keep it present
        parent.apply(&MembershipDelta::swap(&Membership::of(2), &Membership::of(2)));
        assert!(parent.contains(2));

        parent.apply(&MembershipDelta::swap(&Membership::of(2), &Membership::of(5)));
        assert!(!parent.contains(2));
        assert!(parent.contains(5));
    }
}
