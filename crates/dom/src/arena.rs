//! Arena of node units
//!
//! ## Memory Layout
//!
//! ```text
//! Arena: DashMap<NodeId, Arc<NodeUnit>>   (sharded, no global tree lock)
//!                     ↓
//!        NodeUnit { Mutex<NodeState> }    (one lock per node)
//! ```
//!
//! Lookups clone the unit's `Arc` and release the shard before locking the
//! node, and no operation holds two node locks at the same time. Multi-node
//! operations are a bounded sequence of single-node exchanges.

use crate::error::{DomError, Result};
use crate::node::NodeUnit;
use crate::types::{
    ChildList, DocumentData, Field, NodeData, NodeId, NodeSnapshot, WatchId,
};
use crate::watch::NodeWatcher;
use ahash::{AHashSet, RandomState};
use dashmap::DashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Owner of every live node unit
#[derive(Debug)]
pub struct DomArena {
    nodes: DashMap<NodeId, Arc<NodeUnit>, RandomState>,

    /// Monotonic, ids are never handed out twice
    next_id: AtomicU32,

    next_watch: AtomicU64,
}

impl DomArena {
    /// Create a new empty arena
    pub fn new() -> Self {
        Self::with_capacity(1024) // Pre-allocate for typical page
    }

    /// Create arena with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: DashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            next_id: AtomicU32::new(0),
            next_watch: AtomicU64::new(1),
        }
    }

    /// Create a detached node, returns its reference
    pub fn create(&self, data: NodeData) -> NodeId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("Created {} node {}", data.node_type().name(), id);
        self.nodes.insert(id, Arc::new(NodeUnit::new(id, data)));
        id
    }

    pub fn create_element(&self, tag_name: &str) -> NodeId {
        self.create(NodeData::element(tag_name))
    }

    pub fn create_text(&self, data: impl Into<String>) -> NodeId {
        self.create(NodeData::text(data))
    }

    pub fn create_comment(&self, data: impl Into<String>) -> NodeId {
        self.create(NodeData::Comment { data: data.into() })
    }

    pub fn create_document(&self, url: impl Into<String>) -> NodeId {
        self.create(NodeData::Document(DocumentData { url: url.into() }))
    }

    pub fn create_fragment(&self) -> NodeId {
        self.create(NodeData::DocumentFragment)
    }

    pub(crate) fn unit(&self, id: NodeId) -> Result<Arc<NodeUnit>> {
        self.nodes
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(DomError::InvalidNode(id))
    }

    /// Read a node's payload without cloning it
    pub(crate) fn read<R>(&self, id: NodeId, f: impl FnOnce(&NodeData) -> R) -> Result<R> {
        let unit = self.unit(id)?;
        let state = unit.lock();
        Ok(f(&state.data))
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get an authoritative copy of a node
    pub fn get(&self, id: NodeId) -> Result<NodeSnapshot> {
        Ok(self.unit(id)?.snapshot())
    }

    /// Update one non-structural field
    pub fn put(&self, id: NodeId, field: Field) -> Result<NodeSnapshot> {
        self.merge(id, [field])
    }

    /// Update several non-structural fields in one exchange
    ///
    /// Either every field applies or none does.
    pub fn merge(&self, id: NodeId, fields: impl IntoIterator<Item = Field>) -> Result<NodeSnapshot> {
        let fields: Vec<Field> = fields.into_iter().collect();
        let unit = self.unit(id)?;
        let mut state = unit.lock();
        state.ensure_live(id)?;

        for field in &fields {
            state.validate(field)?;
        }
        for field in fields {
            state.apply(field);
        }

        Ok(state.snapshot(id))
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.unit(id)?.lock().parent)
    }

    pub fn children(&self, id: NodeId) -> Result<ChildList> {
        Ok(self.unit(id)?.lock().children.clone())
    }

    /// Strict ancestors, nearest first
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let limit = self.nodes.len();
        let mut ancestors = Vec::new();
        let mut cursor = self.parent(id)?;

        while let Some(ancestor) = cursor {
            if ancestors.len() > limit {
                tracing::warn!("Parent chain of {} does not terminate, truncating", id);
                break;
            }
            ancestors.push(ancestor);
            cursor = self.parent(ancestor)?;
        }

        Ok(ancestors)
    }

    /// Path from the root-most ancestor down to `id` (inclusive)
    pub fn ancestor_chain(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut chain = self.ancestors(id)?;
        chain.reverse();
        chain.push(id);
        Ok(chain)
    }

    /// Inclusive containment, answered from the membership index
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> Result<bool> {
        Ok(self.unit(ancestor)?.lock().membership.contains(node))
    }

    /// Every current descendant of `id`, in no particular order
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let unit = self.unit(id)?;
        let state = unit.lock();
        Ok(state.membership.iter().filter(|&member| member != id).collect())
    }

    /// Size of the membership set ({id} plus descendants)
    pub fn subtree_size(&self, id: NodeId) -> Result<usize> {
        Ok(self.unit(id)?.lock().membership.len())
    }

    /// Traverse a subtree depth-first in document order (iterative, no recursion)
    ///
    /// No node lock is held while `visit` runs, so the visitor may call back
    /// into the arena.
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(NodeId) -> Result<ControlFlow<()>>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let children = self.children(node_id)?;
            if visit(node_id)?.is_break() {
                break;
            }

            // Push children in reverse order (so they're visited left-to-right)
            stack.extend(children.iter().rev().copied());
        }

        Ok(())
    }

    /// Attach a liveness watcher to a node
    pub fn watch(&self, id: NodeId, watcher: Arc<dyn NodeWatcher>) -> Result<WatchId> {
        let unit = self.unit(id)?;
        self.watch_unit(&unit, watcher)
    }

    /// The watcher is either notified by the disposal or rejected here
    pub(crate) fn watch_unit(&self, unit: &NodeUnit, watcher: Arc<dyn NodeWatcher>) -> Result<WatchId> {
        let mut state = unit.lock();
        state.ensure_live(unit.id())?;
        let watch_id = self.next_watch.fetch_add(1, Ordering::Relaxed);
        state.watchers.add(watch_id, watcher);
        Ok(watch_id)
    }

    /// Detach a watcher; returns false if the node or the watch is gone
    pub fn unwatch(&self, id: NodeId, watch: WatchId) -> bool {
        match self.unit(id) {
            Ok(unit) => unit.lock().watchers.remove(watch),
            Err(_) => false,
        }
    }

    pub fn watcher_count(&self, id: NodeId) -> Result<usize> {
        Ok(self.unit(id)?.lock().watchers.len())
    }

    /// Destroy one node unit
    ///
    /// The node is detached from its parent, its children become detached
    /// roots (they stay live), and its watchers are notified.
    pub fn dispose(&self, id: NodeId) -> Result<()> {
        let unit = self.unit(id)?;

        let parent = unit.lock().parent;
        if let Some(parent) = parent {
            self.detach_for_disposal(parent, id);
        }

        let (children, watchers, late_parent) = {
            let mut state = unit.lock();
            state.ensure_live(id)?;
            state.disposed = true;
            (
                std::mem::take(&mut state.children),
                std::mem::take(&mut state.watchers),
                state.parent,
            )
        };
        // Re-attached between the first detach and the flag
        if let Some(parent) = late_parent {
            self.detach_for_disposal(parent, id);
        }
        self.nodes.remove(&id);

        for child in children {
            self.orphan(id, child);
        }

        tracing::debug!("Disposed node {}", id);
        watchers.notify_all(id);
        Ok(())
    }

    /// Destroy a node together with every member of its subtree
    ///
    /// Returns the number of disposed units.
    pub fn dispose_subtree(&self, id: NodeId) -> Result<usize> {
        let unit = self.unit(id)?;

        let parent = unit.lock().parent;
        if let Some(parent) = parent {
            self.remove_child(parent, id)?;
        }

        let members = unit.lock().membership.to_vec();
        let doomed: AHashSet<NodeId> = members.iter().copied().collect();
        let mut orphans = Vec::new();
        let mut disposed = 0;

        for member in members {
            let Ok(member_unit) = self.unit(member) else {
                continue;
            };
            let (watchers, late_parent) = {
                let mut state = member_unit.lock();
                if state.disposed {
                    continue;
                }
                state.disposed = true;
                // Children attached after the membership was read
                orphans.extend(
                    state
                        .children
                        .iter()
                        .filter(|child| !doomed.contains(child))
                        .map(|&child| (member, child)),
                );
                (
                    std::mem::take(&mut state.watchers),
                    state.parent.filter(|_| member == id),
                )
            };

            if let Some(parent) = late_parent {
                self.detach_for_disposal(parent, id);
            }
            self.nodes.remove(&member);
            watchers.notify_all(member);
            disposed += 1;
        }

        for (member, child) in orphans {
            self.orphan(member, child);
        }

        tracing::debug!("Disposed subtree {} ({} nodes)", id, disposed);
        Ok(disposed)
    }

    fn detach_for_disposal(&self, parent: NodeId, id: NodeId) {
        if let Err(e) = self.remove_child(parent, id) {
            tracing::warn!("Detaching {} from {} during disposal failed: {}", id, parent, e);
        }
    }

    /// Clear `child`'s parent link if it still points at the dead `parent`
    fn orphan(&self, parent: NodeId, child: NodeId) {
        if let Ok(child_unit) = self.unit(child) {
            let mut state = child_unit.lock();
            if state.parent == Some(parent) {
                state.parent = None;
            }
        }
    }

    /// Total number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All live node IDs, in no particular order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for DomArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        disposed: Mutex<Vec<NodeId>>,
    }

    impl NodeWatcher for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn on_dispose(&self, node: NodeId) {
            self.disposed.lock().unwrap().push(node);
        }
    }

    #[test]
    fn test_arena_basic() {
        let arena = DomArena::new();

        let id = arena.create_element("div");
        assert_eq!(id, 0);

        let retrieved = arena.get(id).unwrap();
        assert_eq!(retrieved.tag_name(), Some("div"));
        assert!(retrieved.parent.is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let arena = DomArena::new();
        let first = arena.create_element("div");
        arena.dispose(first).unwrap();

        let second = arena.create_element("div");
        assert_ne!(first, second);
        assert!(matches!(arena.get(first), Err(DomError::InvalidNode(id)) if id == first));
    }

    #[test]
    fn test_put_and_merge_fields() {
        let arena = DomArena::new();
        let id = arena.create_element("input");

        let snapshot = arena.put(id, Field::attribute("type", "checkbox")).unwrap();
        assert_eq!(snapshot.attr("type"), Some("checkbox"));

        let snapshot = arena
            .merge(
                id,
                [
                    Field::AddClass("toggle".to_string()),
                    Field::property("checked", serde_json::json!(true)),
                ],
            )
            .unwrap();
        assert_eq!(snapshot.attr("class"), Some("toggle"));
        assert_eq!(snapshot.property("checked"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn test_merge_is_all_or_nothing() {
        let arena = DomArena::new();
        let id = arena.create_text("hello");

        let result = arena.merge(
            id,
            [
                Field::CharacterData("changed".to_string()),
                Field::attribute("id", "nope"),
            ],
        );
        assert!(matches!(result, Err(DomError::InvalidNodeType { .. })));

        let snapshot = arena.get(id).unwrap();
        assert_eq!(snapshot.data.character_data(), Some("hello"));
    }

    #[test]
    fn test_traverse_df() {
        let arena = DomArena::new();

        // Create tree: root -> [child1 -> [grandchild], child2]
        let root = arena.create_element("div");
        let child1 = arena.create_element("span");
        let child2 = arena.create_element("span");
        let grandchild = arena.create_text("x");
        arena.append_child(root, child1).unwrap();
        arena.append_child(root, child2).unwrap();
        arena.append_child(child1, grandchild).unwrap();

        let mut visited = Vec::new();
        arena
            .traverse_df(root, |id| {
                visited.push(id);
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();

        assert_eq!(visited, vec![root, child1, grandchild, child2]);
    }

    #[test]
    fn test_ancestor_chain_is_root_first() {
        let arena = DomArena::new();
        let a = arena.create_element("html");
        let b = arena.create_element("body");
        let c = arena.create_element("p");
        arena.append_child(a, b).unwrap();
        arena.append_child(b, c).unwrap();

        assert_eq!(arena.ancestors(c).unwrap(), vec![b, a]);
        assert_eq!(arena.ancestor_chain(c).unwrap(), vec![a, b, c]);
        assert_eq!(arena.ancestor_chain(a).unwrap(), vec![a]);
    }

    #[test]
    fn test_dispose_notifies_watchers_and_detaches() {
        let arena = DomArena::new();
        let parent = arena.create_element("ul");
        let item = arena.create_element("li");
        let text = arena.create_text("one");
        arena.append_child(parent, item).unwrap();
        arena.append_child(item, text).unwrap();

        let recorder = Arc::new(Recorder {
            disposed: Mutex::new(Vec::new()),
        });
        arena.watch(item, recorder.clone()).unwrap();

        arena.dispose(item).unwrap();

        assert_eq!(*recorder.disposed.lock().unwrap(), vec![item]);
        assert!(!arena.is_live(item));
        assert!(arena.children(parent).unwrap().is_empty());
        assert!(!arena.contains(parent, text).unwrap());
        // Children survive as detached roots
        assert_eq!(arena.parent(text).unwrap(), None);
    }

    #[test]
    fn test_unwatch() {
        let arena = DomArena::new();
        let node = arena.create_element("div");
        let recorder = Arc::new(Recorder {
            disposed: Mutex::new(Vec::new()),
        });

        let watch = arena.watch(node, recorder.clone()).unwrap();
        assert_eq!(arena.watcher_count(node).unwrap(), 1);
        assert!(arena.unwatch(node, watch));
        assert!(!arena.unwatch(node, watch));

        arena.dispose(node).unwrap();
        assert!(recorder.disposed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_watch_after_dispose_is_rejected() {
        let arena = DomArena::new();
        let node = arena.create_element("div");
        let unit = arena.unit(node).unwrap();
        let recorder = Arc::new(Recorder {
            disposed: Mutex::new(Vec::new()),
        });

        // Lookup done, disposal lands before the lock is taken
        arena.dispose(node).unwrap();

        assert!(matches!(
            arena.watch_unit(&unit, recorder.clone()),
            Err(DomError::InvalidNode(id)) if id == node
        ));
        assert!(matches!(
            arena.dispose(node),
            Err(DomError::InvalidNode(_))
        ));
        assert!(recorder.disposed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispose_subtree() {
        let arena = DomArena::new();
        let root = arena.create_element("div");
        let section = arena.create_element("section");
        let p = arena.create_element("p");
        arena.append_child(root, section).unwrap();
        arena.append_child(section, p).unwrap();

        let recorder = Arc::new(Recorder {
            disposed: Mutex::new(Vec::new()),
        });
        arena.watch(p, recorder.clone()).unwrap();

        assert_eq!(arena.dispose_subtree(section).unwrap(), 2);
        assert!(!arena.is_live(section));
        assert!(!arena.is_live(p));
        assert_eq!(arena.subtree_size(root).unwrap(), 1);
        assert_eq!(*recorder.disposed.lock().unwrap(), vec![p]);
    }
}
