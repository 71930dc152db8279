//! Headless Document Tree
//!
//! A mutable DOM-style tree for use outside a browser: test harnesses,
//! server-side tooling, scripting hosts.
//!
//! ## Core Design
//!
//! ```text
//! DomArena ── NodeId (u32) ──→ NodeUnit { Mutex<NodeState> }
//!                                   │
//!                                   ├─ parent / children      (source of truth)
//!                                   ├─ membership             ({self} ∪ descendants)
//!                                   └─ watchers               (liveness hooks)
//! ```
//!
//! - **One lock per node**: no global tree lock, no operation holds two
//!   node locks at once
//! - **Membership index**: every structural change pushes a delta up the
//!   ancestor chain, so containment checks are a set lookup
//! - **Selectors**: compiled once, matched right to left against the live tree

pub mod arena;
pub mod error;
pub mod membership;
pub mod node;
pub mod query;
pub mod selector;
pub mod serializer;
pub mod tree;
pub mod types;
pub mod utils;
pub mod watch;

pub use arena::DomArena;
pub use error::{DomError, Result};
pub use membership::{Membership, MembershipDelta};
pub use selector::SelectorList;
pub use serializer::{DomSerializer, EncodedNode, SerializerConfig};
pub use types::*;
pub use watch::NodeWatcher;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_render() {
        let arena = DomArena::new();
        let doc = arena.create_document("about:blank");
        let list = arena.create_element("ul");
        arena.append_child(doc, list).unwrap();
        for label in ["one", "two"] {
            let item = arena.create_element("li");
            arena.append_child(list, item).unwrap();
            arena.append_child(item, arena.create_text(label)).unwrap();
        }

        let items = arena.query_selector_all(doc, "ul > li").unwrap();
        assert_eq!(items.len(), 2);
        assert!(arena.contains(doc, items[1]).unwrap());

        let markup = DomSerializer::new().render(&arena, doc).unwrap();
        assert_eq!(markup, "<ul>\n  <li>\n    one\n  </li>\n  <li>\n    two\n  </li>\n</ul>\n");
    }
}
