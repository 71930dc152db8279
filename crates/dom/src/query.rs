//! Query operations built on the selector engine
//!
//! Results are in document order: pre-order depth-first over child
//! sequences, with the query root itself excluded.

use crate::arena::DomArena;
use crate::error::Result;
use crate::selector::{matcher::matches_list, SelectorList};
use crate::types::NodeId;
use std::ops::ControlFlow;

impl DomArena {
    /// First match under `root`, compiling `selector` for this call only
    pub fn query_selector(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let list = SelectorList::compile(selector)?;
        self.select_first(root, &list)
    }

    /// Every match under `root`
    pub fn query_selector_all(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let list = SelectorList::compile(selector)?;
        self.select(root, &list)
    }

    /// Evaluate a pre-compiled list under `root`
    pub fn select(&self, root: NodeId, list: &SelectorList) -> Result<Vec<NodeId>> {
        let mut found = Vec::new();
        self.traverse_df(root, |id| {
            if id != root && matches_list(self, id, list)? {
                found.push(id);
            }
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(found)
    }

    pub fn select_first(&self, root: NodeId, list: &SelectorList) -> Result<Option<NodeId>> {
        let mut found = None;
        self.traverse_df(root, |id| {
            if id != root && matches_list(self, id, list)? {
                found = Some(id);
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(found)
    }

    /// Nearest inclusive ancestor of `id` matching `list`
    pub fn closest(&self, id: NodeId, list: &SelectorList) -> Result<Option<NodeId>> {
        if matches_list(self, id, list)? {
            return Ok(Some(id));
        }
        for ancestor in self.ancestors(id)? {
            if matches_list(self, ancestor, list)? {
                return Ok(Some(ancestor));
            }
        }
        Ok(None)
    }

    /// First element under `root` whose `id` attribute equals `element_id`
    pub fn get_element_by_id(&self, root: NodeId, element_id: &str) -> Result<Option<NodeId>> {
        let mut found = None;
        self.traverse_df(root, |id| {
            if id != root && self.read(id, |data| {
                data.as_element().and_then(|el| el.id()) == Some(element_id)
            })? {
                found = Some(id);
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomError;
    use crate::types::Field;

    /// `<div id="main"><p class="note">A</p><span><p class="note">B</p></span></div>`
    fn main_tree(arena: &DomArena) -> (NodeId, NodeId, NodeId, NodeId) {
        let doc = arena.create_document("about:blank");
        let main = arena.create_element("div");
        arena.put(main, Field::attribute("id", "main")).unwrap();
        arena.append_child(doc, main).unwrap();

        let a = arena.create_element("p");
        arena.put(a, Field::attribute("class", "note")).unwrap();
        arena.append_child(main, a).unwrap();
        arena.append_child(a, arena.create_text("A")).unwrap();

        let span = arena.create_element("span");
        arena.append_child(main, span).unwrap();
        let b = arena.create_element("p");
        arena.put(b, Field::attribute("class", "note")).unwrap();
        arena.append_child(span, b).unwrap();
        arena.append_child(b, arena.create_text("B")).unwrap();

        (doc, main, a, b)
    }

    #[test]
    fn test_child_and_descendant_queries() {
        let arena = DomArena::new();
        let (doc, main, a, b) = main_tree(&arena);

        assert_eq!(arena.query_selector_all(doc, "div#main > p.note").unwrap(), vec![a]);
        assert_eq!(arena.query_selector_all(doc, "div#main p.note").unwrap(), vec![a, b]);

        // Combinators may reach above the query root
        assert_eq!(arena.query_selector_all(main, "div#main > p.note").unwrap(), vec![a]);
    }

    #[test]
    fn test_root_is_excluded() {
        let arena = DomArena::new();
        let (doc, main, a, _) = main_tree(&arena);

        assert_eq!(arena.query_selector_all(main, "div").unwrap(), Vec::<NodeId>::new());
        assert_eq!(arena.query_selector(doc, "div").unwrap(), Some(main));
        assert_eq!(arena.query_selector(main, "p").unwrap(), Some(a));
        assert_eq!(arena.query_selector(main, "table").unwrap(), None);
    }

    #[test]
    fn test_not_query() {
        let arena = DomArena::new();
        let doc = arena.create_document("about:blank");
        let container = arena.create_element("div");
        arena.put(container, Field::attribute("class", "container")).unwrap();
        arena.append_child(doc, container).unwrap();

        let inactive = arena.create_element("p");
        arena.put(inactive, Field::attribute("data-status", "inactive")).unwrap();
        arena.append_child(container, inactive).unwrap();
        let active = arena.create_element("p");
        arena.put(active, Field::attribute("data-status", "active")).unwrap();
        arena.append_child(container, active).unwrap();

        let divs = arena
            .query_selector_all(doc, r#"div:not(.container > p[data-status="active"])"#)
            .unwrap();
        assert_eq!(divs, vec![container]);

        let ps = arena
            .query_selector_all(doc, r#"p:not(.container > p[data-status="active"])"#)
            .unwrap();
        assert_eq!(ps, vec![inactive]);
    }

    #[test]
    fn test_compiled_list_is_reusable() {
        let arena = DomArena::new();
        let (doc, _, a, b) = main_tree(&arena);

        let list = SelectorList::compile("p.note").unwrap();
        assert_eq!(list.evaluate(&arena, doc).unwrap(), vec![a, b]);
        arena.put(a, Field::RemoveClass("note".to_string())).unwrap();
        assert_eq!(list.evaluate(&arena, doc).unwrap(), vec![b]);
        assert_eq!(arena.select_first(doc, &list).unwrap(), Some(b));
    }

    #[test]
    fn test_closest() {
        let arena = DomArena::new();
        let (_, main, a, b) = main_tree(&arena);

        let list = SelectorList::compile("div").unwrap();
        assert_eq!(arena.closest(b, &list).unwrap(), Some(main));
        assert_eq!(arena.closest(main, &list).unwrap(), Some(main));
        assert_eq!(arena.closest(a, &"table".parse().unwrap()).unwrap(), None);
    }

    #[test]
    fn test_get_element_by_id() {
        let arena = DomArena::new();
        let (doc, main, _, _) = main_tree(&arena);

        assert_eq!(arena.get_element_by_id(doc, "main").unwrap(), Some(main));
        assert_eq!(arena.get_element_by_id(doc, "missing").unwrap(), None);
    }

    #[test]
    fn test_bad_selector_and_dead_root() {
        let arena = DomArena::new();
        let (doc, _, _, _) = main_tree(&arena);

        assert!(matches!(
            arena.query_selector_all(doc, "div >"),
            Err(DomError::SelectorSyntax { .. })
        ));
        assert!(matches!(
            arena.query_selector(4242, "div"),
            Err(DomError::InvalidNode(4242))
        ));
    }
}
