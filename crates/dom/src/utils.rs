//! Utility functions for DOM processing

use crate::arena::DomArena;
use crate::error::Result;
use crate::types::{NodeData, NodeId};
use std::ops::ControlFlow;

/// Cap text length for diagnostic output
///
/// Cuts on a character boundary at or below `max_len` bytes.
pub fn cap_text_length(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Concatenated text of every text node in the subtree, in document order
pub fn text_content(arena: &DomArena, node_id: NodeId) -> Result<String> {
    let mut text = String::new();

    arena.traverse_df(node_id, |id| {
        arena.read(id, |data| {
            if let NodeData::Text { data } = data {
                text.push_str(data);
            }
        })?;
        Ok(ControlFlow::Continue(()))
    })?;

    Ok(text)
}

/// Escape text for the markup renderer
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_text_length() {
        assert_eq!(cap_text_length("hello", 10), "hello");
        assert_eq!(cap_text_length("hello world", 5), "hello...");
        // "é" is two bytes, never split it
        assert_eq!(cap_text_length("café au lait", 4), "caf...");
    }

    #[test]
    fn test_text_content_in_document_order() {
        let arena = DomArena::new();
        let p = arena.create_element("p");
        let b = arena.create_element("b");
        arena.append_child(p, arena.create_text("Hello, ")).unwrap();
        arena.append_child(p, b).unwrap();
        arena.append_child(b, arena.create_text("world")).unwrap();
        arena.append_child(p, arena.create_comment("ignored")).unwrap();
        arena.append_child(p, arena.create_text("!")).unwrap();

        assert_eq!(text_content(&arena, p).unwrap(), "Hello, world!");
        assert_eq!(text_content(&arena, b).unwrap(), "world");
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    }
}
