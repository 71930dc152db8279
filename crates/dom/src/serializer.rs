//! DOM Serializer - encode subtrees and render them as markup
//!
//! This module handles:
//! - Encoding a subtree into a self-contained [`EncodedNode`] value
//! - Restoring an encoded subtree as fresh, detached nodes
//! - Rendering indented markup for diagnostics and tests

use crate::arena::DomArena;
use crate::error::Result;
use crate::types::*;
use crate::utils::{cap_text_length, escape_text};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Portable form of one node and its subtree
///
/// The parent is kept as an identifier only; children are nested in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub data: NodeData,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<EncodedNode>,
}

impl DomArena {
    /// Encode `id` and everything below it
    pub fn encode(&self, id: NodeId) -> Result<EncodedNode> {
        let mut visited = AHashSet::new();
        self.encode_node(id, &mut visited)
    }

    fn encode_node(&self, id: NodeId, visited: &mut AHashSet<NodeId>) -> Result<EncodedNode> {
        visited.insert(id);
        let snapshot = self.get(id)?;

        let mut children = Vec::with_capacity(snapshot.children.len());
        for &child in &snapshot.children {
            if visited.contains(&child) {
                tracing::warn!("Node {} reached twice while encoding, skipping", child);
                continue;
            }
            children.push(self.encode_node(child, visited)?);
        }

        Ok(EncodedNode {
            id,
            parent: snapshot.parent,
            data: snapshot.data,
            properties: snapshot.properties,
            children,
        })
    }

    /// Encode a subtree straight to JSON
    pub fn to_json(&self, id: NodeId) -> Result<String> {
        Ok(serde_json::to_string(&self.encode(id)?)?)
    }

    /// Rebuild an encoded subtree as fresh detached nodes
    ///
    /// Encoded ids are not reused; the returned root has no parent.
    pub fn restore(&self, encoded: &EncodedNode) -> Result<NodeId> {
        let id = self.create(encoded.data.clone());
        if !encoded.properties.is_empty() {
            self.merge(
                id,
                encoded
                    .properties
                    .iter()
                    .map(|(name, value)| Field::property(name.clone(), value.clone())),
            )?;
        }

        for child in &encoded.children {
            let child_id = self.restore(child)?;
            self.append_child(id, child_id)?;
        }
        Ok(id)
    }

    /// Restore a subtree from its JSON encoding
    pub fn restore_json(&self, json: &str) -> Result<NodeId> {
        let encoded: EncodedNode = serde_json::from_str(json)?;
        self.restore(&encoded)
    }
}

/// Serializer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    pub indent: usize,
    pub max_text_length: usize,
    pub include_comments: bool,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            indent: 2,
            max_text_length: 200,
            include_comments: true,
        }
    }
}

/// Markup renderer
pub struct DomSerializer {
    config: SerializerConfig,
}

impl DomSerializer {
    pub fn new() -> Self {
        Self::with_config(SerializerConfig::default())
    }

    pub fn with_config(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// Render a subtree as indented markup
    pub fn render(&self, arena: &DomArena, root: NodeId) -> Result<String> {
        let mut output = String::with_capacity(4096);
        self.render_node(arena, root, 0, &mut output)?;
        Ok(output)
    }

    fn render_node(
        &self,
        arena: &DomArena,
        node_id: NodeId,
        depth: usize,
        output: &mut String,
    ) -> Result<()> {
        let node = arena.get(node_id)?;
        let indent = " ".repeat(depth * self.config.indent);

        match &node.data {
            NodeData::Element(el) => {
                // Format: <tag id="123" class="foo">
                output.push_str(&indent);
                output.push('<');
                output.push_str(&el.tag_name);
                for (name, value) in &el.attributes {
                    output.push_str(&format!(" {}=\"{}\"", name, escape_text(value)));
                }

                if node.children.is_empty() {
                    output.push_str(" />\n");
                    return Ok(());
                }
                output.push_str(">\n");

                for &child_id in &node.children {
                    self.render_node(arena, child_id, depth + 1, output)?;
                }

                output.push_str(&indent);
                output.push_str("</");
                output.push_str(&el.tag_name);
                output.push_str(">\n");
            }
            NodeData::Text { data } => {
                let text = data.trim();
                if !text.is_empty() {
                    output.push_str(&indent);
                    output.push_str(&escape_text(&cap_text_length(
                        text,
                        self.config.max_text_length,
                    )));
                    output.push('\n');
                }
            }
            NodeData::Comment { data } => {
                if self.config.include_comments {
                    output.push_str(&indent);
                    output.push_str("<!--");
                    output.push_str(&cap_text_length(data, self.config.max_text_length));
                    output.push_str("-->\n");
                }
            }
            NodeData::Document(_) | NodeData::DocumentFragment => {
                // Containers render their children in place
                for &child_id in &node.children {
                    self.render_node(arena, child_id, depth, output)?;
                }
            }
        }

        Ok(())
    }
}

impl Default for DomSerializer {
    fn default() -> Self {
        Self::new()
    }
}
