//! Core type definitions for the headless document tree
//!
//! Key design principles:
//! 1. Use u32 for node references (4 bytes vs 8 bytes pointer)
//! 2. Closed set of node variants, shared base fields live in the unit
//! 3. Use SmallVec for child lists (most nodes have few children)
//! 4. Ordered maps for attributes so snapshots are deterministic

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Node reference
///
/// Allocated from a monotonic counter and never reused within an arena.
pub type NodeId = u32;

/// Handle for a liveness watch registered on a node
pub type WatchId = u64;

/// Child sequence storage
pub type ChildList = SmallVec<[NodeId; 4]>;

/// Node type matching DOM specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    Element = 1,
    Attribute = 2,
    Text = 3,
    CdataSection = 4,
    EntityReference = 5,
    Entity = 6,
    ProcessingInstruction = 7,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
    DocumentFragment = 11,
    Notation = 12,
}

impl NodeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(NodeType::Element),
            2 => Some(NodeType::Attribute),
            3 => Some(NodeType::Text),
            4 => Some(NodeType::CdataSection),
            5 => Some(NodeType::EntityReference),
            6 => Some(NodeType::Entity),
            7 => Some(NodeType::ProcessingInstruction),
            8 => Some(NodeType::Comment),
            9 => Some(NodeType::Document),
            10 => Some(NodeType::DocumentType),
            11 => Some(NodeType::DocumentFragment),
            12 => Some(NodeType::Notation),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeType::Element => "element",
            NodeType::Attribute => "attribute",
            NodeType::Text => "text",
            NodeType::CdataSection => "cdata-section",
            NodeType::EntityReference => "entity-reference",
            NodeType::Entity => "entity",
            NodeType::ProcessingInstruction => "processing-instruction",
            NodeType::Comment => "comment",
            NodeType::Document => "document",
            NodeType::DocumentType => "document-type",
            NodeType::DocumentFragment => "document-fragment",
            NodeType::Notation => "notation",
        }
    }
}

/// Document payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentData {
    pub url: String,
}

impl Default for DocumentData {
    fn default() -> Self {
        Self {
            url: "about:blank".to_string(),
        }
    }
}

/// Element payload: tag name plus attributes
///
/// The class list is not stored separately, it is always derived from the
/// `class` attribute so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementData {
    pub tag_name: String,
    pub attributes: BTreeMap<String, String>,
}

impl ElementData {
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
        }
    }

    /// Attribute names are case-insensitive
    pub fn attr(&self, name: &str) -> Option<&str> {
        let value = if name.bytes().any(|b| b.is_ascii_uppercase()) {
            self.attributes.get(&name.to_ascii_lowercase())
        } else {
            self.attributes.get(name)
        };
        value.map(|s| s.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        self.attributes
            .insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(&name.to_ascii_lowercase())
    }

    pub fn class_list(&self) -> SmallVec<[&str; 4]> {
        self.attr("class")
            .map(|classes| classes.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class_list().iter().any(|c| *c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let mut classes: Vec<String> = self.class_list().iter().map(|c| c.to_string()).collect();
        classes.push(class.to_string());
        self.set_attribute("class", classes.join(" "));
    }

    pub fn remove_class(&mut self, class: &str) {
        if !self.has_class(class) {
            return;
        }
        let remaining: Vec<&str> = self
            .class_list()
            .into_iter()
            .filter(|c| *c != class)
            .collect();
        let joined = remaining.join(" ");
        self.set_attribute("class", joined);
    }
}

/// Type-specific payload of a node
///
/// A closed set of variants. Base fields (parent, children, owner document,
/// properties) are shared and held by the node unit itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeData {
    Document(DocumentData),
    Element(ElementData),
    Text { data: String },
    Comment { data: String },
    DocumentFragment,
}

impl NodeData {
    pub fn element(tag_name: &str) -> Self {
        NodeData::Element(ElementData::new(tag_name))
    }

    pub fn text(data: impl Into<String>) -> Self {
        NodeData::Text { data: data.into() }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            NodeData::Document(_) => NodeType::Document,
            NodeData::Element(_) => NodeType::Element,
            NodeData::Text { .. } => NodeType::Text,
            NodeData::Comment { .. } => NodeType::Comment,
            NodeData::DocumentFragment => NodeType::DocumentFragment,
        }
    }

    /// DOM `nodeName`
    pub fn node_name(&self) -> String {
        match self {
            NodeData::Document(_) => "#document".to_string(),
            NodeData::Element(el) => el.tag_name.to_ascii_uppercase(),
            NodeData::Text { .. } => "#text".to_string(),
            NodeData::Comment { .. } => "#comment".to_string(),
            NodeData::DocumentFragment => "#document-fragment".to_string(),
        }
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match self {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match self {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Character data for text and comment nodes
    pub fn character_data(&self) -> Option<&str> {
        match self {
            NodeData::Text { data } | NodeData::Comment { data } => Some(data),
            _ => None,
        }
    }

    /// Whether nodes of this variant may hold children
    pub fn accepts_children(&self) -> bool {
        matches!(
            self,
            NodeData::Document(_) | NodeData::Element(_) | NodeData::DocumentFragment
        )
    }
}

/// Non-structural update accepted by `put` and `merge`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Field {
    Attribute { name: String, value: String },
    RemoveAttribute(String),
    AddClass(String),
    RemoveClass(String),
    ToggleClass(String),
    CharacterData(String),
    OwnerDocument(Option<NodeId>),
    /// Free-form field, used by element wrappers to declare extra state
    Property {
        name: String,
        value: serde_json::Value,
    },
}

impl Field {
    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn property(name: impl Into<String>, value: serde_json::Value) -> Self {
        Field::Property {
            name: name.into(),
            value,
        }
    }
}

/// Authoritative copy of one node's state at the time of the call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: ChildList,
    pub owner_document: Option<NodeId>,
    pub data: NodeData,
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl NodeSnapshot {
    pub fn node_type(&self) -> NodeType {
        self.data.node_type()
    }

    /// Get tag name for element nodes
    pub fn tag_name(&self) -> Option<&str> {
        self.data.as_element().map(|el| el.tag_name.as_str())
    }

    pub fn is_element(&self) -> bool {
        self.node_type() == NodeType::Element
    }

    pub fn is_text(&self) -> bool {
        self.node_type() == NodeType::Text
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.data.as_element().and_then(|el| el.attr(name))
    }

    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties.get(name)
    }
}
