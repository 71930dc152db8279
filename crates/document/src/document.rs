//! Document facade
//!
//! The high-level API: one arena, one document node and one running
//! listener registry, wired together.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dispatch::{self, Event};
use crate::error::Result;
use crate::events::RegistryEvent;
use crate::registry::{EventRegistry, Listener, ListenerId, RegistryConfig, RegistryHandle};
use dom::{
    DomArena, DomSerializer, EncodedNode, Field, NodeData, NodeId, NodeSnapshot, SelectorList,
    SerializerConfig,
};

/// Document configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub id: String,
    pub url: String,
    pub arena_capacity: usize,
    pub registry: RegistryConfig,
    pub serializer: SerializerConfig,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            url: "about:blank".to_string(),
            arena_capacity: 1024,
            registry: RegistryConfig::default(),
            serializer: SerializerConfig::default(),
        }
    }
}

pub struct Document {
    pub config: DocumentConfig,
    arena: Arc<DomArena>,
    root: NodeId,
    registry: EventRegistry,
    serializer: DomSerializer,
}

impl Document {
    /// Build the tree and start the registry. Must be called from within a
    /// Tokio runtime.
    pub fn new(config: DocumentConfig) -> Self {
        let arena = Arc::new(DomArena::with_capacity(config.arena_capacity));
        let root = arena.create_document(config.url.clone());

        let mut registry_config = config.registry.clone();
        registry_config.name = format!("{}:{}", registry_config.name, config.id);
        let registry = EventRegistry::start(Arc::clone(&arena), registry_config);

        tracing::info!("Document {} created for {}", config.id, config.url);
        Self {
            serializer: DomSerializer::with_config(config.serializer.clone()),
            config,
            arena,
            root,
            registry,
        }
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn arena(&self) -> &Arc<DomArena> {
        &self.arena
    }

    pub fn registry(&self) -> &RegistryHandle {
        self.registry.handle()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.registry.subscribe()
    }

    fn adopt(&self, data: NodeData) -> Result<NodeId> {
        let id = self.arena.create(data);
        self.arena.put(id, Field::OwnerDocument(Some(self.root)))?;
        Ok(id)
    }

    pub fn create_element(&self, tag_name: &str) -> Result<NodeId> {
        self.adopt(NodeData::element(tag_name))
    }

    pub fn create_text(&self, data: impl Into<String>) -> Result<NodeId> {
        self.adopt(NodeData::text(data))
    }

    pub fn create_comment(&self, data: impl Into<String>) -> Result<NodeId> {
        self.adopt(NodeData::Comment { data: data.into() })
    }

    pub fn create_fragment(&self) -> Result<NodeId> {
        self.adopt(NodeData::DocumentFragment)
    }

    pub fn get(&self, id: NodeId) -> Result<NodeSnapshot> {
        Ok(self.arena.get(id)?)
    }

    pub fn put(&self, id: NodeId, field: Field) -> Result<NodeSnapshot> {
        Ok(self.arena.put(id, field)?)
    }

    pub fn merge(&self, id: NodeId, fields: impl IntoIterator<Item = Field>) -> Result<NodeSnapshot> {
        Ok(self.arena.merge(id, fields)?)
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<NodeSnapshot> {
        Ok(self.arena.append_child(parent, child)?)
    }

    pub fn insert_before(&self, parent: NodeId, new: NodeId, reference: NodeId) -> Result<NodeSnapshot> {
        Ok(self.arena.insert_before(parent, new, reference)?)
    }

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<NodeSnapshot> {
        Ok(self.arena.remove_child(parent, child)?)
    }

    pub fn replace_child(&self, parent: NodeId, new: NodeId, old: NodeId) -> Result<NodeSnapshot> {
        Ok(self.arena.replace_child(parent, new, old)?)
    }

    /// First match anywhere in the document
    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.arena.query_selector(self.root, selector)?)
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        Ok(self.arena.query_selector_all(self.root, selector)?)
    }

    pub fn closest(&self, id: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let list = SelectorList::compile(selector)?;
        Ok(self.arena.closest(id, &list)?)
    }

    pub fn get_element_by_id(&self, element_id: &str) -> Result<Option<NodeId>> {
        Ok(self.arena.get_element_by_id(self.root, element_id)?)
    }

    pub async fn add_event_listener(
        &self,
        node: NodeId,
        event_type: impl Into<String>,
        listener: Listener,
        capture: bool,
    ) -> Result<ListenerId> {
        self.registry()
            .add_listener(node, event_type, listener, capture)
            .await
    }

    pub async fn remove_event_listener(
        &self,
        node: NodeId,
        event_type: &str,
        listener: &Listener,
        capture: bool,
    ) -> Result<bool> {
        self.registry()
            .remove_listener(node, event_type, listener, capture)
            .await
    }

    pub async fn dispatch_event(&self, target: NodeId, event: Event) -> Result<Event> {
        dispatch::dispatch_event(&self.arena, self.registry(), target, event).await
    }

    pub fn encode(&self, id: NodeId) -> Result<EncodedNode> {
        Ok(self.arena.encode(id)?)
    }

    /// Rebuild an encoded subtree inside this document
    pub fn restore(&self, encoded: &EncodedNode) -> Result<NodeId> {
        let id = self.arena.restore(encoded)?;
        let mut adopted = Vec::new();
        self.arena.traverse_df(id, |node| {
            adopted.push(node);
            Ok(std::ops::ControlFlow::Continue(()))
        })?;
        for node in adopted {
            self.arena.put(node, Field::OwnerDocument(Some(self.root)))?;
        }
        Ok(id)
    }

    /// Markup of the whole document
    pub fn render(&self) -> Result<String> {
        self.render_node(self.root)
    }

    pub fn render_node(&self, id: NodeId) -> Result<String> {
        Ok(self.serializer.render(&self.arena, id)?)
    }

    /// Destroy one node; its listeners are purged by the registry
    pub fn dispose(&self, id: NodeId) -> Result<()> {
        Ok(self.arena.dispose(id)?)
    }

    pub fn dispose_subtree(&self, id: NodeId) -> Result<usize> {
        Ok(self.arena.dispose_subtree(id)?)
    }

    /// Stop the registry; the tree itself stays readable
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down document {}", self.config.id);
        self.registry.stop().await
    }
}
