use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use scribe_core::error::{Result, ScribeError};

/// A node in the swarm: one specialized agent.
///
/// The core only reads `id`. The description, tool list and instructions are
/// carried for the engine that drives the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node.
    pub id: String,
    /// Human-readable description, shown to other nodes as a handoff hint.
    pub description: String,
    /// Names of the external tools this node may call, in offer order.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Operating instructions for this node's engine.
    #[serde(default)]
    pub instructions: String,
}

impl Node {
    /// Create a new node with minimal configuration.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            tools: vec![],
            instructions: String::new(),
        }
    }

    /// Set the operating instructions.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Set the tools this node can use. Duplicates keep their first position.
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        let mut ordered: Vec<String> = Vec::with_capacity(tools.len());
        for tool in tools {
            if !ordered.contains(&tool) {
                ordered.push(tool);
            }
        }
        self.tools = ordered;
        self
    }
}

/// The fixed set of nodes of a swarm.
///
/// Populated through [`NodeRegistry::register`] while the swarm is being
/// built, then frozen behind an `Arc` so every run reads the same set.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, Arc<Node>>,
    order: Vec<String>,
    entry_point: Option<String>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Fails if the identifier is already taken.
    pub fn register(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(ScribeError::DuplicateNode(node.id));
        }
        self.order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), Arc::new(node));
        Ok(())
    }

    /// Look up a node by identifier.
    pub fn resolve(&self, id: &str) -> Result<Arc<Node>> {
        self.nodes
            .get(id)
            .cloned()
            .ok_or_else(|| ScribeError::UnknownNode(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Designate the starting node. It must already be registered.
    pub fn set_entry_point(&mut self, id: &str) -> Result<()> {
        if !self.contains(id) {
            return Err(ScribeError::InvalidEntryPoint(id.to_string()));
        }
        self.entry_point = Some(id.to_string());
        Ok(())
    }

    /// The starting node of every run.
    pub fn entry_point(&self) -> Result<Arc<Node>> {
        let id = self
            .entry_point
            .as_deref()
            .ok_or_else(|| ScribeError::InvalidEntryPoint("no entry point set".into()))?;
        self.resolve(id)
            .map_err(|_| ScribeError::InvalidEntryPoint(id.to_string()))
    }

    /// All nodes in registration order.
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
