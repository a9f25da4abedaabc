use serde::{Deserialize, Serialize};

use crate::{EdgeId, NodeId};

fn default_node_kind() -> String {
    "bus".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopologyNode {
    pub id: NodeId,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default = "default_node_kind")]
    pub kind: String,
    /// Base voltage class in kV; the service sends `null` when unknown.
    #[serde(default)]
    pub kv: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl TopologyNode {
    pub fn bus(id: &str, kv: Option<f64>) -> Self {
        Self {
            id: NodeId::new(id),
            label: id.to_string(),
            kind: default_node_kind(),
            kv,
            x: None,
            y: None,
        }
    }

    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id.0
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Line,
    Transformer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopologyEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    #[serde(default)]
    pub label: String,
}

impl TopologyEdge {
    pub fn line(id: &str, source: &str, target: &str) -> Self {
        Self {
            id: EdgeId::new(id),
            source: NodeId::new(source),
            target: NodeId::new(target),
            kind: EdgeKind::Line,
            label: id.to_string(),
        }
    }

    pub fn transformer(id: &str, source: &str, target: &str) -> Self {
        Self {
            kind: EdgeKind::Transformer,
            ..Self::line(id, source, target)
        }
    }
}

/// Buses plus the lines and transformers connecting them. Replaced wholesale
/// on every fetch, never patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Topology {
    #[serde(default)]
    pub nodes: Vec<TopologyNode>,
    #[serde(default)]
    pub edges: Vec<TopologyEdge>,
}

impl Topology {
    pub fn new(nodes: Vec<TopologyNode>, edges: Vec<TopologyEdge>) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&TopologyNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Edges whose source or target is not a known node.
    pub fn dangling_edges(&self) -> impl Iterator<Item = &TopologyEdge> {
        self.edges
            .iter()
            .filter(move |e| !self.contains(&e.source) || !self.contains(&e.target))
    }
}
