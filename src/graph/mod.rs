//! The canonical node/edge model of an event-storming flow and its pure queries.

use crate::error::GraphError;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

mod ids;
mod payload;
mod reach;

pub use ids::*;
pub use payload::*;
pub use reach::*;

pub type NodeId = String;
pub type EdgeId = String;

/// A point on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// The vector from `self` to `other`.
    pub fn delta_to(self, other: Position) -> (f64, f64) {
        (other.x - self.x, other.y - self.y)
    }
}

/// A side of a node's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    #[default]
    Right,
    Bottom,
    Left,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Right => "right",
            Side::Bottom => "bottom",
            Side::Left => "left",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

/// The discriminant of a node's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Trigger,
    Step,
    Policy,
    PolicyOutput,
}

impl NodeKind {
    /// The `type` tag used by the flow document format.
    pub fn type_name(self) -> &'static str {
        match self {
            NodeKind::Trigger => "trigger",
            NodeKind::Step => "step",
            NodeKind::Policy => "policy",
            NodeKind::PolicyOutput => "policyOutput",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "trigger" => Some(NodeKind::Trigger),
            "step" => Some(NodeKind::Step),
            "policy" => Some(NodeKind::Policy),
            "policyOutput" => Some(NodeKind::PolicyOutput),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Kind-specific node payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeData {
    Trigger(CardData),
    Step(CardData),
    Policy(PolicyData),
    PolicyOutput(PolicyOutputData),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Trigger(_) => NodeKind::Trigger,
            NodeData::Step(_) => NodeKind::Step,
            NodeData::Policy(_) => NodeKind::Policy,
            NodeData::PolicyOutput(_) => NodeKind::PolicyOutput,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            NodeData::Trigger(card) | NodeData::Step(card) => &card.label,
            NodeData::Policy(policy) => &policy.label,
            NodeData::PolicyOutput(output) => &output.label,
        }
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        match self {
            NodeData::Trigger(card) | NodeData::Step(card) => card.label = label,
            NodeData::Policy(policy) => policy.label = label,
            NodeData::PolicyOutput(output) => output.label = label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub position: Position,
    pub data: NodeData,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, position: Position, data: NodeData) -> Self {
        Self {
            id: id.into(),
            position,
            data,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn label(&self) -> &str {
        self.data.label()
    }

    pub fn as_policy(&self) -> Option<&PolicyData> {
        match &self.data {
            NodeData::Policy(policy) => Some(policy),
            _ => None,
        }
    }

    pub fn as_policy_mut(&mut self) -> Option<&mut PolicyData> {
        match &mut self.data {
            NodeData::Policy(policy) => Some(policy),
            _ => None,
        }
    }

    pub fn as_policy_output(&self) -> Option<&PolicyOutputData> {
        match &self.data {
            NodeData::PolicyOutput(output) => Some(output),
            _ => None,
        }
    }

    pub fn as_policy_output_mut(&mut self) -> Option<&mut PolicyOutputData> {
        match &mut self.data {
            NodeData::PolicyOutput(output) => Some(output),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(id: impl Into<EdgeId>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn with_handles(mut self, source_handle: Option<String>, target_handle: Option<String>) -> Self {
        self.source_handle = source_handle;
        self.target_handle = target_handle;
        self
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// The canonical node and edge collections. Insertion order is preserved so that
/// exports and traversals are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph without validating references. Run the cleanup pass on
    /// untrusted input before handing it to the engine.
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn into_parts(self) -> (Vec<Node>, Vec<Edge>) {
        (self.nodes, self.edges)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    pub fn incident<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.touches(node_id))
    }

    pub fn is_connected(&self, node_id: &str) -> bool {
        self.incident(node_id).next().is_some()
    }

    /// The PolicyOutput node bound to `(parent_policy_id, output_id)`.
    pub fn policy_output(&self, parent_policy_id: &str, output_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| {
            n.as_policy_output()
                .is_some_and(|o| o.parent_policy_id == parent_policy_id && o.output_id == output_id)
        })
    }

    /// Every PolicyOutput node whose parent is `parent_policy_id`, in graph order.
    pub fn policy_outputs_of<'a>(
        &'a self,
        parent_policy_id: &'a str,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |n| {
            n.as_policy_output()
                .is_some_and(|o| o.parent_policy_id == parent_policy_id)
        })
    }

    pub fn insert_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.contains_node(&node.id) {
            return Err(GraphError::DuplicateNodeId(node.id));
        }
        self.nodes.push(node);
        Ok(())
    }

    pub fn insert_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        if self.edge(&edge.id).is_some() {
            return Err(GraphError::DuplicateEdgeId(edge.id));
        }
        for endpoint in [&edge.source, &edge.target] {
            if !self.contains_node(endpoint) {
                return Err(GraphError::NodeNotFound(endpoint.clone()));
            }
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Removes the given nodes together with every edge incident to them.
    /// Returns the removed nodes and edges.
    pub fn remove_nodes(&mut self, ids: &AHashSet<NodeId>) -> (Vec<Node>, Vec<Edge>) {
        let (removed_nodes, kept_nodes): (Vec<_>, Vec<_>) =
            self.nodes.drain(..).partition(|n| ids.contains(&n.id));
        self.nodes = kept_nodes;

        let (removed_edges, kept_edges): (Vec<_>, Vec<_>) = self
            .edges
            .drain(..)
            .partition(|e| ids.contains(&e.source) || ids.contains(&e.target));
        self.edges = kept_edges;

        (removed_nodes, removed_edges)
    }

    pub fn remove_edges(&mut self, ids: &AHashSet<EdgeId>) -> Vec<Edge> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.edges.drain(..).partition(|e| ids.contains(&e.id));
        self.edges = kept;
        removed
    }

    pub(crate) fn retain_edges(&mut self, keep: impl FnMut(&Edge) -> bool) {
        self.edges.retain(keep);
    }

    pub(crate) fn retain_nodes(&mut self, keep: impl FnMut(&Node) -> bool) {
        self.nodes.retain(keep);
    }

    pub(crate) fn edges_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.edges.iter_mut()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }
}
