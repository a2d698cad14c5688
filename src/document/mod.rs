//! The JSON flow document used for export, import and the persisted snapshot.
//!
//! ```json
//! { "nodes": [{ "id", "type", "position", "data" }],
//!   "edges": [{ "id", "source", "sourceHandle", "target", "targetHandle" }] }
//! ```
//!
//! Node payloads stay as raw JSON until the `type` tag selects the payload shape.

use crate::error::ImportError;
use crate::graph::{CardData, Edge, Graph, Node, NodeData, NodeKind, PolicyData, PolicyOutputData, Position};
use ahash::AHashSet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

mod cleanup;

pub use cleanup::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: String,
    pub source: String,
    #[serde(default, alias = "source_handle", rename = "sourceHandle")]
    pub source_handle: Option<String>,
    pub target: String,
    #[serde(default, alias = "target_handle", rename = "targetHandle")]
    pub target_handle: Option<String>,
}

/// A trait for documents that can be converted into a [`Graph`].
///
/// This is the extension point for other flow formats: convert your own structs into a
/// graph and the rest of the crate (cleanup, session, engine) works unchanged.
pub trait IntoGraph {
    /// Consumes the document and converts it into a graph. References are not
    /// validated; run [`cleanup`] afterwards.
    fn into_graph(self) -> Result<Graph, ImportError>;
}

impl FlowDocument {
    /// Parses a document, reporting a missing `nodes`/`edges` key explicitly.
    pub fn from_json(json: &str) -> Result<Self, ImportError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ImportError::JsonParseError(e.to_string()))?;
        for key in ["nodes", "edges"] {
            if value.get(key).is_none() {
                return Err(ImportError::MissingKey(key));
            }
        }
        serde_json::from_value(value).map_err(|e| ImportError::JsonParseError(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> String {
        // Documents hold only strings, numbers and JSON values: serialization cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_graph(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .iter()
            .map(|node| NodeRecord {
                id: node.id.clone(),
                node_type: node.kind().type_name().to_string(),
                position: node.position,
                data: payload_to_value(&node.data),
            })
            .collect();
        let edges = graph
            .edges()
            .iter()
            .map(|edge| EdgeRecord {
                id: edge.id.clone(),
                source: edge.source.clone(),
                source_handle: edge.source_handle.clone(),
                target: edge.target.clone(),
                target_handle: edge.target_handle.clone(),
            })
            .collect();
        Self { nodes, edges }
    }
}

impl IntoGraph for FlowDocument {
    fn into_graph(self) -> Result<Graph, ImportError> {
        let mut seen = AHashSet::new();
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for record in self.nodes {
            if !seen.insert(record.id.clone()) {
                return Err(ImportError::DuplicateNodeId(record.id));
            }
            let kind = NodeKind::from_type_name(&record.node_type).ok_or_else(|| {
                ImportError::UnknownNodeType {
                    node_id: record.id.clone(),
                    type_name: record.node_type.clone(),
                }
            })?;
            let data = match kind {
                NodeKind::Trigger => NodeData::Trigger(parse_payload::<CardData>(&record)?),
                NodeKind::Step => NodeData::Step(parse_payload::<CardData>(&record)?),
                NodeKind::Policy => NodeData::Policy(parse_payload::<PolicyData>(&record)?),
                NodeKind::PolicyOutput => {
                    NodeData::PolicyOutput(parse_payload::<PolicyOutputData>(&record)?)
                }
            };
            nodes.push(Node::new(record.id, record.position, data));
        }

        let mut seen = AHashSet::new();
        let mut edges = Vec::with_capacity(self.edges.len());
        for record in self.edges {
            if !seen.insert(record.id.clone()) {
                return Err(ImportError::DuplicateEdgeId(record.id));
            }
            edges.push(
                Edge::new(record.id, record.source, record.target)
                    .with_handles(record.source_handle, record.target_handle),
            );
        }

        Ok(Graph::from_parts(nodes, edges))
    }
}

/// Parses a JSON document straight into a graph (no cleanup).
pub fn parse_graph(json: &str) -> Result<Graph, ImportError> {
    FlowDocument::from_json(json)?.into_graph()
}

/// Serializes a graph as a pretty-printed flow document.
pub fn export_graph(graph: &Graph) -> String {
    FlowDocument::from_graph(graph).to_json_pretty()
}

fn parse_payload<T: DeserializeOwned>(record: &NodeRecord) -> Result<T, ImportError> {
    // A node without `data` gets every payload default.
    let data = match &record.data {
        serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(data).map_err(|e| ImportError::InvalidPayload {
        node_id: record.id.clone(),
        message: e.to_string(),
    })
}

fn payload_to_value(data: &NodeData) -> serde_json::Value {
    let value = match data {
        NodeData::Trigger(card) | NodeData::Step(card) => serde_json::to_value(card),
        NodeData::Policy(policy) => serde_json::to_value(policy),
        NodeData::PolicyOutput(output) => serde_json::to_value(output),
    };
    value.unwrap_or(serde_json::Value::Null)
}
