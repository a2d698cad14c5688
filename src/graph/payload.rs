use super::{NodeId, Position, Side};
use serde::{Deserialize, Serialize};

/// Payload shared by Trigger and Step nodes: a labelled card on the board.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardData {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CardData {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One declared branch of a Policy node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyOutputSpec {
    pub id: String,
    pub label: String,
    /// The side of the parent the satellite node is laid out on.
    #[serde(default)]
    pub edge_position: Side,
    /// Distance from the parent's border. Falls back to the layout's default gap.
    #[serde(default)]
    pub offset: Option<f64>,
}

impl PolicyOutputSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            edge_position: Side::default(),
            offset: None,
        }
    }

    pub fn on_side(mut self, side: Side) -> Self {
        self.edge_position = side;
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Payload of a Policy (decision) node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyData {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub outputs: Vec<PolicyOutputSpec>,
    /// Ids of the PolicyOutput satellite nodes owned by this policy.
    #[serde(default)]
    pub output_node_ids: Vec<NodeId>,
}

impl PolicyData {
    pub fn new(label: impl Into<String>, outputs: Vec<PolicyOutputSpec>) -> Self {
        Self {
            label: label.into(),
            outputs,
            output_node_ids: Vec::new(),
        }
    }

    pub fn output(&self, output_id: &str) -> Option<&PolicyOutputSpec> {
        self.outputs.iter().find(|o| o.id == output_id)
    }
}

/// Payload of a PolicyOutput satellite node, bound 1:1 to an entry of its parent's `outputs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyOutputData {
    #[serde(default)]
    pub label: String,
    pub parent_policy_id: NodeId,
    pub output_id: String,
    /// Offset of this node's top-left corner from the parent's top-left corner.
    #[serde(default)]
    pub relative_position: Position,
}
