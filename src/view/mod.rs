//! Projection of the graph and simulation state onto render flags.
//!
//! [`project`] is a pure function: renderers call it after every change and redraw
//! from the result. Nothing here mutates engine state.

use crate::engine::SimulationState;
use crate::graph::{EdgeId, Graph, Node, NodeId, NodeKind, Position};
use std::time::Duration;

/// Transient pointer state owned by the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hover {
    pub edge_id: Option<EdgeId>,
}

/// An interaction a node currently offers. Renderers bind these to click handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAction {
    /// Start a wave at this Trigger.
    Trigger,
    /// Execute this armed node by hand.
    Execute,
    /// Resolve the waiting parent policy with this output.
    Decide { policy_id: NodeId, output_id: String },
    /// Restart the wave from this PolicyOutput.
    TriggerFromOutput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    pub position: Position,
    pub is_executed: bool,
    pub is_active: bool,
    pub is_waiting_for_decision: bool,
    /// An edge incident to this node is under the pointer.
    pub is_edge_hovered: bool,
    pub is_connected: bool,
    /// This PolicyOutput started the current wave.
    pub is_triggered: bool,
    pub actions: Vec<NodeAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeView {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub is_executed: bool,
    pub is_animating: bool,
    pub animation_duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
    /// Offer a reset control.
    pub show_reset: bool,
}

impl ViewModel {
    pub fn node(&self, id: &str) -> Option<&NodeView> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&EdgeView> {
        self.edges.iter().find(|e| e.id == id)
    }
}

pub fn project(
    graph: &Graph,
    state: &SimulationState,
    hover: &Hover,
    animation_duration: Duration,
) -> ViewModel {
    let hovered_edge = hover.edge_id.as_deref().and_then(|id| graph.edge(id));

    let nodes = graph
        .nodes()
        .iter()
        .map(|node| NodeView {
            id: node.id.clone(),
            kind: node.kind(),
            label: node.label().to_string(),
            position: node.position,
            is_executed: state.executed().contains(&node.id),
            is_active: state.active().contains(&node.id),
            is_waiting_for_decision: state.waiting_for_decision().contains(&node.id),
            is_edge_hovered: hovered_edge.is_some_and(|e| e.touches(&node.id)),
            is_connected: graph.is_connected(&node.id),
            is_triggered: state.triggered_output_nodes().contains(&node.id),
            actions: actions_for(node, state),
        })
        .collect();

    let edges = graph
        .edges()
        .iter()
        .map(|edge| EdgeView {
            id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            is_executed: state.executed_edges().contains(&edge.id),
            is_animating: state.animating_edges().contains(&edge.id),
            animation_duration,
        })
        .collect();

    ViewModel {
        nodes,
        edges,
        show_reset: state.is_simulation_active(),
    }
}

fn actions_for(node: &Node, state: &SimulationState) -> Vec<NodeAction> {
    let mut actions = Vec::new();
    match node.kind() {
        NodeKind::Trigger => actions.push(NodeAction::Trigger),
        NodeKind::Step => {}
        NodeKind::Policy => {}
        NodeKind::PolicyOutput => {
            let waiting_parent = node
                .as_policy_output()
                .filter(|o| state.waiting_for_decision().contains(&o.parent_policy_id));
            if let Some(output) = waiting_parent {
                actions.push(NodeAction::Decide {
                    policy_id: output.parent_policy_id.clone(),
                    output_id: output.output_id.clone(),
                });
            }
            actions.push(NodeAction::TriggerFromOutput);
        }
    }
    if node.kind() != NodeKind::Policy && state.active().contains(&node.id) {
        actions.push(NodeAction::Execute);
    }
    actions
}
