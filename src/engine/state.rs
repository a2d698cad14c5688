use crate::graph::{EdgeId, NodeId};
use ahash::AHashSet;

/// Visual status of a node, derived from the simulation sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Idle,
    Active,
    Executed,
    WaitingForDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStatus {
    Idle,
    Animating,
    Executed,
}

/// The per-session simulation sets. Only the engine mutates them; everyone else reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationState {
    pub(crate) executed: AHashSet<NodeId>,
    pub(crate) active: AHashSet<NodeId>,
    pub(crate) waiting_for_decision: AHashSet<NodeId>,
    pub(crate) triggered_output_nodes: AHashSet<NodeId>,
    pub(crate) executed_edges: AHashSet<EdgeId>,
    pub(crate) animating_edges: AHashSet<EdgeId>,
}

impl SimulationState {
    pub fn executed(&self) -> &AHashSet<NodeId> {
        &self.executed
    }

    pub fn active(&self) -> &AHashSet<NodeId> {
        &self.active
    }

    pub fn waiting_for_decision(&self) -> &AHashSet<NodeId> {
        &self.waiting_for_decision
    }

    pub fn triggered_output_nodes(&self) -> &AHashSet<NodeId> {
        &self.triggered_output_nodes
    }

    pub fn executed_edges(&self) -> &AHashSet<EdgeId> {
        &self.executed_edges
    }

    pub fn animating_edges(&self) -> &AHashSet<EdgeId> {
        &self.animating_edges
    }

    /// Whether anything is executed, armed, in flight or paused on a decision.
    pub fn is_simulation_active(&self) -> bool {
        !self.executed.is_empty()
            || !self.active.is_empty()
            || !self.animating_edges.is_empty()
            || !self.waiting_for_decision.is_empty()
    }

    pub fn node_status(&self, node_id: &str) -> NodeStatus {
        if self.waiting_for_decision.contains(node_id) {
            NodeStatus::WaitingForDecision
        } else if self.executed.contains(node_id) {
            NodeStatus::Executed
        } else if self.active.contains(node_id) {
            NodeStatus::Active
        } else {
            NodeStatus::Idle
        }
    }

    pub fn edge_status(&self, edge_id: &str) -> EdgeStatus {
        if self.animating_edges.contains(edge_id) {
            EdgeStatus::Animating
        } else if self.executed_edges.contains(edge_id) {
            EdgeStatus::Executed
        } else {
            EdgeStatus::Idle
        }
    }

    pub(crate) fn clear(&mut self) {
        self.executed.clear();
        self.active.clear();
        self.waiting_for_decision.clear();
        self.triggered_output_nodes.clear();
        self.executed_edges.clear();
        self.animating_edges.clear();
    }

    /// Drops the execution marks (`executed`, `active`, `waiting_for_decision`) of `nodes`.
    pub(crate) fn clear_node_marks(&mut self, nodes: &AHashSet<NodeId>) {
        for id in nodes {
            self.executed.remove(id);
            self.active.remove(id);
            self.waiting_for_decision.remove(id);
        }
    }

    /// Drops `nodes` from every node set, including the triggered-output affordance.
    pub(crate) fn purge_nodes(&mut self, nodes: &AHashSet<NodeId>) {
        self.clear_node_marks(nodes);
        for id in nodes {
            self.triggered_output_nodes.remove(id);
        }
    }

    pub(crate) fn purge_edges(&mut self, edges: &AHashSet<EdgeId>) {
        for id in edges {
            self.executed_edges.remove(id);
            self.animating_edges.remove(id);
        }
    }
}
