//! Keeps PolicyOutput satellites consistent with their parent Policy under edits.
//!
//! A PolicyOutput node exists exactly for each entry of its parent's `outputs` list. All
//! structural edits that could break that binding (changing the output list, deleting
//! nodes, dragging a policy cluster) go through [`StructuralSync`].

use crate::error::GraphError;
use crate::graph::{
    Edge, Graph, IdAllocator, Node, NodeData, NodeId, NodeKind, PolicyOutputData, PolicyOutputSpec,
    Position,
};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use tracing::debug;

mod layout;

pub use layout::LayoutConfig;

/// What a call to [`StructuralSync::apply_outputs_change`] did to the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputsChange {
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub removed_edges: Vec<String>,
    pub relabeled_nodes: Vec<NodeId>,
}

/// Nodes and edges taken out of the graph by a cascading removal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Removal {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Removal {
    pub fn node_ids(&self) -> AHashSet<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn edge_ids(&self) -> AHashSet<String> {
        self.edges.iter().map(|e| e.id.clone()).collect()
    }
}

/// Structural edits over a borrowed graph, id allocator and layout.
pub struct StructuralSync<'a> {
    graph: &'a mut Graph,
    ids: &'a mut IdAllocator,
    layout: &'a LayoutConfig,
}

impl<'a> StructuralSync<'a> {
    pub fn new(graph: &'a mut Graph, ids: &'a mut IdAllocator, layout: &'a LayoutConfig) -> Self {
        Self { graph, ids, layout }
    }

    /// Replaces a policy's output list, diffing by output id.
    ///
    /// New ids spawn a satellite node, vanished ids lose theirs (with incident edges),
    /// surviving ids keep their node and only receive the new label. Validation happens
    /// before the first mutation, so an error leaves the graph untouched.
    pub fn apply_outputs_change(
        &mut self,
        policy_id: &str,
        new_outputs: Vec<PolicyOutputSpec>,
    ) -> Result<OutputsChange, GraphError> {
        let parent_position = self.require_policy(policy_id)?;
        if let Some(duplicate) = new_outputs.iter().map(|o| &o.id).duplicates().next() {
            return Err(GraphError::DuplicateOutputId {
                policy_id: policy_id.to_string(),
                output_id: duplicate.clone(),
            });
        }

        let bound: AHashMap<String, (NodeId, String)> = self
            .graph
            .policy_outputs_of(policy_id)
            .filter_map(|n| {
                n.as_policy_output()
                    .map(|o| (o.output_id.clone(), (n.id.clone(), o.label.clone())))
            })
            .collect();
        let kept_ids: AHashSet<&str> = new_outputs.iter().map(|o| o.id.as_str()).collect();

        let doomed: AHashSet<NodeId> = bound
            .iter()
            .filter(|(output_id, _)| !kept_ids.contains(output_id.as_str()))
            .map(|(_, (node_id, _))| node_id.clone())
            .collect();
        let relabels: Vec<(NodeId, String)> = new_outputs
            .iter()
            .filter_map(|spec| {
                let (node_id, label) = bound.get(&spec.id)?;
                (*label != spec.label).then(|| (node_id.clone(), spec.label.clone()))
            })
            .collect();
        let spawns: Vec<Node> = self.plan_spawns(policy_id, parent_position, &new_outputs, &bound);

        let mut change = OutputsChange::default();

        let (removed_nodes, removed_edges) = self.graph.remove_nodes(&doomed);
        change.removed_nodes = removed_nodes.into_iter().map(|n| n.id).collect();
        change.removed_edges = removed_edges.into_iter().map(|e| e.id).collect();

        for (node_id, label) in relabels {
            if let Some(node) = self.graph.node_mut(&node_id) {
                node.data.set_label(label);
                change.relabeled_nodes.push(node_id);
            }
        }

        for node in spawns {
            change.added_nodes.push(node.id.clone());
            self.graph.insert_node(node)?;
        }

        let output_node_ids = self.bound_node_ids(policy_id, &new_outputs);
        if let Some(policy) = self.graph.node_mut(policy_id).and_then(|n| n.as_policy_mut()) {
            policy.outputs = new_outputs;
            policy.output_node_ids = output_node_ids;
        }

        debug!(
            policy_id,
            added = change.added_nodes.len(),
            removed = change.removed_nodes.len(),
            relabeled = change.relabeled_nodes.len(),
            "policy outputs synchronized"
        );
        Ok(change)
    }

    /// Spawns a satellite for every declared output that has none and rebuilds
    /// `output_node_ids`. Returns the ids of the spawned nodes.
    pub fn ensure_output_nodes(&mut self, policy_id: &str) -> Result<Vec<NodeId>, GraphError> {
        let parent_position = self.require_policy(policy_id)?;
        let outputs = self
            .graph
            .node(policy_id)
            .and_then(|n| n.as_policy())
            .map(|p| p.outputs.clone())
            .unwrap_or_default();
        let bound: AHashMap<String, (NodeId, String)> = self
            .graph
            .policy_outputs_of(policy_id)
            .filter_map(|n| {
                n.as_policy_output()
                    .map(|o| (o.output_id.clone(), (n.id.clone(), o.label.clone())))
            })
            .collect();

        let spawns = self.plan_spawns(policy_id, parent_position, &outputs, &bound);
        let mut spawned = Vec::with_capacity(spawns.len());
        for node in spawns {
            spawned.push(node.id.clone());
            self.graph.insert_node(node)?;
        }

        let output_node_ids = self.bound_node_ids(policy_id, &outputs);
        if let Some(policy) = self.graph.node_mut(policy_id).and_then(|n| n.as_policy_mut()) {
            policy.output_node_ids = output_node_ids;
        }
        Ok(spawned)
    }

    /// Removes a batch of nodes, cascading from each Policy to its satellites and from
    /// every removed node to its incident edges.
    ///
    /// A satellite removed on its own also drops its entry from the surviving parent's
    /// output list, so the binding invariant holds afterwards.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> Removal {
        let mut doomed: AHashSet<NodeId> = ids
            .iter()
            .filter(|id| self.graph.contains_node(id))
            .cloned()
            .collect();

        for id in ids {
            let Some(policy) = self.graph.node(id).and_then(|n| n.as_policy()) else {
                continue;
            };
            doomed.extend(
                policy
                    .output_node_ids
                    .iter()
                    .filter(|child| self.graph.contains_node(child))
                    .cloned(),
            );
            doomed.extend(self.graph.policy_outputs_of(id).map(|n| n.id.clone()));
        }

        let detached: Vec<(NodeId, String)> = self
            .graph
            .nodes()
            .iter()
            .filter(|n| doomed.contains(&n.id))
            .filter_map(|n| n.as_policy_output())
            .filter(|o| !doomed.contains(&o.parent_policy_id))
            .map(|o| (o.parent_policy_id.clone(), o.output_id.clone()))
            .collect();

        let (nodes, edges) = self.graph.remove_nodes(&doomed);

        for (parent_id, output_id) in detached {
            if let Some(policy) = self.graph.node_mut(&parent_id).and_then(|n| n.as_policy_mut()) {
                policy.outputs.retain(|o| o.id != output_id);
                policy.output_node_ids.retain(|child| !doomed.contains(child));
            }
        }

        debug!(nodes = nodes.len(), edges = edges.len(), "nodes removed");
        Removal { nodes, edges }
    }

    /// Moves one node. Returns the ids of every node whose position changed.
    ///
    /// A Policy drags its satellites by the same delta. A satellite moved on its own is
    /// clamped next to its parent and its `relative_position` recomputed.
    pub fn move_node(&mut self, node_id: &str, position: Position) -> Result<Vec<NodeId>, GraphError> {
        let node = self
            .graph
            .node(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;

        match node.kind() {
            NodeKind::Policy => {
                let (dx, dy) = node.position.delta_to(position);
                let mut children: Vec<NodeId> = node
                    .as_policy()
                    .map(|p| p.output_node_ids.clone())
                    .unwrap_or_default();
                children.extend(self.graph.policy_outputs_of(node_id).map(|n| n.id.clone()));
                let children: Vec<NodeId> = children.into_iter().unique().collect();

                let mut moved = vec![node_id.to_string()];
                if let Some(policy) = self.graph.node_mut(node_id) {
                    policy.position = position;
                }
                for child_id in children {
                    if let Some(child) = self.graph.node_mut(&child_id) {
                        child.position = child.position.offset(dx, dy);
                        moved.push(child_id);
                    }
                }
                Ok(moved)
            }
            NodeKind::PolicyOutput => {
                let parent_position = node
                    .as_policy_output()
                    .and_then(|o| self.graph.node(&o.parent_policy_id))
                    .map(|parent| parent.position);
                let Some(parent_position) = parent_position else {
                    self.set_position(node_id, position);
                    return Ok(vec![node_id.to_string()]);
                };

                let (dx, dy) = parent_position.delta_to(position);
                let (_, relative) = self.layout.clamp_to_parent(Position::new(dx, dy));
                if let Some(output) = self.graph.node_mut(node_id) {
                    output.position = parent_position.offset(relative.x, relative.y);
                    if let Some(data) = output.as_policy_output_mut() {
                        data.relative_position = relative;
                    }
                }
                Ok(vec![node_id.to_string()])
            }
            NodeKind::Trigger | NodeKind::Step => {
                self.set_position(node_id, position);
                Ok(vec![node_id.to_string()])
            }
        }
    }

    /// Applies a batch of moves from one drag gesture. Satellites whose parent is in the
    /// same batch are skipped: the parent's delta already carries them.
    pub fn move_nodes(&mut self, moves: &[(NodeId, Position)]) -> Result<Vec<NodeId>, GraphError> {
        let moving_policies: AHashSet<&str> = moves
            .iter()
            .filter(|(id, _)| self.graph.node(id).is_some_and(|n| n.kind() == NodeKind::Policy))
            .map(|(id, _)| id.as_str())
            .collect();

        let (policies, others): (Vec<_>, Vec<_>) = moves
            .iter()
            .partition(|(id, _)| moving_policies.contains(id.as_str()));

        let mut moved = Vec::new();
        for (id, position) in policies {
            moved.extend(self.move_node(id, *position)?);
        }
        for (id, position) in others {
            let carried = self
                .graph
                .node(id)
                .and_then(|n| n.as_policy_output())
                .is_some_and(|o| moving_policies.contains(o.parent_policy_id.as_str()));
            if carried {
                continue;
            }
            moved.extend(self.move_node(id, *position)?);
        }
        Ok(moved.into_iter().unique().collect())
    }

    fn set_position(&mut self, node_id: &str, position: Position) {
        if let Some(node) = self.graph.node_mut(node_id) {
            node.position = position;
        }
    }

    fn require_policy(&self, policy_id: &str) -> Result<Position, GraphError> {
        let node = self
            .graph
            .node(policy_id)
            .ok_or_else(|| GraphError::NodeNotFound(policy_id.to_string()))?;
        match node.kind() {
            NodeKind::Policy => Ok(node.position),
            other => Err(GraphError::WrongNodeKind {
                node_id: policy_id.to_string(),
                expected: NodeKind::Policy.type_name(),
                found: other.type_name(),
            }),
        }
    }

    /// Builds a satellite for every output in `outputs` without a bound node, laid out
    /// evenly along its side among the outputs sharing that side.
    fn plan_spawns(
        &mut self,
        policy_id: &str,
        parent_position: Position,
        outputs: &[PolicyOutputSpec],
        bound: &AHashMap<String, (NodeId, String)>,
    ) -> Vec<Node> {
        let mut spawns = Vec::new();
        for spec in outputs.iter().filter(|spec| !bound.contains_key(&spec.id)) {
            let same_side: Vec<&PolicyOutputSpec> = outputs
                .iter()
                .filter(|o| o.edge_position == spec.edge_position)
                .collect();
            let index = same_side.iter().position(|o| o.id == spec.id).unwrap_or(0);
            let relative =
                self.layout
                    .output_position(spec.edge_position, index, same_side.len(), spec.offset);

            let id = self.fresh_node_id(&spawns);
            spawns.push(Node::new(
                id,
                parent_position.offset(relative.x, relative.y),
                NodeData::PolicyOutput(PolicyOutputData {
                    label: spec.label.clone(),
                    parent_policy_id: policy_id.to_string(),
                    output_id: spec.id.clone(),
                    relative_position: relative,
                }),
            ));
        }
        spawns
    }

    fn fresh_node_id(&mut self, pending: &[Node]) -> NodeId {
        loop {
            let id = self.ids.next_node_id();
            if !self.graph.contains_node(&id) && pending.iter().all(|n| n.id != id) {
                return id;
            }
        }
    }

    /// Satellite ids of `policy_id`, in the order of `outputs`.
    fn bound_node_ids(&self, policy_id: &str, outputs: &[PolicyOutputSpec]) -> Vec<NodeId> {
        outputs
            .iter()
            .filter_map(|spec| self.graph.policy_output(policy_id, &spec.id))
            .map(|n| n.id.clone())
            .collect()
    }
}
