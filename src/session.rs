//! One editing session: the canonical graph, its id allocator, the simulation engine
//! and the persistence hooks, owned together and passed around explicitly.

use crate::document::{CleanupReport, FlowDocument, IntoGraph, cleanup, normalize_handle};
use crate::engine::{DEFAULT_ANIMATION_DURATION, SimulationEngine, SimulationState, TimedEvent};
use crate::error::{GraphError, ImportError};
use crate::graph::{
    CardData, Edge, EdgeId, Graph, IdAllocator, Node, NodeData, NodeId, NodeKind, PolicyData,
    PolicyOutputSpec, Position,
};
use crate::storage::{DEFAULT_SAVE_DEBOUNCE, DEFAULT_STORAGE_KEY, DebouncedSaver, SnapshotStore};
use crate::sync::{LayoutConfig, OutputsChange, Removal, StructuralSync};
use crate::view::{Hover, ViewModel, project};
use ahash::AHashSet;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound on tasks fired by [`Session::run_until_idle`]; cycles of Step nodes
/// never settle on their own.
pub const DEFAULT_MAX_TASKS_PER_RUN: usize = 10_000;

pub struct SessionBuilder {
    animation_duration: Duration,
    save_debounce: Duration,
    storage_key: String,
    layout: LayoutConfig,
    max_tasks_per_run: usize,
    store: Option<Box<dyn SnapshotStore>>,
    graph: Option<Graph>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            animation_duration: DEFAULT_ANIMATION_DURATION,
            save_debounce: DEFAULT_SAVE_DEBOUNCE,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            layout: LayoutConfig::default(),
            max_tasks_per_run: DEFAULT_MAX_TASKS_PER_RUN,
            store: None,
            graph: None,
        }
    }

    pub fn with_animation_duration(mut self, duration: Duration) -> Self {
        self.animation_duration = duration;
        self
    }

    pub fn with_save_debounce(mut self, debounce: Duration) -> Self {
        self.save_debounce = debounce;
        self
    }

    pub fn with_storage_key(mut self, key: &str) -> Self {
        self.storage_key = key.to_string();
        self
    }

    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout.normalized();
        self
    }

    pub fn with_max_tasks_per_run(mut self, max_tasks: usize) -> Self {
        self.max_tasks_per_run = max_tasks;
        self
    }

    /// Persist to `store`. Without an initial graph, the session starts from whatever
    /// the store holds under the storage key.
    pub fn with_store(mut self, store: Box<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Start from `graph`. It goes through the cleanup pass like any import.
    pub fn with_graph(mut self, graph: Graph) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn build(self) -> Session {
        let mut session = Session {
            graph: Graph::new(),
            ids: IdAllocator::new(),
            engine: SimulationEngine::new(self.animation_duration),
            layout: self.layout,
            hover: Hover::default(),
            storage_key: self.storage_key,
            store: self.store,
            saver: DebouncedSaver::new(self.save_debounce),
            max_tasks_per_run: self.max_tasks_per_run,
        };

        match self.graph {
            Some(graph) => {
                session.adopt(graph);
            }
            None => {
                session.load_from_store();
            }
        }
        session
    }
}

pub struct Session {
    graph: Graph,
    ids: IdAllocator,
    engine: SimulationEngine,
    layout: LayoutConfig,
    hover: Hover,
    storage_key: String,
    store: Option<Box<dyn SnapshotStore>>,
    saver: DebouncedSaver,
    max_tasks_per_run: usize,
}

impl Default for Session {
    fn default() -> Self {
        SessionBuilder::new().build()
    }
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn state(&self) -> &SimulationState {
        self.engine.state()
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn now(&self) -> Duration {
        self.engine.now()
    }

    pub fn pending_timers(&self) -> usize {
        self.engine.pending_timers()
    }

    pub fn is_simulation_active(&self) -> bool {
        self.engine.is_simulation_active()
    }

    pub fn drain_journal(&mut self) -> Vec<TimedEvent> {
        self.engine.drain_journal()
    }

    pub fn view(&self) -> ViewModel {
        project(
            &self.graph,
            self.engine.state(),
            &self.hover,
            self.engine.animation_duration(),
        )
    }

    pub fn set_hovered_edge(&mut self, edge_id: Option<EdgeId>) {
        self.hover.edge_id = edge_id;
    }

    // --- Graph edits ---

    pub fn add_trigger(&mut self, label: &str, position: Position) -> NodeId {
        self.insert_fresh(position, NodeData::Trigger(CardData::new(label)))
    }

    pub fn add_step(&mut self, label: &str, position: Position) -> NodeId {
        self.insert_fresh(position, NodeData::Step(CardData::new(label)))
    }

    /// Adds a Policy and spawns one satellite per declared output.
    pub fn add_policy(
        &mut self,
        label: &str,
        outputs: Vec<PolicyOutputSpec>,
        position: Position,
    ) -> Result<NodeId, GraphError> {
        self.add_node(NodeData::Policy(PolicyData::new(label, outputs)), position)
    }

    /// Adds a node of any user-creatable kind. PolicyOutput nodes are owned by their
    /// parent and are rejected here.
    pub fn add_node(&mut self, data: NodeData, position: Position) -> Result<NodeId, GraphError> {
        match data {
            NodeData::Trigger(_) | NodeData::Step(_) => Ok(self.insert_fresh(position, data)),
            NodeData::Policy(policy) => {
                let outputs = policy.outputs.clone();
                let id = self.insert_fresh(
                    position,
                    NodeData::Policy(PolicyData {
                        outputs: Vec::new(),
                        output_node_ids: Vec::new(),
                        ..policy
                    }),
                );
                let mut sync = StructuralSync::new(&mut self.graph, &mut self.ids, &self.layout);
                if let Err(e) = sync.apply_outputs_change(&id, outputs) {
                    sync.remove_nodes(std::slice::from_ref(&id));
                    return Err(e);
                }
                Ok(id)
            }
            NodeData::PolicyOutput(_) => Err(GraphError::ManagedNode),
        }
    }

    pub fn connect(&mut self, source: &str, target: &str) -> Result<EdgeId, GraphError> {
        self.connect_with_handles(source, target, None, None)
    }

    pub fn connect_with_handles(
        &mut self,
        source: &str,
        target: &str,
        source_handle: Option<&str>,
        target_handle: Option<&str>,
    ) -> Result<EdgeId, GraphError> {
        let mut id = self.ids.next_edge_id();
        while self.graph.edge(&id).is_some() {
            id = self.ids.next_edge_id();
        }
        let edge = Edge::new(id.clone(), source, target)
            .with_handles(normalize_handle(source_handle), normalize_handle(target_handle));
        self.graph.insert_edge(edge)?;
        self.touch();
        Ok(id)
    }

    /// Re-attaches an edge to other handles of the same nodes.
    pub fn set_edge_handles(
        &mut self,
        edge_id: &str,
        source_handle: Option<&str>,
        target_handle: Option<&str>,
    ) -> Result<(), GraphError> {
        let edge = self
            .graph
            .edge_mut(edge_id)
            .ok_or_else(|| GraphError::EdgeNotFound(edge_id.to_string()))?;
        edge.source_handle = normalize_handle(source_handle);
        edge.target_handle = normalize_handle(target_handle);
        self.touch();
        Ok(())
    }

    /// Removes nodes with the Policy → satellites cascade and incident edges.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> Removal {
        let removal = StructuralSync::new(&mut self.graph, &mut self.ids, &self.layout).remove_nodes(ids);
        self.engine.forget(&removal.node_ids(), &removal.edge_ids());
        if !removal.nodes.is_empty() {
            self.touch();
        }
        removal
    }

    pub fn remove_edges(&mut self, ids: &[EdgeId]) -> Vec<Edge> {
        let doomed: AHashSet<EdgeId> = ids.iter().cloned().collect();
        let removed = self.graph.remove_edges(&doomed);
        self.engine.forget(&AHashSet::new(), &doomed);
        if !removed.is_empty() {
            self.touch();
        }
        removed
    }

    /// Renames a node. Renaming a satellite renames the matching output of its parent.
    pub fn set_label(&mut self, node_id: &str, label: &str) -> Result<(), GraphError> {
        let node = self
            .graph
            .node(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;

        if let Some(output) = node.as_policy_output() {
            let parent_id = output.parent_policy_id.clone();
            let output_id = output.output_id.clone();
            let mut outputs = self
                .graph
                .node(&parent_id)
                .and_then(|n| n.as_policy())
                .map(|p| p.outputs.clone())
                .ok_or_else(|| GraphError::NodeNotFound(parent_id.clone()))?;
            for spec in outputs.iter_mut().filter(|o| o.id == output_id) {
                spec.label = label.to_string();
            }
            self.set_policy_outputs(&parent_id, outputs)?;
            return Ok(());
        }

        if let Some(node) = self.graph.node_mut(node_id) {
            node.data.set_label(label);
        }
        self.touch();
        Ok(())
    }

    /// Replaces a policy's output list, keeping satellites in sync.
    pub fn set_policy_outputs(
        &mut self,
        policy_id: &str,
        outputs: Vec<PolicyOutputSpec>,
    ) -> Result<OutputsChange, GraphError> {
        let change = StructuralSync::new(&mut self.graph, &mut self.ids, &self.layout)
            .apply_outputs_change(policy_id, outputs)?;
        let removed_nodes: AHashSet<NodeId> = change.removed_nodes.iter().cloned().collect();
        let removed_edges: AHashSet<EdgeId> = change.removed_edges.iter().cloned().collect();
        self.engine.forget(&removed_nodes, &removed_edges);
        self.touch();
        Ok(change)
    }

    pub fn move_node(&mut self, node_id: &str, position: Position) -> Result<Vec<NodeId>, GraphError> {
        let moved = StructuralSync::new(&mut self.graph, &mut self.ids, &self.layout)
            .move_node(node_id, position)?;
        self.touch();
        Ok(moved)
    }

    pub fn move_nodes(&mut self, moves: &[(NodeId, Position)]) -> Result<Vec<NodeId>, GraphError> {
        let moved = StructuralSync::new(&mut self.graph, &mut self.ids, &self.layout).move_nodes(moves)?;
        self.touch();
        Ok(moved)
    }

    // --- Simulation ---

    pub fn trigger(&mut self, node_id: &str) {
        self.engine.trigger(&self.graph, node_id);
    }

    pub fn trigger_from_output(&mut self, output_node_id: &str) {
        self.engine.trigger_from_output(&self.graph, output_node_id);
    }

    pub fn resolve_policy_decision(&mut self, policy_id: &str, output_id: &str) {
        self.engine
            .resolve_policy_decision(&self.graph, policy_id, output_id);
    }

    pub fn activate(&mut self, node_id: &str) {
        self.engine.activate(&self.graph, node_id);
    }

    pub fn execute_node(&mut self, node_id: &str) {
        self.engine.execute_node(&self.graph, node_id);
    }

    pub fn reset_simulation(&mut self) {
        self.engine.reset_simulation();
    }

    /// Moves the clock forward, firing due animations and any due save.
    pub fn advance(&mut self, delta: Duration) -> usize {
        let fired = self.engine.advance(&self.graph, delta);
        self.flush_if_due();
        fired
    }

    pub fn run_until_idle(&mut self) -> usize {
        let fired = self.engine.run_until_idle(&self.graph, self.max_tasks_per_run);
        self.flush_if_due();
        fired
    }

    // --- Persistence ---

    pub fn export_document(&self) -> FlowDocument {
        FlowDocument::from_graph(&self.graph)
    }

    pub fn export_json(&self) -> String {
        self.export_document().to_json_pretty()
    }

    /// Replaces the graph with an imported document. On error nothing changes.
    pub fn import_json(&mut self, json: &str) -> Result<CleanupReport, ImportError> {
        let graph = FlowDocument::from_json(json)?.into_graph()?;
        let report = self.adopt(graph);
        self.touch();
        info!(
            nodes = self.graph.nodes().len(),
            edges = self.graph.edges().len(),
            "flow imported"
        );
        Ok(report)
    }

    /// Replaces the graph with the store's saved state. Returns `false` when there is
    /// nothing usable to load.
    pub fn load_from_store(&mut self) -> bool {
        let Some(store) = self.store.as_deref() else {
            return false;
        };
        match crate::storage::load_graph(store, &self.storage_key) {
            Some(graph) => {
                self.adopt(graph);
                true
            }
            None => false,
        }
    }

    /// Writes immediately, cancelling any pending debounced write.
    pub fn save_now(&mut self) -> bool {
        self.saver.cancel();
        let Some(store) = self.store.as_deref_mut() else {
            return false;
        };
        crate::storage::save_graph(store, &self.storage_key, &self.graph)
    }

    pub fn has_pending_save(&self) -> bool {
        self.saver.is_dirty()
    }

    fn flush_if_due(&mut self) {
        if self.saver.take_due(self.engine.now()) {
            self.save_now();
        }
    }

    /// Installs a graph: cleanup, missing satellites, fresh simulation state and ids.
    fn adopt(&mut self, mut graph: Graph) -> CleanupReport {
        let report = cleanup(&mut graph);
        let mut ids = IdAllocator::after(&graph);

        let policies: Vec<NodeId> = graph
            .nodes()
            .iter()
            .filter(|n| n.kind() == NodeKind::Policy)
            .map(|n| n.id.clone())
            .collect();
        let mut sync = StructuralSync::new(&mut graph, &mut ids, &self.layout);
        for policy_id in policies {
            if let Err(e) = sync.ensure_output_nodes(&policy_id) {
                warn!(policy_id = %policy_id, error = %e, "could not restore policy outputs");
            }
        }

        self.engine.reset_simulation();
        self.engine.drain_journal();
        self.graph = graph;
        self.ids = ids;
        self.hover = Hover::default();
        report
    }

    fn insert_fresh(&mut self, position: Position, data: NodeData) -> NodeId {
        let mut id = self.ids.next_node_id();
        while self.graph.contains_node(&id) {
            id = self.ids.next_node_id();
        }
        // The id was just checked to be free.
        let _ = self.graph.insert_node(Node::new(id.clone(), position, data));
        self.touch();
        id
    }

    fn touch(&mut self) {
        self.saver.mark_dirty(self.engine.now());
    }
}
