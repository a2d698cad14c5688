//! The simulation state machine.
//!
//! A wave starts at a node, marks it executed and sends a token down every outgoing
//! edge. Each edge animates for a fixed duration (one scheduled [`SimTask`] per edge)
//! and then executes its target. Policies stop the wave until a decision picks one of
//! their outputs. Trigger nodes are never entered by propagation.
//!
//! Missing nodes, edges or outputs never produce errors here: the engine is driven by
//! interactive edits that can race with a running wave, so such calls are no-ops.

use crate::graph::{EdgeId, Graph, NodeId, NodeKind, compute_downstream};
use ahash::{AHashMap, AHashSet};
use std::time::Duration;
use tracing::{debug, info};

mod state;
mod timer;

pub use state::*;
pub use timer::*;

/// Default time an edge spends animating before its target executes.
pub const DEFAULT_ANIMATION_DURATION: Duration = Duration::from_millis(1000);

/// Shortest animation an edge can have. A zero duration would let a Step cycle keep
/// scheduling work at the current instant forever.
pub const MIN_ANIMATION_DURATION: Duration = Duration::from_millis(1);

/// Events kept in the journal. Once full, the oldest half is dropped.
pub const JOURNAL_CAPACITY: usize = 4096;

/// A notable state transition, recorded in the engine's journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    Triggered { node_id: NodeId },
    TriggeredFromOutput { output_node_id: NodeId },
    NodeActivated { node_id: NodeId },
    NodeExecuted { node_id: NodeId },
    AwaitingDecision { policy_id: NodeId },
    DecisionResolved { policy_id: NodeId, output_id: String },
    EdgeAnimating { edge_id: EdgeId },
    EdgeCompleted { edge_id: EdgeId },
    /// A token arrived at a Trigger node and stopped there.
    PropagationSuppressed { edge_id: EdgeId, trigger_id: NodeId },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub at: Duration,
    pub event: SimEvent,
}

/// Owns the simulation sets and the pending edge timers of one session.
pub struct SimulationEngine<T: TimerScheduler = VirtualTimers> {
    state: SimulationState,
    timers: T,
    /// The pending completion task of every animating edge.
    pending: AHashMap<EdgeId, TimerHandle>,
    animation_duration: Duration,
    journal: Vec<TimedEvent>,
}

impl SimulationEngine<VirtualTimers> {
    pub fn new(animation_duration: Duration) -> Self {
        Self::with_timers(VirtualTimers::new(), animation_duration)
    }
}

impl Default for SimulationEngine<VirtualTimers> {
    fn default() -> Self {
        Self::new(DEFAULT_ANIMATION_DURATION)
    }
}

impl<T: TimerScheduler> SimulationEngine<T> {
    pub fn with_timers(timers: T, animation_duration: Duration) -> Self {
        Self {
            state: SimulationState::default(),
            timers,
            pending: AHashMap::new(),
            animation_duration: animation_duration.max(MIN_ANIMATION_DURATION),
            journal: Vec::new(),
        }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn animation_duration(&self) -> Duration {
        self.animation_duration
    }

    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    pub fn is_simulation_active(&self) -> bool {
        self.state.is_simulation_active()
    }

    /// Recent events, oldest first. Bounded by [`JOURNAL_CAPACITY`]; drain it to keep
    /// every event.
    pub fn journal(&self) -> &[TimedEvent] {
        &self.journal
    }

    pub fn drain_journal(&mut self) -> Vec<TimedEvent> {
        std::mem::take(&mut self.journal)
    }

    /// Arms a node so it can be executed manually. Policies cannot be armed.
    pub fn activate(&mut self, graph: &Graph, node_id: &str) {
        let Some(node) = graph.node(node_id) else {
            debug!(node_id, "activate: node not found");
            return;
        };
        if node.kind() == NodeKind::Policy {
            debug!(node_id, "activate: policies wait for a decision instead");
            return;
        }
        if self.state.executed.contains(node_id) {
            return;
        }
        self.state.active.insert(node_id.to_string());
        self.record(SimEvent::NodeActivated {
            node_id: node_id.to_string(),
        });
    }

    /// Executes a node and starts animating its outgoing edges.
    ///
    /// A Policy only enters `waiting_for_decision`; it is marked executed by
    /// [`resolve_policy_decision`](Self::resolve_policy_decision).
    pub fn execute_node(&mut self, graph: &Graph, node_id: &str) {
        let Some(node) = graph.node(node_id) else {
            debug!(node_id, "execute: node not found");
            return;
        };

        match node.kind() {
            NodeKind::Policy => {
                self.state.active.remove(node_id);
                self.state.executed.remove(node_id);
                self.state.waiting_for_decision.insert(node_id.to_string());
                self.record(SimEvent::AwaitingDecision {
                    policy_id: node_id.to_string(),
                });
            }
            NodeKind::Trigger | NodeKind::Step | NodeKind::PolicyOutput => {
                self.state.active.remove(node_id);
                self.state.executed.insert(node_id.to_string());
                self.record(SimEvent::NodeExecuted {
                    node_id: node_id.to_string(),
                });
                let outgoing: Vec<EdgeId> = graph.outgoing(node_id).map(|e| e.id.clone()).collect();
                self.animate_edges(outgoing);
            }
        }
    }

    /// Resolves a paused Policy by choosing one of its outputs.
    ///
    /// Everything downstream of *every* output of the policy is reset first, not just the
    /// chosen branch, so a policy can be re-decided after an earlier run (including
    /// loop-back topologies) without stale marks on the branch that is not taken.
    pub fn resolve_policy_decision(&mut self, graph: &Graph, policy_id: &str, output_id: &str) {
        let Some(chosen) = graph.policy_output(policy_id, output_id) else {
            debug!(policy_id, output_id, "decision: policy output not found");
            return;
        };

        let siblings: AHashSet<NodeId> = graph.policy_outputs_of(policy_id).map(|n| n.id.clone()).collect();
        let mut stale_nodes = AHashSet::new();
        for sibling in &siblings {
            stale_nodes.extend(compute_downstream(graph, sibling));
        }
        let stale_edges: AHashSet<EdgeId> = graph
            .edges()
            .iter()
            .filter(|e| {
                stale_nodes.contains(&e.source)
                    || stale_nodes.contains(&e.target)
                    || siblings.contains(&e.source)
            })
            .map(|e| e.id.clone())
            .collect();

        self.state.clear_node_marks(&stale_nodes);
        self.drop_edges(&stale_edges);

        self.state.waiting_for_decision.remove(policy_id);
        self.state.active.remove(policy_id);
        self.state.executed.insert(policy_id.to_string());
        self.record(SimEvent::DecisionResolved {
            policy_id: policy_id.to_string(),
            output_id: output_id.to_string(),
        });

        let chosen_edges: Vec<EdgeId> = graph.outgoing(&chosen.id).map(|e| e.id.clone()).collect();
        self.animate_edges(chosen_edges);
    }

    /// Restarts the wave at `node_id`, unwinding any earlier run downstream of it.
    pub fn trigger(&mut self, graph: &Graph, node_id: &str) {
        if !graph.contains_node(node_id) {
            debug!(node_id, "trigger: node not found");
            return;
        }
        info!(node_id, "trigger");
        self.restart_from(graph, node_id);
        self.record(SimEvent::Triggered {
            node_id: node_id.to_string(),
        });
        self.execute_node(graph, node_id);
    }

    /// Like [`trigger`](Self::trigger), but starts at a PolicyOutput node and records it
    /// in `triggered_output_nodes`.
    pub fn trigger_from_output(&mut self, graph: &Graph, output_node_id: &str) {
        if !graph.contains_node(output_node_id) {
            debug!(output_node_id, "trigger from output: node not found");
            return;
        }
        info!(output_node_id, "trigger from output");
        self.restart_from(graph, output_node_id);
        self.state
            .triggered_output_nodes
            .insert(output_node_id.to_string());
        self.record(SimEvent::TriggeredFromOutput {
            output_node_id: output_node_id.to_string(),
        });
        self.execute_node(graph, output_node_id);
    }

    /// Cancels every timer and clears every set.
    pub fn reset_simulation(&mut self) {
        let cancelled = self.cancel_all_timers();
        self.state.clear();
        info!(cancelled, "simulation reset");
        self.record(SimEvent::Reset);
    }

    /// Removes deleted nodes and edges from every set and cancels their timers.
    pub fn forget(&mut self, nodes: &AHashSet<NodeId>, edges: &AHashSet<EdgeId>) {
        self.state.purge_nodes(nodes);
        self.drop_edges(edges);
    }

    /// Fires every task due within the next `delta` and moves the clock forward.
    /// Returns the number of tasks fired.
    pub fn advance(&mut self, graph: &Graph, delta: Duration) -> usize {
        let until = self.timers.now() + delta;
        let mut fired = 0;
        while let Some((_, task)) = self.timers.pop_due(until) {
            self.run_task(graph, task);
            fired += 1;
        }
        self.timers.advance_to(until);
        fired
    }

    /// Fires tasks in due order until none remain or `max_tasks` have fired.
    /// Step-only cycles never go idle, hence the bound.
    pub fn run_until_idle(&mut self, graph: &Graph, max_tasks: usize) -> usize {
        let mut fired = 0;
        while fired < max_tasks {
            let Some(due) = self.timers.next_due() else {
                break;
            };
            let Some((_, task)) = self.timers.pop_due(due) else {
                break;
            };
            self.run_task(graph, task);
            fired += 1;
        }
        fired
    }

    fn run_task(&mut self, graph: &Graph, task: SimTask) {
        match task {
            SimTask::CompleteEdge { edge_id } => self.complete_edge(graph, &edge_id),
        }
    }

    fn complete_edge(&mut self, graph: &Graph, edge_id: &str) {
        self.pending.remove(edge_id);
        if !self.state.animating_edges.remove(edge_id) {
            debug!(edge_id, "edge completion for an edge that is no longer animating");
            return;
        }
        self.state.executed_edges.insert(edge_id.to_string());
        self.record(SimEvent::EdgeCompleted {
            edge_id: edge_id.to_string(),
        });

        let Some(edge) = graph.edge(edge_id) else {
            return;
        };
        let Some(target) = graph.node(&edge.target) else {
            debug!(edge_id, target = %edge.target, "edge target not found");
            return;
        };
        if target.kind() == NodeKind::Trigger {
            self.record(SimEvent::PropagationSuppressed {
                edge_id: edge_id.to_string(),
                trigger_id: target.id.clone(),
            });
            return;
        }
        self.execute_node(graph, &edge.target);
    }

    /// Marks every edge animating first, then schedules their completions.
    fn animate_edges(&mut self, edge_ids: Vec<EdgeId>) {
        for id in &edge_ids {
            self.state.executed_edges.remove(id);
            self.state.animating_edges.insert(id.clone());
        }
        for id in edge_ids {
            // A newer token on the same edge supersedes the one still in flight.
            if let Some(previous) = self.pending.remove(&id) {
                self.timers.cancel(previous);
            }
            let handle = self.timers.schedule(
                self.animation_duration,
                SimTask::CompleteEdge {
                    edge_id: id.clone(),
                },
            );
            self.record(SimEvent::EdgeAnimating {
                edge_id: id.clone(),
            });
            self.pending.insert(id, handle);
        }
    }

    /// Clears the edge marks and cancels the pending completion of each edge.
    fn drop_edges(&mut self, edges: &AHashSet<EdgeId>) {
        for id in edges {
            if let Some(handle) = self.pending.remove(id) {
                self.timers.cancel(handle);
            }
        }
        self.state.purge_edges(edges);
    }

    fn restart_from(&mut self, graph: &Graph, start: &str) {
        let mut stale_nodes = compute_downstream(graph, start);
        stale_nodes.insert(start.to_string());
        self.cancel_all_timers();

        let stale_edges: AHashSet<EdgeId> = graph
            .edges()
            .iter()
            .filter(|e| stale_nodes.contains(&e.source))
            .map(|e| e.id.clone())
            .collect();
        self.state.purge_nodes(&stale_nodes);
        self.state.purge_edges(&stale_edges);
    }

    /// Cancelled edges can never complete, so they stop animating too.
    fn cancel_all_timers(&mut self) -> usize {
        let cancelled = self.timers.cancel_all();
        self.pending.clear();
        self.state.animating_edges.clear();
        cancelled
    }

    fn record(&mut self, event: SimEvent) {
        if self.journal.len() >= JOURNAL_CAPACITY {
            self.journal.drain(..JOURNAL_CAPACITY / 2);
        }
        self.journal.push(TimedEvent {
            at: self.timers.now(),
            event,
        });
    }
}
