use crate::graph::{Graph, NodeId, NodeKind};
use ahash::{AHashMap, AHashSet};
use tracing::warn;

/// Handle ids the canvas knows about: one per side of a node.
pub const KNOWN_HANDLES: [&str; 4] = ["top", "right", "bottom", "left"];

/// Counts of the repairs made by [`cleanup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Repeated output ids within one policy's `outputs` list.
    pub duplicate_output_ids: usize,
    /// PolicyOutput nodes with a missing parent, an unknown output id, or a duplicate binding.
    pub orphaned_outputs: usize,
    /// Edges whose source or target does not exist.
    pub dangling_edges: usize,
    /// Parallel edges between the same ordered (source, target) pair.
    pub duplicate_edges: usize,
    /// Handle ids rewritten to a known handle or cleared.
    pub normalized_handles: usize,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Maps a stored handle id onto [`KNOWN_HANDLES`].
///
/// Legacy `<side>-source` / `<side>-target` ids collapse onto their side; anything
/// unrecognised becomes `None`.
pub fn normalize_handle(handle: Option<&str>) -> Option<String> {
    let raw = handle?.trim().to_ascii_lowercase();
    let side = raw
        .strip_suffix("-source")
        .or_else(|| raw.strip_suffix("-target"))
        .unwrap_or(raw.as_str());
    KNOWN_HANDLES.contains(&side).then(|| side.to_string())
}

/// Repairs referential inconsistencies in a freshly loaded or imported graph.
///
/// Runs at load/import boundaries only; the engine itself never validates references.
pub fn cleanup(graph: &mut Graph) -> CleanupReport {
    let mut report = CleanupReport::default();

    report.duplicate_output_ids = dedupe_policy_outputs(graph);
    report.orphaned_outputs = drop_orphaned_outputs(graph);

    let node_ids: AHashSet<NodeId> = graph.nodes().iter().map(|n| n.id.clone()).collect();
    let before = graph.edges().len();
    graph.retain_edges(|e| node_ids.contains(&e.source) && node_ids.contains(&e.target));
    report.dangling_edges = before - graph.edges().len();

    for edge in graph.edges_mut() {
        for handle in [&mut edge.source_handle, &mut edge.target_handle] {
            let normalized = normalize_handle(handle.as_deref());
            if *handle != normalized {
                *handle = normalized;
                report.normalized_handles += 1;
            }
        }
    }

    let mut seen_pairs: AHashSet<(String, String)> = AHashSet::new();
    let before = graph.edges().len();
    graph.retain_edges(|e| seen_pairs.insert((e.source.clone(), e.target.clone())));
    report.duplicate_edges = before - graph.edges().len();

    rebuild_output_node_ids(graph);

    if !report.is_clean() {
        warn!(
            duplicate_output_ids = report.duplicate_output_ids,
            orphaned_outputs = report.orphaned_outputs,
            dangling_edges = report.dangling_edges,
            duplicate_edges = report.duplicate_edges,
            normalized_handles = report.normalized_handles,
            "flow cleanup repaired the graph"
        );
    }
    report
}

/// Keeps the first declaration of each output id.
fn dedupe_policy_outputs(graph: &mut Graph) -> usize {
    let mut dropped = 0;
    for node in graph.nodes_mut() {
        if let Some(policy) = node.as_policy_mut() {
            let before = policy.outputs.len();
            let mut seen: AHashSet<String> = AHashSet::new();
            policy.outputs.retain(|o| seen.insert(o.id.clone()));
            dropped += before - policy.outputs.len();
        }
    }
    dropped
}

fn drop_orphaned_outputs(graph: &mut Graph) -> usize {
    let declared: AHashMap<NodeId, AHashSet<String>> = graph
        .nodes()
        .iter()
        .filter_map(|n| {
            n.as_policy()
                .map(|p| (n.id.clone(), p.outputs.iter().map(|o| o.id.clone()).collect()))
        })
        .collect();

    let mut bound: AHashSet<(NodeId, String)> = AHashSet::new();
    let before = graph.nodes().len();
    graph.retain_nodes(|node| {
        let Some(output) = node.as_policy_output() else {
            return true;
        };
        let declared_here = declared
            .get(&output.parent_policy_id)
            .is_some_and(|ids| ids.contains(&output.output_id));
        declared_here && bound.insert((output.parent_policy_id.clone(), output.output_id.clone()))
    });
    before - graph.nodes().len()
}

fn rebuild_output_node_ids(graph: &mut Graph) {
    let mut children: AHashMap<NodeId, Vec<(String, NodeId)>> = AHashMap::new();
    for node in graph.nodes() {
        if let Some(output) = node.as_policy_output() {
            children
                .entry(output.parent_policy_id.clone())
                .or_default()
                .push((output.output_id.clone(), node.id.clone()));
        }
    }

    for node in graph.nodes_mut().filter(|n| n.kind() == NodeKind::Policy) {
        let bound = children.remove(&node.id).unwrap_or_default();
        if let Some(policy) = node.as_policy_mut() {
            policy.output_node_ids = policy
                .outputs
                .iter()
                .filter_map(|spec| {
                    bound
                        .iter()
                        .find(|(output_id, _)| *output_id == spec.id)
                        .map(|(_, node_id)| node_id.clone())
                })
                .collect();
        }
    }
}
