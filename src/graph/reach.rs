use super::{Graph, NodeId};
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;

/// Returns every node reachable from `start` by following outgoing edges.
///
/// Breadth-first, each node visited at most once, so cycles terminate. `start` is
/// never part of the result, even when a cycle leads back to it. An unknown `start`
/// yields an empty set.
pub fn compute_downstream(graph: &Graph, start: &str) -> AHashSet<NodeId> {
    let mut adjacency: AHashMap<&str, Vec<&str>> = AHashMap::new();
    for edge in graph.edges() {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }
    traverse(graph, start, &adjacency)
}

/// Mirror of [`compute_downstream`] over incoming edges.
pub fn compute_upstream(graph: &Graph, start: &str) -> AHashSet<NodeId> {
    let mut adjacency: AHashMap<&str, Vec<&str>> = AHashMap::new();
    for edge in graph.edges() {
        adjacency
            .entry(edge.target.as_str())
            .or_default()
            .push(edge.source.as_str());
    }
    traverse(graph, start, &adjacency)
}

fn traverse(graph: &Graph, start: &str, adjacency: &AHashMap<&str, Vec<&str>>) -> AHashSet<NodeId> {
    let mut reached = AHashSet::new();
    if !graph.contains_node(start) {
        return reached;
    }

    let mut visited: AHashSet<&str> = AHashSet::new();
    visited.insert(start);
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        let Some(neighbours) = adjacency.get(current) else {
            continue;
        };
        for &next in neighbours {
            if visited.insert(next) {
                reached.insert(next.to_string());
                queue.push_back(next);
            }
        }
    }
    reached
}
