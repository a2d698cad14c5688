//! Common test utilities for building flow graphs and engines.
use std::time::Duration;
use stormflow::prelude::*;

/// Animation duration used by every test engine.
#[allow(dead_code)]
pub const ANIM: Duration = Duration::from_millis(100);

#[allow(dead_code)]
pub fn engine() -> SimulationEngine {
    SimulationEngine::new(ANIM)
}

#[allow(dead_code)]
pub fn trigger(id: &str) -> Node {
    Node::new(id, Position::default(), NodeData::Trigger(CardData::new(id)))
}

#[allow(dead_code)]
pub fn step(id: &str) -> Node {
    Node::new(id, Position::default(), NodeData::Step(CardData::new(id)))
}

/// A policy node declaring `outputs` as `(output_id, satellite_node_id)` pairs.
#[allow(dead_code)]
pub fn policy(id: &str, outputs: &[(&str, &str)]) -> Node {
    let mut data = PolicyData::new(
        id,
        outputs
            .iter()
            .map(|(output_id, _)| PolicyOutputSpec::new(*output_id, *output_id))
            .collect(),
    );
    data.output_node_ids = outputs.iter().map(|(_, node_id)| node_id.to_string()).collect();
    Node::new(id, Position::default(), NodeData::Policy(data))
}

#[allow(dead_code)]
pub fn output(id: &str, parent: &str, output_id: &str) -> Node {
    Node::new(
        id,
        Position::default(),
        NodeData::PolicyOutput(PolicyOutputData {
            label: output_id.to_string(),
            parent_policy_id: parent.to_string(),
            output_id: output_id.to_string(),
            relative_position: Position::default(),
        }),
    )
}

#[allow(dead_code)]
pub fn edge(id: &str, source: &str, target: &str) -> Edge {
    Edge::new(id, source, target)
}

/// `T1 -> S1 -> S2`
#[allow(dead_code)]
pub fn create_linear_flow() -> Graph {
    Graph::from_parts(
        vec![trigger("T1"), step("S1"), step("S2")],
        vec![edge("e1", "T1", "S1"), edge("e2", "S1", "S2")],
    )
}

/// `T -> A -> P`, with P's output `yes` (node `o_yes`) leading to X and `no` (node `o_no`)
/// leading to Y.
#[allow(dead_code)]
pub fn create_policy_flow() -> Graph {
    Graph::from_parts(
        vec![
            trigger("T"),
            step("A"),
            policy("P", &[("yes", "o_yes"), ("no", "o_no")]),
            output("o_yes", "P", "yes"),
            output("o_no", "P", "no"),
            step("X"),
            step("Y"),
        ],
        vec![
            edge("e_t_a", "T", "A"),
            edge("e_a_p", "A", "P"),
            edge("e_yes_x", "o_yes", "X"),
            edge("e_no_y", "o_no", "Y"),
        ],
    )
}

/// `T -> A -> B -> T` plus `B -> C`.
#[allow(dead_code)]
pub fn create_cyclic_flow() -> Graph {
    Graph::from_parts(
        vec![trigger("T"), step("A"), step("B"), step("C")],
        vec![
            edge("e_t_a", "T", "A"),
            edge("e_a_b", "A", "B"),
            edge("e_b_t", "B", "T"),
            edge("e_b_c", "B", "C"),
        ],
    )
}

/// `T -> P`; output `retry` loops back through A into P, output `done` leads to D.
#[allow(dead_code)]
pub fn create_loop_back_flow() -> Graph {
    Graph::from_parts(
        vec![
            trigger("T"),
            policy("P", &[("retry", "o_retry"), ("done", "o_done")]),
            output("o_retry", "P", "retry"),
            output("o_done", "P", "done"),
            step("A"),
            step("D"),
        ],
        vec![
            edge("e_t_p", "T", "P"),
            edge("e_retry_a", "o_retry", "A"),
            edge("e_a_p", "A", "P"),
            edge("e_done_d", "o_done", "D"),
        ],
    )
}

#[allow(dead_code)]
pub fn assert_edge_sets_disjoint(state: &SimulationState) {
    let overlap: Vec<_> = state
        .animating_edges()
        .intersection(state.executed_edges())
        .collect();
    assert!(overlap.is_empty(), "edges both animating and executed: {:?}", overlap);
}

/// A small flow document in the editor's JSON format.
#[allow(dead_code)]
pub const ORDER_FLOW_JSON: &str = r#"{
  "nodes": [
    { "id": "node_1", "type": "trigger", "position": { "x": 0, "y": 0 },
      "data": { "label": "Place order" } },
    { "id": "node_2", "type": "step", "position": { "x": 250, "y": 0 },
      "data": { "label": "Order placed", "description": "Customer submitted the cart" } },
    { "id": "node_3", "type": "policy", "position": { "x": 500, "y": 0 },
      "data": { "label": "In stock?",
                "outputs": [ { "id": "yes", "label": "Yes", "edgePosition": "right" },
                             { "id": "no", "label": "No", "edgePosition": "bottom", "offset": 60 } ],
                "outputNodeIds": ["node_4", "node_5"] } },
    { "id": "node_4", "type": "policyOutput", "position": { "x": 740, "y": 13 },
      "data": { "label": "Yes", "parentPolicyId": "node_3", "outputId": "yes",
                "relativePosition": { "x": 240, "y": 13 } } },
    { "id": "node_5", "type": "policyOutput", "position": { "x": 540, "y": 160 },
      "data": { "label": "No", "parentPolicyId": "node_3", "outputId": "no",
                "relativePosition": { "x": 40, "y": 160 } } },
    { "id": "node_6", "type": "step", "position": { "x": 900, "y": 0 },
      "data": { "label": "Order shipped" } },
    { "id": "node_7", "type": "step", "position": { "x": 500, "y": 300 },
      "data": { "label": "Order backordered" } }
  ],
  "edges": [
    { "id": "edge_1", "source": "node_1", "sourceHandle": "right", "target": "node_2", "targetHandle": "left" },
    { "id": "edge_2", "source": "node_2", "sourceHandle": "right", "target": "node_3", "targetHandle": "left" },
    { "id": "edge_3", "source": "node_4", "sourceHandle": "right", "target": "node_6", "targetHandle": "left" },
    { "id": "edge_4", "source": "node_5", "sourceHandle": "bottom", "target": "node_7", "targetHandle": "top" }
  ]
}"#;
