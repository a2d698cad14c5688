mod common;
use common::*;
use stormflow::prelude::*;

#[cfg(test)]
mod sync_tests {
    use super::*;

    fn yes_no() -> Vec<PolicyOutputSpec> {
        vec![
            PolicyOutputSpec::new("yes", "Yes"),
            PolicyOutputSpec::new("no", "No"),
        ]
    }

    fn satellite(session: &Session, policy_id: &str, output_id: &str) -> NodeId {
        session
            .graph()
            .policy_output(policy_id, output_id)
            .map(|n| n.id.clone())
            .unwrap_or_else(|| panic!("no satellite for {policy_id}/{output_id}"))
    }

    fn position_of(session: &Session, node_id: &str) -> Position {
        session.graph().node(node_id).unwrap().position
    }

    fn assert_close(actual: Position, expected: Position) {
        assert!(
            (actual.x - expected.x).abs() < 1e-6 && (actual.y - expected.y).abs() < 1e-6,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn test_add_policy_spawns_one_satellite_per_output() {
        let mut session = Session::default();
        let policy = session
            .add_policy("In stock?", yes_no(), Position::new(0.0, 0.0))
            .unwrap();

        let yes = satellite(&session, &policy, "yes");
        let no = satellite(&session, &policy, "no");
        let data = session.graph().node(&policy).unwrap().as_policy().unwrap();
        assert_eq!(data.output_node_ids, vec![yes.clone(), no.clone()]);

        let yes_node = session.graph().node(&yes).unwrap();
        assert_eq!(yes_node.kind(), NodeKind::PolicyOutput);
        assert_eq!(yes_node.label(), "Yes");
        assert_eq!(
            yes_node.as_policy_output().unwrap().parent_policy_id,
            policy
        );
    }

    #[test]
    fn test_satellites_are_spread_along_their_side() {
        let mut session = Session::default();
        let outputs = vec![
            PolicyOutputSpec::new("yes", "Yes"),
            PolicyOutputSpec::new("no", "No"),
            PolicyOutputSpec::new("later", "Later")
                .on_side(Side::Bottom)
                .with_offset(60.0),
        ];
        let policy = session
            .add_policy("Check", outputs, Position::new(500.0, 0.0))
            .unwrap();

        // Default layout: 200x100 policy box, 120x40 satellites, 40 gap.
        assert_close(
            position_of(&session, &satellite(&session, &policy, "yes")),
            Position::new(740.0, 100.0 / 3.0 - 20.0),
        );
        assert_close(
            position_of(&session, &satellite(&session, &policy, "no")),
            Position::new(740.0, 200.0 / 3.0 - 20.0),
        );
        assert_close(
            position_of(&session, &satellite(&session, &policy, "later")),
            Position::new(540.0, 160.0),
        );
    }

    #[test]
    fn test_changing_outputs_keeps_surviving_satellites() {
        let mut session = Session::default();
        let policy = session
            .add_policy("Check", yes_no(), Position::default())
            .unwrap();
        let yes = satellite(&session, &policy, "yes");
        let no = satellite(&session, &policy, "no");
        let target = session.add_step("Backorder", Position::default());
        let no_edge = session.connect(&no, &target).unwrap();

        let change = session
            .set_policy_outputs(
                &policy,
                vec![
                    PolicyOutputSpec::new("yes", "Yes"),
                    PolicyOutputSpec::new("maybe", "Maybe"),
                ],
            )
            .unwrap();

        assert_eq!(change.removed_nodes, vec![no.clone()]);
        assert_eq!(change.removed_edges, vec![no_edge.clone()]);
        assert_eq!(change.added_nodes.len(), 1);
        assert!(change.relabeled_nodes.is_empty());

        assert_eq!(satellite(&session, &policy, "yes"), yes);
        assert!(session.graph().node(&no).is_none());
        assert!(session.graph().edge(&no_edge).is_none());
        assert!(session.graph().node(&target).is_some());

        let maybe = satellite(&session, &policy, "maybe");
        assert_eq!(change.added_nodes, vec![maybe.clone()]);
        let data = session.graph().node(&policy).unwrap().as_policy().unwrap();
        assert_eq!(data.output_node_ids, vec![yes, maybe]);
    }

    #[test]
    fn test_relabeled_output_keeps_its_node() {
        let mut session = Session::default();
        let policy = session
            .add_policy("Check", yes_no(), Position::default())
            .unwrap();
        let yes = satellite(&session, &policy, "yes");

        let change = session
            .set_policy_outputs(
                &policy,
                vec![
                    PolicyOutputSpec::new("yes", "Approved"),
                    PolicyOutputSpec::new("no", "No"),
                ],
            )
            .unwrap();

        assert_eq!(change.relabeled_nodes, vec![yes.clone()]);
        assert!(change.added_nodes.is_empty());
        assert!(change.removed_nodes.is_empty());
        assert_eq!(session.graph().node(&yes).unwrap().label(), "Approved");
    }

    #[test]
    fn test_renaming_satellite_renames_parent_output() {
        let mut session = Session::default();
        let policy = session
            .add_policy("Check", yes_no(), Position::default())
            .unwrap();
        let no = satellite(&session, &policy, "no");

        session.set_label(&no, "Rejected").unwrap();

        assert_eq!(session.graph().node(&no).unwrap().label(), "Rejected");
        let data = session.graph().node(&policy).unwrap().as_policy().unwrap();
        assert_eq!(data.output("no").unwrap().label, "Rejected");
        assert_eq!(satellite(&session, &policy, "no"), no);
    }

    #[test]
    fn test_duplicate_output_ids_are_rejected_without_changes() {
        let mut session = Session::default();
        let policy = session
            .add_policy("Check", yes_no(), Position::default())
            .unwrap();
        let before = session.graph().clone();

        let result = session.set_policy_outputs(
            &policy,
            vec![
                PolicyOutputSpec::new("yes", "Yes"),
                PolicyOutputSpec::new("yes", "Also yes"),
            ],
        );

        assert_eq!(
            result,
            Err(GraphError::DuplicateOutputId {
                policy_id: policy.clone(),
                output_id: "yes".to_string(),
            })
        );
        assert_eq!(session.graph(), &before);
    }

    #[test]
    fn test_add_policy_with_duplicate_outputs_leaves_no_trace() {
        let mut session = Session::default();
        let result = session.add_policy(
            "Check",
            vec![PolicyOutputSpec::new("a", "A"), PolicyOutputSpec::new("a", "A")],
            Position::default(),
        );

        assert!(matches!(result, Err(GraphError::DuplicateOutputId { .. })));
        assert!(session.graph().is_empty());
    }

    #[test]
    fn test_outputs_of_non_policy_are_rejected() {
        let mut session = Session::default();
        let step = session.add_step("Step", Position::default());

        let result = session.set_policy_outputs(&step, yes_no());
        assert_eq!(
            result,
            Err(GraphError::WrongNodeKind {
                node_id: step,
                expected: "policy",
                found: "step",
            })
        );

        let missing = session.set_policy_outputs("ghost", yes_no());
        assert_eq!(missing, Err(GraphError::NodeNotFound("ghost".to_string())));
    }

    #[test]
    fn test_policy_outputs_cannot_be_added_directly() {
        let mut session = Session::default();
        let data = NodeData::PolicyOutput(PolicyOutputData {
            label: "Yes".to_string(),
            parent_policy_id: "node_1".to_string(),
            output_id: "yes".to_string(),
            relative_position: Position::default(),
        });

        assert_eq!(
            session.add_node(data, Position::default()),
            Err(GraphError::ManagedNode)
        );
    }

    #[test]
    fn test_deleting_policy_cascades_to_satellites() {
        let mut session = Session::default();
        let before = session.add_step("Before", Position::default());
        let policy = session
            .add_policy("Check", yes_no(), Position::default())
            .unwrap();
        let yes = satellite(&session, &policy, "yes");
        let no = satellite(&session, &policy, "no");
        let n1 = session.add_step("Shipped", Position::default());
        let n2 = session.add_step("Backordered", Position::default());
        session.connect(&before, &policy).unwrap();
        session.connect(&yes, &n1).unwrap();
        session.connect(&no, &n2).unwrap();

        let removal = session.remove_nodes(std::slice::from_ref(&policy));

        let mut removed = removal.node_ids().into_iter().collect::<Vec<_>>();
        removed.sort();
        let mut expected = vec![policy.clone(), yes.clone(), no.clone()];
        expected.sort();
        assert_eq!(removed, expected);
        assert_eq!(removal.edges.len(), 3);

        for id in [&policy, &yes, &no] {
            assert!(session.graph().node(id).is_none());
            assert!(session.graph().incident(id).next().is_none());
        }
        assert!(session.graph().node(&n1).is_some());
        assert!(session.graph().node(&n2).is_some());
        assert!(session.graph().edges().is_empty());
    }

    #[test]
    fn test_deleting_satellite_drops_parent_output() {
        let mut session = Session::default();
        let policy = session
            .add_policy("Check", yes_no(), Position::default())
            .unwrap();
        let yes = satellite(&session, &policy, "yes");
        let no = satellite(&session, &policy, "no");

        session.remove_nodes(std::slice::from_ref(&no));

        let data = session.graph().node(&policy).unwrap().as_policy().unwrap();
        assert_eq!(
            data.outputs.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(),
            vec!["yes"]
        );
        assert_eq!(data.output_node_ids, vec![yes]);
    }

    #[test]
    fn test_deleting_nodes_purges_simulation_state() {
        let mut session = Session::builder().with_animation_duration(ANIM).build();
        let start = session.add_trigger("Start", Position::default());
        let next = session.add_step("Next", Position::default());
        let edge = session.connect(&start, &next).unwrap();
        session.trigger(&start);
        assert!(session.state().animating_edges().contains(&edge));

        session.remove_nodes(std::slice::from_ref(&start));

        assert!(!session.state().executed().contains(&start));
        assert!(!session.state().animating_edges().contains(&edge));
        assert_eq!(session.pending_timers(), 0);
        assert!(!session.is_simulation_active());
    }

    #[test]
    fn test_dragging_policy_carries_satellites() {
        let mut session = Session::default();
        let policy = session
            .add_policy("Check", yes_no(), Position::new(0.0, 0.0))
            .unwrap();
        let yes = satellite(&session, &policy, "yes");
        let yes_before = position_of(&session, &yes);
        let relative_before = session
            .graph()
            .node(&yes)
            .unwrap()
            .as_policy_output()
            .unwrap()
            .relative_position;

        let moved = session.move_node(&policy, Position::new(50.0, 20.0)).unwrap();

        assert_eq!(moved.len(), 3);
        assert_close(position_of(&session, &yes), yes_before.offset(50.0, 20.0));
        let relative_after = session
            .graph()
            .node(&yes)
            .unwrap()
            .as_policy_output()
            .unwrap()
            .relative_position;
        assert_eq!(relative_after, relative_before);
    }

    #[test]
    fn test_dragged_satellite_is_clamped_next_to_parent() {
        let mut session = Session::default();
        let policy = session
            .add_policy("Check", yes_no(), Position::new(0.0, 0.0))
            .unwrap();
        let yes = satellite(&session, &policy, "yes");

        // Far to the right: the gap is capped.
        session.move_node(&yes, Position::new(1000.0, 30.0)).unwrap();
        assert_close(position_of(&session, &yes), Position::new(350.0, 30.0));
        let relative = session
            .graph()
            .node(&yes)
            .unwrap()
            .as_policy_output()
            .unwrap()
            .relative_position;
        assert_close(relative, Position::new(350.0, 30.0));

        // Dropped onto the parent: pushed out through the nearest (top) border.
        session.move_node(&yes, Position::new(50.0, 20.0)).unwrap();
        assert_close(position_of(&session, &yes), Position::new(50.0, -50.0));
    }

    #[test]
    fn test_batch_move_does_not_double_move_satellites() {
        let mut session = Session::default();
        let policy = session
            .add_policy("Check", yes_no(), Position::new(0.0, 0.0))
            .unwrap();
        let yes = satellite(&session, &policy, "yes");
        let yes_before = position_of(&session, &yes);
        let step = session.add_step("Step", Position::default());

        session
            .move_nodes(&[
                (yes.clone(), Position::new(999.0, 999.0)),
                (policy.clone(), Position::new(100.0, 100.0)),
                (step.clone(), Position::new(7.0, 8.0)),
            ])
            .unwrap();

        assert_close(position_of(&session, &policy), Position::new(100.0, 100.0));
        assert_close(position_of(&session, &yes), yes_before.offset(100.0, 100.0));
        assert_close(position_of(&session, &step), Position::new(7.0, 8.0));
    }

    #[test]
    fn test_ensure_output_nodes_restores_missing_satellites() {
        let mut graph = Graph::from_parts(
            vec![Node::new(
                "P",
                Position::new(0.0, 0.0),
                NodeData::Policy(PolicyData::new("P", yes_no())),
            )],
            Vec::new(),
        );
        let mut ids = IdAllocator::after(&graph);
        let layout = LayoutConfig::default();

        let spawned = StructuralSync::new(&mut graph, &mut ids, &layout)
            .ensure_output_nodes("P")
            .unwrap();
        assert_eq!(spawned, vec!["node_1".to_string(), "node_2".to_string()]);

        let again = StructuralSync::new(&mut graph, &mut ids, &layout)
            .ensure_output_nodes("P")
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(
            graph.node("P").unwrap().as_policy().unwrap().output_node_ids,
            spawned
        );
    }

    #[test]
    fn test_sync_skips_taken_ids() {
        let mut graph = Graph::from_parts(
            vec![
                step("node_1"),
                policy("P", &[]),
            ],
            Vec::new(),
        );
        let mut ids = IdAllocator::new();
        let layout = LayoutConfig::default();

        let change = StructuralSync::new(&mut graph, &mut ids, &layout)
            .apply_outputs_change("P", vec![PolicyOutputSpec::new("go", "Go")])
            .unwrap();

        assert_eq!(change.added_nodes, vec!["node_2".to_string()]);
    }

    #[test]
    fn test_inverted_gap_range_does_not_panic() {
        let layout = LayoutConfig {
            min_gap: 200.0,
            max_gap: 10.0,
            ..LayoutConfig::default()
        };
        let (side, clamped) = layout.clamp_to_parent(Position::new(500.0, 10.0));
        assert_eq!(side, Side::Right);
        assert_close(clamped, Position::new(210.0, 10.0));

        let normalized = layout.normalized();
        assert_eq!((normalized.min_gap, normalized.max_gap), (10.0, 200.0));
    }

    #[test]
    fn test_session_normalizes_layout() {
        let layout = LayoutConfig {
            min_gap: 200.0,
            max_gap: 10.0,
            output_width: -120.0,
            ..LayoutConfig::default()
        };
        let mut session = Session::builder().with_layout(layout).build();
        assert_eq!(session.layout().output_width, 120.0);

        let policy = session
            .add_policy("Check", yes_no(), Position::new(0.0, 0.0))
            .unwrap();
        let yes = satellite(&session, &policy, "yes");

        session.move_node(&yes, Position::new(500.0, 10.0)).unwrap();
        assert_close(position_of(&session, &yes), Position::new(400.0, 10.0));
    }

    #[test]
    fn test_clamp_to_parent_picks_nearest_side() {
        let layout = LayoutConfig::default();

        let (side, _) = layout.clamp_to_parent(Position::new(-500.0, 30.0));
        assert_eq!(side, Side::Left);
        let (side, clamped) = layout.clamp_to_parent(Position::new(40.0, 400.0));
        assert_eq!(side, Side::Bottom);
        assert_close(clamped, Position::new(40.0, 250.0));
    }
}
