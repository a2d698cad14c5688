mod common;
use common::*;
use std::time::Duration;
use stormflow::prelude::*;

#[cfg(test)]
mod integration_tests {
    use super::*;

    fn order_session() -> Session {
        let mut session = Session::builder().with_animation_duration(ANIM).build();
        session.import_json(ORDER_FLOW_JSON).unwrap();
        session
    }

    #[test]
    fn test_order_flow_end_to_end() {
        let mut session = order_session();

        session.trigger("node_1");
        session.run_until_idle();
        assert!(session.state().waiting_for_decision().contains("node_3"));

        session.resolve_policy_decision("node_3", "yes");
        session.run_until_idle();

        let state = session.state();
        for id in ["node_1", "node_2", "node_3", "node_6"] {
            assert!(state.executed().contains(id), "{id} should be executed");
        }
        assert!(!state.executed().contains("node_7"));
        assert_eq!(state.edge_status("edge_3"), EdgeStatus::Executed);
        assert_eq!(state.edge_status("edge_4"), EdgeStatus::Idle);
        assert_edge_sets_disjoint(state);

        // Changing the decision moves the token to the other branch.
        session.resolve_policy_decision("node_3", "no");
        session.run_until_idle();
        assert!(session.state().executed().contains("node_7"));
        assert!(!session.state().executed().contains("node_6"));
    }

    #[test]
    fn test_view_reflects_running_wave() {
        let mut session = order_session();
        session.trigger("node_1");

        let view = session.view();
        let start = view.node("node_1").unwrap();
        assert!(start.is_executed);
        assert!(start.is_connected);
        assert!(start.actions.contains(&NodeAction::Trigger));

        let edge = view.edge("edge_1").unwrap();
        assert!(edge.is_animating);
        assert!(!edge.is_executed);
        assert_eq!(edge.animation_duration, ANIM);
        assert!(view.show_reset);

        session.advance(ANIM);
        let view = session.view();
        assert!(view.node("node_2").unwrap().is_executed);
        assert!(view.edge("edge_1").unwrap().is_executed);
        assert!(view.edge("edge_2").unwrap().is_animating);
    }

    #[test]
    fn test_view_offers_decisions_while_policy_waits() {
        let mut session = order_session();
        let view = session.view();
        let yes = view.node("node_4").unwrap();
        assert_eq!(yes.actions, vec![NodeAction::TriggerFromOutput]);

        session.trigger("node_1");
        session.run_until_idle();

        let view = session.view();
        assert!(view.node("node_3").unwrap().is_waiting_for_decision);
        assert!(view.node("node_3").unwrap().actions.is_empty());
        assert!(view.node("node_4").unwrap().actions.contains(&NodeAction::Decide {
            policy_id: "node_3".to_string(),
            output_id: "yes".to_string(),
        }));
    }

    #[test]
    fn test_view_marks_triggered_output() {
        let mut session = order_session();
        session.trigger_from_output("node_5");

        let view = session.view();
        assert!(view.node("node_5").unwrap().is_triggered);
        assert!(!view.node("node_4").unwrap().is_triggered);

        session.run_until_idle();
        assert!(session.state().executed().contains("node_7"));
    }

    #[test]
    fn test_view_hover_and_connectivity() {
        let mut session = order_session();
        let lonely = session.add_step("Unconnected", Position::default());
        session.set_hovered_edge(Some("edge_2".to_string()));

        let view = session.view();
        assert!(view.node("node_2").unwrap().is_edge_hovered);
        assert!(view.node("node_3").unwrap().is_edge_hovered);
        assert!(!view.node("node_1").unwrap().is_edge_hovered);
        assert!(!view.node(&lonely).unwrap().is_connected);
        assert!(!view.show_reset);

        session.set_hovered_edge(Some("ghost".to_string()));
        assert!(session.view().nodes.iter().all(|n| !n.is_edge_hovered));
    }

    #[test]
    fn test_manual_execution_of_armed_node() {
        let mut session = order_session();
        session.activate("node_2");

        let view = session.view();
        assert!(view.node("node_2").unwrap().is_active);
        assert!(view.node("node_2").unwrap().actions.contains(&NodeAction::Execute));

        session.execute_node("node_2");
        session.run_until_idle();
        assert!(session.state().waiting_for_decision().contains("node_3"));
        assert!(!session.state().executed().contains("node_1"));
    }

    #[test]
    fn test_reset_hides_reset_control() {
        let mut session = order_session();
        session.trigger("node_1");
        session.advance(Duration::from_millis(10));

        session.reset_simulation();

        let view = session.view();
        assert!(!view.show_reset);
        assert!(view.nodes.iter().all(|n| !n.is_executed && !n.is_waiting_for_decision));
        assert!(view.edges.iter().all(|e| !e.is_animating && !e.is_executed));
        assert_eq!(session.pending_timers(), 0);
    }

    #[test]
    fn test_editing_outputs_during_a_wave() {
        let mut session = order_session();
        session.trigger("node_1");
        session.run_until_idle();
        session.resolve_policy_decision("node_3", "no");
        assert!(session.state().animating_edges().contains("edge_4"));

        session
            .set_policy_outputs("node_3", vec![PolicyOutputSpec::new("yes", "Yes")])
            .unwrap();

        assert!(session.graph().node("node_5").is_none());
        assert!(!session.state().animating_edges().contains("edge_4"));
        assert_eq!(session.pending_timers(), 0);
        assert_eq!(session.run_until_idle(), 0);
        assert!(!session.state().executed().contains("node_7"));
    }

    #[test]
    fn test_built_session_with_initial_graph() {
        let mut session = Session::builder()
            .with_animation_duration(ANIM)
            .with_graph(create_policy_flow())
            .build();

        session.trigger("T");
        session.run_until_idle();
        session.resolve_policy_decision("P", "yes");
        session.run_until_idle();

        assert!(session.state().executed().contains("X"));
        assert_eq!(session.now(), ANIM * 3);

        let journal = session.drain_journal();
        assert!(journal.iter().any(|e| e.event
            == SimEvent::DecisionResolved {
                policy_id: "P".to_string(),
                output_id: "yes".to_string(),
            }));
    }

    #[test]
    fn test_export_after_edits_reimports_identically() {
        let mut session = order_session();
        let notify = session.add_step("Customer notified", Position::new(1100.0, 0.0));
        session.connect_with_handles("node_6", &notify, Some("right"), Some("left")).unwrap();
        session.move_node("node_3", Position::new(520.0, 10.0)).unwrap();

        let json = session.export_json();
        let mut copy = Session::default();
        let report = copy.import_json(&json).unwrap();

        assert!(report.is_clean());
        assert_eq!(copy.graph(), session.graph());
    }
}
