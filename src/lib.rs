//! # stormflow - Event-Storming Flow Simulation Engine
//!
//! **stormflow** models event-storming workflows as directed graphs of Trigger, Step and
//! Policy nodes, and simulates how an execution token travels through them. Tokens move
//! along edges with a timed animation, stop at Policy nodes until a decision picks a
//! branch, and re-triggering a node cleanly unwinds the previous run, cycles included.
//!
//! ## Core Workflow
//!
//! 1.  **Build or Load a Graph**: Create nodes through a [`Session`](session::Session),
//!     or import a JSON flow document. Imports go through a cleanup pass that drops
//!     dangling and duplicate edges and orphaned policy outputs.
//! 2.  **Edit**: Policy outputs are satellite nodes kept in sync with the policy's output
//!     list by the structural sync controller (spawn, relabel, cascade delete, drag).
//! 3.  **Simulate**: Fire triggers, resolve policy decisions and advance the virtual clock.
//!     Every animation is a cancellable task on a deterministic timer queue.
//! 4.  **Render**: Project the graph and simulation state into a [`ViewModel`](view::ViewModel)
//!     of per-node and per-edge flags.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stormflow::prelude::*;
//! use std::time::Duration;
//!
//! let mut session = Session::builder()
//!     .with_animation_duration(Duration::from_millis(500))
//!     .build();
//!
//! let order = session.add_trigger("Place order", Position::new(0.0, 0.0));
//! let placed = session.add_step("Order placed", Position::new(250.0, 0.0));
//! let check = session
//!     .add_policy(
//!         "In stock?",
//!         vec![PolicyOutputSpec::new("yes", "Yes"), PolicyOutputSpec::new("no", "No")],
//!         Position::new(500.0, 0.0),
//!     )
//!     .expect("policy outputs are unique");
//! let shipped = session.add_step("Order shipped", Position::new(900.0, 0.0));
//!
//! session.connect(&order, &placed).unwrap();
//! session.connect(&placed, &check).unwrap();
//! let yes = session.graph().policy_output(&check, "yes").unwrap().id.clone();
//! session.connect(&yes, &shipped).unwrap();
//!
//! session.trigger(&order);
//! session.run_until_idle();
//! assert!(session.state().waiting_for_decision().contains(&check));
//!
//! session.resolve_policy_decision(&check, "yes");
//! session.run_until_idle();
//! assert!(session.state().executed().contains(&shipped));
//!
//! let view = session.view();
//! println!("reset control visible: {}", view.show_reset);
//! ```

pub mod document;
pub mod engine;
pub mod error;
pub mod graph;
pub mod prelude;
pub mod session;
pub mod storage;
pub mod sync;
pub mod view;
