//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the stormflow crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use stormflow::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let flow_json = std::fs::read_to_string("path/to/flow.json")?;
//!
//! let mut session = Session::default();
//! let report = session.import_json(&flow_json)?;
//! println!("cleanup: {:?}", report);
//!
//! let triggers: Vec<NodeId> = session
//!     .graph()
//!     .nodes()
//!     .iter()
//!     .filter(|n| n.kind() == NodeKind::Trigger)
//!     .map(|n| n.id.clone())
//!     .collect();
//! for trigger in &triggers {
//!     session.trigger(trigger);
//! }
//! session.run_until_idle();
//! println!("executed: {:?}", session.state().executed());
//! # Ok(())
//! # }
//! ```

// Session and engine
pub use crate::engine::{
    NodeStatus, EdgeStatus, SimEvent, SimulationEngine, SimulationState, TimedEvent,
    TimerScheduler, VirtualTimers,
};
pub use crate::session::{Session, SessionBuilder};

// Graph model
pub use crate::graph::{
    CardData, Edge, EdgeId, Graph, IdAllocator, Node, NodeData, NodeId, NodeKind, PolicyData,
    PolicyOutputData, PolicyOutputSpec, Position, Side, compute_downstream, compute_upstream,
};

// Structural sync and view
pub use crate::sync::{LayoutConfig, OutputsChange, Removal, StructuralSync};
pub use crate::view::{EdgeView, Hover, NodeAction, NodeView, ViewModel, project};

// Documents and persistence
pub use crate::document::{CleanupReport, FlowDocument, IntoGraph, cleanup};
pub use crate::storage::{DirectoryStore, MemoryStore, SnapshotStore};

// Error types
pub use crate::error::{GraphError, ImportError, StorageError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
