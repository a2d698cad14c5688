use thiserror::Error;

/// Errors raised by explicit graph edits (adding, connecting, updating nodes).
///
/// Simulation operations never return these: a trigger or decision that names a
/// missing node is a silent no-op.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node '{0}' not found in the graph")]
    NodeNotFound(String),

    #[error("Edge '{0}' not found in the graph")]
    EdgeNotFound(String),

    #[error("A node with id '{0}' already exists")]
    DuplicateNodeId(String),

    #[error("An edge with id '{0}' already exists")]
    DuplicateEdgeId(String),

    #[error("Node '{node_id}' is a {found} node, but a {expected} node was required")]
    WrongNodeKind {
        node_id: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Policy '{policy_id}' declares output id '{output_id}' more than once")]
    DuplicateOutputId {
        policy_id: String,
        output_id: String,
    },

    #[error("Policy output nodes are managed by their parent policy and cannot be added directly")]
    ManagedNode,
}

/// Errors that can occur while importing a flow document.
///
/// An import that fails leaves the current graph untouched.
#[derive(Error, Debug, Clone)]
pub enum ImportError {
    #[error("Failed to parse flow JSON: {0}")]
    JsonParseError(String),

    #[error("Flow document is missing the required '{0}' key")]
    MissingKey(&'static str),

    #[error("Node '{node_id}' has an unknown node type: '{type_name}'")]
    UnknownNodeType { node_id: String, type_name: String },

    #[error("Node '{node_id}' has an invalid data payload: {message}")]
    InvalidPayload { node_id: String, message: String },

    #[error("Flow document contains duplicate node id '{0}'")]
    DuplicateNodeId(String),

    #[error("Flow document contains duplicate edge id '{0}'")]
    DuplicateEdgeId(String),
}

/// Errors raised by snapshot stores. Callers treat these as "no saved state".
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot encoding failed: {0}")]
    Encode(String),

    #[error("Snapshot decoding failed: {0}")]
    Decode(String),

    #[error(transparent)]
    Import(#[from] ImportError),
}
