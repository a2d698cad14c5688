use super::Graph;

/// Hands out fresh node and edge ids for one session.
///
/// Ids have the form `node_<n>` / `edge_<n>`. After an import the counters are moved
/// past the largest numeric suffix present so new ids never collide with loaded ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next_node: u64,
    next_edge: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self {
            next_node: 1,
            next_edge: 1,
        }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An allocator whose counters continue after every id in `graph`.
    pub fn after(graph: &Graph) -> Self {
        let mut ids = Self::new();
        ids.observe(graph);
        ids
    }

    pub fn next_node_id(&mut self) -> String {
        let id = format!("node_{}", self.next_node);
        self.next_node = self.next_node.saturating_add(1);
        id
    }

    pub fn next_edge_id(&mut self) -> String {
        let id = format!("edge_{}", self.next_edge);
        self.next_edge = self.next_edge.saturating_add(1);
        id
    }

    /// Moves the counters past the maximum numeric suffix seen in `graph`.
    ///
    /// A suffix of `u64::MAX` leaves no room after it and is skipped; callers already
    /// step over ids that are taken.
    pub fn observe(&mut self, graph: &Graph) {
        let past = |suffix: Option<u64>| suffix.and_then(|n| n.checked_add(1));
        if let Some(next) = graph.nodes().iter().filter_map(|n| past(numeric_suffix(&n.id))).max() {
            self.next_node = self.next_node.max(next);
        }
        if let Some(next) = graph.edges().iter().filter_map(|e| past(numeric_suffix(&e.id))).max() {
            self.next_edge = self.next_edge.max(next);
        }
    }

    pub fn peek_node_counter(&self) -> u64 {
        self.next_node
    }
}

/// The trailing run of ASCII digits of `id`, if any (`"node_12"` → `12`).
pub fn numeric_suffix(id: &str) -> Option<u64> {
    let digits_start = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    id[digits_start..].parse().ok()
}
