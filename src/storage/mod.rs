//! Keyed persistence of flow documents.
//!
//! Storage problems never reach the engine: a failed load is "no saved state" and a
//! failed save is skipped, both logged.

use crate::document::{CleanupReport, FlowDocument, IntoGraph, cleanup};
use crate::error::StorageError;
use crate::graph::Graph;
use ahash::AHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

mod snapshot;

pub use snapshot::*;

/// The key the editor stores its current flow under.
pub const DEFAULT_STORAGE_KEY: &str = "event-storming-flow";

/// Delay between the last change and the write it triggers.
pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(300);

/// A string store addressed by key.
pub trait SnapshotStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn save(&mut self, key: &str, contents: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// Volatile store, mostly for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: AHashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, contents: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl SnapshotStore for DirectoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn save(&mut self, key: &str, contents: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        let path = self.path_for(key);
        fs::write(&path, contents).map_err(|e| io_error(&path, e))
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(io_error(&path, e)),
            _ => Ok(()),
        }
    }
}

/// Reads and cleans the graph stored under `key`.
pub fn try_load_graph(
    store: &dyn SnapshotStore,
    key: &str,
) -> Result<Option<(Graph, CleanupReport)>, StorageError> {
    let Some(contents) = store.load(key)? else {
        return Ok(None);
    };
    let mut graph = FlowDocument::from_json(&contents)?.into_graph()?;
    let report = cleanup(&mut graph);
    Ok(Some((graph, report)))
}

/// Like [`try_load_graph`], but any failure counts as "no saved state".
pub fn load_graph(store: &dyn SnapshotStore, key: &str) -> Option<Graph> {
    match try_load_graph(store, key) {
        Ok(loaded) => loaded.map(|(graph, _)| graph),
        Err(e) => {
            warn!(key, error = %e, "failed to load saved flow, starting empty");
            None
        }
    }
}

/// Writes the graph under `key`. Returns `false` (and logs) if the write was skipped.
pub fn save_graph(store: &mut dyn SnapshotStore, key: &str, graph: &Graph) -> bool {
    let contents = FlowDocument::from_graph(graph).to_json_pretty();
    match store.save(key, &contents) {
        Ok(()) => {
            debug!(key, nodes = graph.nodes().len(), edges = graph.edges().len(), "flow saved");
            true
        }
        Err(e) => {
            warn!(key, error = %e, "failed to save flow, skipping");
            false
        }
    }
}

/// Coalesces bursts of changes into one write, `delay` after the last change.
#[derive(Debug, Clone)]
pub struct DebouncedSaver {
    delay: Duration,
    last_change: Option<Duration>,
}

impl DebouncedSaver {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_change: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Records a change at `now`, restarting the quiet period.
    pub fn mark_dirty(&mut self, now: Duration) {
        self.last_change = Some(now);
    }

    pub fn is_dirty(&self) -> bool {
        self.last_change.is_some()
    }

    /// When the pending write becomes due, if any.
    pub fn due_at(&self) -> Option<Duration> {
        self.last_change.map(|changed| changed + self.delay)
    }

    /// Returns `true` once per quiet period, clearing the dirty flag.
    pub fn take_due(&mut self, now: Duration) -> bool {
        match self.due_at() {
            Some(due) if now >= due => {
                self.last_change = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.last_change = None;
    }
}

impl Default for DebouncedSaver {
    fn default() -> Self {
        Self::new(DEFAULT_SAVE_DEBOUNCE)
    }
}
