use crate::error::StorageError;
use crate::graph::Graph;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use std::fs;
use std::io::{Read, Write};

/// Encodes a graph into the compact binary snapshot format.
pub fn encode_snapshot(graph: &Graph) -> Result<Vec<u8>, StorageError> {
    encode_to_vec(graph, standard()).map_err(|e| StorageError::Encode(e.to_string()))
}

/// Decodes a graph from a binary snapshot. The result has not been cleaned up.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Graph, StorageError> {
    decode_from_slice(bytes, standard())
        .map(|(graph, _)| graph) // bincode 2 returns a tuple (data, bytes_read)
        .map_err(|e| StorageError::Decode(e.to_string()))
}

/// Saves a binary snapshot of the graph to a file.
pub fn save_snapshot_file(graph: &Graph, path: &str) -> Result<(), StorageError> {
    let bytes = encode_snapshot(graph)?;
    let mut file = fs::File::create(path).map_err(|source| StorageError::Io {
        path: path.to_string(),
        source,
    })?;
    file.write_all(&bytes).map_err(|source| StorageError::Io {
        path: path.to_string(),
        source,
    })?;
    Ok(())
}

/// Loads a binary snapshot from a file.
pub fn load_snapshot_file(path: &str) -> Result<Graph, StorageError> {
    let mut file = fs::File::open(path).map_err(|source| StorageError::Io {
        path: path.to_string(),
        source,
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|source| StorageError::Io {
        path: path.to_string(),
        source,
    })?;
    decode_snapshot(&bytes)
}
