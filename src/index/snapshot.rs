//! Index snapshots: an opaque blob codec plus on-disk save/load, so a
//! catalog does not have to be re-embedded on every process start.
//!
//! Blob layout: `[crc32: u32 le][payload: bincode(IndexSnapshot)]`.

use crate::error::{Result, SearchError};
use crate::vector::{ItemId, Modality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One stored vector in serialized form. Values are already unit-norm.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: ItemId,
    pub modality: Modality,
    pub values: Vec<f32>,
}

/// Serializable form of the full vector set.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub dimensions: usize,
    pub entries: Vec<SnapshotEntry>,
}

/// Encode a snapshot into a checksummed blob.
pub fn encode(snapshot: &IndexSnapshot) -> Result<Vec<u8>> {
    let payload = bincode::serialize(snapshot)
        .map_err(|e| SearchError::SerializationError(e.to_string()))?;
    let crc = crc32fast::hash(&payload);

    let mut blob = Vec::with_capacity(4 + payload.len());
    blob.extend_from_slice(&crc.to_le_bytes());
    blob.extend_from_slice(&payload);
    Ok(blob)
}

/// Decode a blob, verifying its checksum.
pub fn decode(blob: &[u8]) -> Result<IndexSnapshot> {
    if blob.len() < 4 {
        return Err(SearchError::SerializationError(
            "Snapshot blob too short".to_string(),
        ));
    }
    let (crc_bytes, payload) = blob.split_at(4);
    let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let actual = crc32fast::hash(payload);
    if expected != actual {
        return Err(SearchError::SerializationError(format!(
            "Snapshot checksum mismatch: expected {expected:08x}, got {actual:08x}"
        )));
    }
    bincode::deserialize(payload).map_err(|e| SearchError::SerializationError(e.to_string()))
}

/// Manages saving and loading snapshot blobs in a data directory.
pub struct SnapshotManager {
    dir: PathBuf,
}

impl SnapshotManager {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("snapshot.bin")
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }

    /// Write a snapshot blob plus a human-readable manifest.
    pub fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let blob = encode(snapshot)?;
        fs::write(self.snapshot_path(), &blob)?;

        let manifest = serde_json::json!({
            "vector_count": snapshot.entries.len(),
            "dimensions": snapshot.dimensions,
        });
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| SearchError::SerializationError(e.to_string()))?;
        fs::write(self.manifest_path(), &manifest_bytes)?;

        Ok(())
    }

    /// Save raw pre-encoded blob bytes (as produced by
    /// `VectorIndex::snapshot`).
    pub fn save_blob(&self, blob: &[u8]) -> Result<()> {
        let snapshot = decode(blob)?;
        self.save(&snapshot)
    }

    /// Load the snapshot blob, or None if no snapshot exists.
    pub fn load_blob(&self) -> Result<Option<Vec<u8>>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(&path)?))
    }

    /// Load and decode the snapshot, or None if no snapshot exists.
    pub fn load(&self) -> Result<Option<IndexSnapshot>> {
        match self.load_blob()? {
            Some(blob) => Ok(Some(decode(&blob)?)),
            None => Ok(None),
        }
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }
}
