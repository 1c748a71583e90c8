//! Filename index
//!
//! The only metadata the service keeps: a mapping from filename to the
//! ordered list of blocks that reconstruct it, persisted as one JSON
//! document. Every mutating method holds the entry mutex across the whole
//! read-modify-write of the map plus the file rewrite, which makes each
//! mutation the linearization point for that filename.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Result, StoreError};
use super::BlockId;

/// Persistent filename → block-list mapping.
#[derive(Debug)]
pub struct Index {
    /// Path of the JSON document
    path: PathBuf,

    /// In-memory entries; the single mutex serializing all mutation
    entries: Mutex<HashMap<String, Vec<BlockId>>>,
}

impl Index {
    /// Load the index from disk. An absent file is an empty index; a file
    /// that exists but does not parse is an error (the data may still be
    /// intact and must not be clobbered by a fresh empty map).
    pub fn load(path: &Path) -> Result<Self> {
        let entries = match fs::read(path) {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|e| StoreError::Index(format!("cannot parse {}: {}", path.display(), e)))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "index file absent, starting empty");
                HashMap::new()
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    /// Look up the block list for a filename.
    pub fn get(&self, filename: &str) -> Option<Vec<BlockId>> {
        self.entries.lock().get(filename).cloned()
    }

    /// True when the filename has an entry.
    pub fn contains(&self, filename: &str) -> bool {
        self.entries.lock().contains_key(filename)
    }

    /// Insert or overwrite a mapping and persist. When two writers raced to
    /// this point, the later insert wins and the earlier one's blocks are
    /// orphaned until the next reaper pass.
    pub fn insert(&self, filename: &str, blocks: Vec<BlockId>) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(filename.to_string(), blocks);
        self.persist(&entries)
    }

    /// Replace an existing mapping and persist, returning the old block
    /// list. Fails with NotFound when the filename has no entry.
    pub fn replace(&self, filename: &str, blocks: Vec<BlockId>) -> Result<Vec<BlockId>> {
        let mut entries = self.entries.lock();
        if !entries.contains_key(filename) {
            return Err(StoreError::NotFound(filename.to_string()));
        }
        let old = entries
            .insert(filename.to_string(), blocks)
            .unwrap_or_default();
        self.persist(&entries)?;
        Ok(old)
    }

    /// Remove a mapping and persist, returning the removed block list.
    /// Fails with NotFound when the filename has no entry.
    pub fn remove(&self, filename: &str) -> Result<Vec<BlockId>> {
        let mut entries = self.entries.lock();
        let Some(old) = entries.remove(filename) else {
            return Err(StoreError::NotFound(filename.to_string()));
        };
        self.persist(&entries)?;
        Ok(old)
    }

    /// Snapshot of every block referenced by any entry (for the reaper).
    pub fn referenced_blocks(&self) -> HashSet<BlockId> {
        self.entries
            .lock()
            .values()
            .flat_map(|blocks| blocks.iter().cloned())
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().len() == 0
    }

    /// Rewrite the document in full. Writes a sibling temp file then renames
    /// it over the target, so a crash mid-write leaves either the old or the
    /// new contents readable, never a torn file.
    fn persist(&self, entries: &HashMap<String, Vec<BlockId>>) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| StoreError::Index(format!("cannot serialize index: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), entries = entries.len(), "index persisted");
        Ok(())
    }
}
