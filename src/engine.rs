//! File engine
//!
//! Composes the index and the block store into the four file operations.
//!
//! ## Locking discipline
//! The index mutex is never held across block I/O. WRITE checks for an
//! existing entry, releases the lock for the block-write phase, then
//! reacquires it to record the mapping; two concurrent WRITEs for the same
//! filename can therefore both pass the check, in which case the later
//! mapping wins and the loser's blocks stay on disk until the next
//! [`FileEngine::reap_orphans`] pass.

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::storage::{BlockStore, Index};

/// The storage engine behind the dispatcher.
pub struct FileEngine {
    index: Index,
    blocks: BlockStore,
}

impl FileEngine {
    /// Open the engine: create the blocks directory and load the index.
    pub fn open(config: &Config) -> Result<Self> {
        let blocks = BlockStore::open(&config.blocks_dir)?;
        let index = Index::load(&config.metadata_file)?;

        tracing::info!(
            blocks_dir = %config.blocks_dir.display(),
            metadata_file = %config.metadata_file.display(),
            files = index.len(),
            "file engine opened"
        );

        Ok(Self { index, blocks })
    }

    /// Store a new file. A filename that already has an entry is left
    /// untouched and the call succeeds: WRITE is an idempotent insert;
    /// UPDATE is the overwriting operation.
    pub fn write(&self, filename: &str, data: &[u8]) -> Result<()> {
        if self.index.contains(filename) {
            tracing::info!(file = filename, "file already exists, skipping write");
            return Ok(());
        }

        let block_ids = self.blocks.split_and_write(data)?;
        self.index.insert(filename, block_ids)?;

        tracing::info!(file = filename, bytes = data.len(), "file written");
        Ok(())
    }

    /// Read a file's full contents.
    pub fn read(&self, filename: &str) -> Result<Vec<u8>> {
        let block_ids = self
            .index
            .get(filename)
            .ok_or_else(|| StoreError::NotFound(filename.to_string()))?;

        self.blocks.read_all(&block_ids)
    }

    /// Replace a file's contents, returning the new contents.
    ///
    /// New blocks are written before the index swap, so a failure in either
    /// step leaves the old mapping readable; the half-written new blocks are
    /// orphans for the reaper. Old blocks are deleted best-effort after the
    /// swap.
    pub fn update(&self, filename: &str, data: &[u8]) -> Result<Vec<u8>> {
        if !self.index.contains(filename) {
            return Err(StoreError::NotFound(filename.to_string()));
        }

        let new_ids = self.blocks.split_and_write(data)?;
        let old_ids = self.index.replace(filename, new_ids)?;

        if let Err(e) = self.blocks.delete_all(&old_ids) {
            tracing::warn!(file = filename, error = %e, "old blocks not fully deleted after update");
        }

        tracing::info!(file = filename, bytes = data.len(), "file updated");
        Ok(data.to_vec())
    }

    /// Remove a file and its blocks.
    ///
    /// Existence means "in the index and every referenced block file is on
    /// disk", checked with one stat per block rather than a full read. The
    /// index entry is removed and persisted first; a block unlink failure is
    /// then reported to the caller but does not restore the entry.
    pub fn delete(&self, filename: &str) -> Result<()> {
        let block_ids = self
            .index
            .get(filename)
            .ok_or_else(|| StoreError::NotFound(filename.to_string()))?;
        self.blocks.stat_all(&block_ids)?;

        let block_ids = self.index.remove(filename)?;
        self.blocks.delete_all(&block_ids)?;

        tracing::info!(file = filename, blocks = block_ids.len(), "file deleted");
        Ok(())
    }

    /// Delete block files no index entry references. Run at startup, before
    /// the listener opens, to collect blocks orphaned by interrupted WRITEs
    /// and UPDATEs.
    pub fn reap_orphans(&self) -> Result<usize> {
        let referenced = self.index.referenced_blocks();
        self.blocks.reap_orphans(&referenced)
    }

    /// Number of files currently indexed.
    pub fn file_count(&self) -> usize {
        self.index.len()
    }
}
