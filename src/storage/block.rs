//! Block store
//!
//! Persists payloads as a sequence of fixed-size files in the blocks
//! directory. Block I/O within a single request fans out to one thread per
//! block with a join barrier; the caller-visible order is always slice order,
//! never completion order.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// The fixed size for each storage block, 256 kilobytes.
pub const BLOCK_SIZE: usize = 256_000;

/// File extension carried by every block identifier.
const BLOCK_SUFFIX: &str = ".bin";

/// Opaque identifier for one block.
///
/// The string form is the block's on-disk filename (`<uuid>.bin`) and is what
/// the index stores, so an index entry can be joined to the blocks directory
/// without further mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Mint a fresh, collision-resistant identifier.
    fn mint() -> Self {
        BlockId(format!("{}{}", Uuid::new_v4(), BLOCK_SUFFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the given filename is shaped like a block file.
    pub fn is_block_filename(name: &str) -> bool {
        name.ends_with(BLOCK_SUFFIX)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        BlockId(s)
    }
}

/// Writes, reads and unlinks block files in one directory.
pub struct BlockStore {
    blocks_dir: PathBuf,
}

impl BlockStore {
    /// Open the store, creating the blocks directory if needed.
    pub fn open(blocks_dir: &Path) -> Result<Self> {
        fs::create_dir_all(blocks_dir)?;
        Ok(Self {
            blocks_dir: blocks_dir.to_path_buf(),
        })
    }

    /// Path of one block file.
    pub fn block_path(&self, id: &BlockId) -> PathBuf {
        self.blocks_dir.join(id.as_str())
    }

    /// Slice `payload` into BLOCK_SIZE chunks and write each chunk to its own
    /// file concurrently. Returns the minted identifiers in slice order.
    ///
    /// If any single write fails the whole operation fails; blocks that were
    /// already written stay on disk and are collected by the startup reaper.
    pub fn split_and_write(&self, payload: &[u8]) -> Result<Vec<BlockId>> {
        let ids: Vec<BlockId> = payload.chunks(BLOCK_SIZE).map(|_| BlockId::mint()).collect();

        tracing::debug!(blocks = ids.len(), bytes = payload.len(), "writing blocks");

        let results: Vec<io::Result<()>> = thread::scope(|s| {
            let handles: Vec<_> = payload
                .chunks(BLOCK_SIZE)
                .zip(&ids)
                .map(|(chunk, id)| {
                    let path = self.block_path(id);
                    s.spawn(move || write_block(&path, chunk))
                })
                .collect();

            handles
                .into_iter()
                .map(|h| h.join().expect("block writer panicked"))
                .collect()
        });

        for (result, id) in results.into_iter().zip(&ids) {
            if let Err(e) = result {
                tracing::error!(block = %id, error = %e, "block write failed");
                return Err(StoreError::Io(e));
            }
        }

        Ok(ids)
    }

    /// Read every block concurrently and join the chunks in input order.
    /// Partial data is never returned.
    pub fn read_all(&self, ids: &[BlockId]) -> Result<Vec<u8>> {
        let results: Vec<io::Result<Vec<u8>>> = thread::scope(|s| {
            let handles: Vec<_> = ids
                .iter()
                .map(|id| {
                    let path = self.block_path(id);
                    s.spawn(move || fs::read(&path))
                })
                .collect();

            handles
                .into_iter()
                .map(|h| h.join().expect("block reader panicked"))
                .collect()
        });

        let mut payload = Vec::new();
        for (result, id) in results.into_iter().zip(ids) {
            match result {
                Ok(chunk) => payload.extend_from_slice(&chunk),
                Err(e) => {
                    tracing::error!(block = %id, error = %e, "block read failed");
                    return Err(StoreError::Io(e));
                }
            }
        }
        Ok(payload)
    }

    /// Unlink every block concurrently. Failures (including missing files)
    /// are collected and reported together; they never abort the other
    /// unlinks.
    pub fn delete_all(&self, ids: &[BlockId]) -> Result<()> {
        let (err_tx, err_rx) = crossbeam::channel::bounded::<(BlockId, io::Error)>(ids.len());

        thread::scope(|s| {
            for id in ids {
                let path = self.block_path(id);
                let err_tx = err_tx.clone();
                s.spawn(move || {
                    tracing::debug!(path = %path.display(), "deleting block");
                    if let Err(e) = fs::remove_file(&path) {
                        tracing::error!(path = %path.display(), error = %e, "block delete failed");
                        let _ = err_tx.send((id.clone(), e));
                    }
                });
            }
        });
        drop(err_tx);

        let failures: Vec<String> = err_rx
            .into_iter()
            .map(|(id, e)| format!("{}: {}", id, e))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Storage(format!(
                "failed to delete {} block(s): {}",
                failures.len(),
                failures.join(", ")
            )))
        }
    }

    /// Confirm every block file exists, without reading contents.
    pub fn stat_all(&self, ids: &[BlockId]) -> Result<()> {
        for id in ids {
            let path = self.block_path(id);
            if let Err(e) = fs::metadata(&path) {
                if e.kind() == io::ErrorKind::NotFound {
                    return Err(StoreError::NotFound(format!("block {}", id)));
                }
                return Err(StoreError::Io(e));
            }
        }
        Ok(())
    }

    /// Remove block files not present in `referenced`. Returns the number of
    /// files removed. Non-block files in the directory are left alone.
    pub fn reap_orphans(&self, referenced: &HashSet<BlockId>) -> Result<usize> {
        let mut reaped = 0;
        for entry in fs::read_dir(&self.blocks_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !BlockId::is_block_filename(name) {
                continue;
            }

            let id = BlockId::from(name.to_string());
            if referenced.contains(&id) {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    tracing::info!(block = %id, "reaped orphan block");
                    reaped += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
        Ok(reaped)
    }
}

/// Write one chunk with mode 0644.
fn write_block(path: &Path, chunk: &[u8]) -> io::Result<()> {
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o644);
    }

    let mut file = opts.open(path)?;
    file.write_all(chunk)
}
