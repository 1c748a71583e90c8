//! Storage layer
//!
//! Two halves that the engine composes: the block store, which shards
//! payloads into fixed-size files, and the index, which maps filenames to
//! ordered block lists and persists itself as a single JSON document.

pub mod block;
pub mod index;

pub use block::{BlockId, BlockStore, BLOCK_SIZE};
pub use index::Index;
