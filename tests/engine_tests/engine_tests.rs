//! Engine Tests
//!
//! End-to-end tests of the file engine over a real temporary directory:
//! the four operations, their contracts, and the orphan reaper.

use std::fs;

use tempfile::TempDir;

use stgblock::storage::BLOCK_SIZE;
use stgblock::{Config, FileEngine};

fn engine_in(dir: &TempDir) -> FileEngine {
    let config = Config::builder()
        .blocks_dir(dir.path().join("blocks"))
        .metadata_file(dir.path().join("metadata.json"))
        .build();
    FileEngine::open(&config).unwrap()
}

fn block_count(dir: &TempDir) -> usize {
    fs::read_dir(dir.path().join("blocks")).unwrap().count()
}

// =============================================================================
// Write / Read
// =============================================================================

#[test]
fn write_then_read_returns_exact_bytes() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    engine.write("data.txt", b"Hello World").unwrap();
    assert_eq!(engine.read("data.txt").unwrap(), b"Hello World");
}

#[test]
fn read_absent_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    assert!(engine.read("ghost.txt").unwrap_err().is_not_found());
}

#[test]
fn write_is_an_idempotent_insert() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    engine.write("data.txt", b"first contents").unwrap();
    let blocks_before = block_count(&dir);

    // A second WRITE for the same name succeeds without storing anything;
    // UPDATE is the overwriting operation.
    engine.write("data.txt", b"second contents").unwrap();

    assert_eq!(engine.read("data.txt").unwrap(), b"first contents");
    assert_eq!(block_count(&dir), blocks_before);
}

#[test]
fn large_payload_spans_multiple_blocks() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    // ~2.5x the block size becomes exactly three blocks.
    let payload: Vec<u8> = (0..640_000).map(|i| (i % 251) as u8).collect();
    assert!(payload.len() > 2 * BLOCK_SIZE && payload.len() < 3 * BLOCK_SIZE);

    engine.write("big.dat__", &payload).unwrap();
    assert_eq!(block_count(&dir), 3);
    assert_eq!(engine.read("big.dat__").unwrap(), payload);
}

// =============================================================================
// Update
// =============================================================================

#[test]
fn update_replaces_contents_and_returns_them() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    engine.write("data.txt", b"example report").unwrap();

    let returned = engine.update("data.txt", b"example report v2").unwrap();
    assert_eq!(returned, b"example report v2");
    assert_eq!(engine.read("data.txt").unwrap(), b"example report v2");
}

#[test]
fn update_removes_the_old_blocks() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    let old = vec![1u8; 2 * BLOCK_SIZE]; // two blocks
    engine.write("data.txt", &old).unwrap();
    assert_eq!(block_count(&dir), 2);

    engine.update("data.txt", b"tiny").unwrap();
    assert_eq!(block_count(&dir), 1);
}

#[test]
fn update_absent_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    assert!(engine
        .update("ghost.txt", b"contents")
        .unwrap_err()
        .is_not_found());
    // Nothing was written for the failed update.
    assert_eq!(block_count(&dir), 0);
}

// =============================================================================
// Delete
// =============================================================================

#[test]
fn delete_then_read_is_not_found() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    engine.write("data.txt", b"example report").unwrap();
    engine.delete("data.txt").unwrap();

    assert!(engine.read("data.txt").unwrap_err().is_not_found());
    assert_eq!(block_count(&dir), 0);
}

#[test]
fn delete_absent_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    assert!(engine.delete("ghost.txt").unwrap_err().is_not_found());
}

#[test]
fn delete_checks_blocks_exist_before_mutating() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    engine.write("data.txt", b"example report").unwrap();

    // Remove the block file behind the engine's back.
    let blocks_dir = dir.path().join("blocks");
    for entry in fs::read_dir(&blocks_dir).unwrap() {
        fs::remove_file(entry.unwrap().path()).unwrap();
    }

    assert!(engine.delete("data.txt").unwrap_err().is_not_found());
    // The index entry survives a failed existence check.
    assert_eq!(engine.file_count(), 1);
}

// =============================================================================
// Persistence and Recovery
// =============================================================================

#[test]
fn index_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let engine = engine_in(&dir);
        engine.write("data.txt", b"persisted").unwrap();
    }

    let engine = engine_in(&dir);
    assert_eq!(engine.read("data.txt").unwrap(), b"persisted");
}

#[test]
fn index_file_is_valid_json_after_each_mutation() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let path = dir.path().join("metadata.json");

    engine.write("data.txt", b"one").unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert!(doc.get("data.txt").is_some());

    engine.update("data.txt", b"two").unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(doc["data.txt"].as_array().unwrap().len(), 1);

    engine.delete("data.txt").unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert!(doc.get("data.txt").is_none());
}

#[test]
fn reaper_removes_unreferenced_blocks() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    engine.write("data.txt", b"kept").unwrap();

    // Simulate a write that lost the index race: a block on disk that no
    // entry references.
    let stray = dir.path().join("blocks").join("deadbeef-0000.bin");
    fs::write(&stray, b"orphan bytes").unwrap();

    assert_eq!(engine.reap_orphans().unwrap(), 1);
    assert!(!stray.exists());
    assert_eq!(engine.read("data.txt").unwrap(), b"kept");
}
