//! # stgblock
//!
//! A single-node network storage service:
//! - Versioned handshake + length-prefixed binary frame protocol
//! - Payloads sharded into fixed-size blocks, written concurrently
//! - One JSON index file mapping filename → ordered block list
//! - Thread-per-connection sessions over TCP
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │              (one session thread per client)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              SessionFSM  →  Codec  →  Dispatcher             │
//! │        (handshake, framing, per-request error replies)       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!               ┌───────▼────────┐
//!               │   FileEngine   │
//!               └───┬────────┬───┘
//!                   │        │
//!            ┌──────▼──┐ ┌───▼────────┐
//!            │  Index  │ │ BlockStore │
//!            │ (JSON)  │ │ (*.bin)    │
//!            └─────────┘ └────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod engine;
pub mod network;
pub mod protocol;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use engine::FileEngine;
pub use error::{Result, StoreError};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of stgblock
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
