//! Configuration for stgblock
//!
//! Centralized configuration with sensible defaults. There is no module-level
//! process state: the binary builds one `Config` and threads it into the
//! engine and the server.

use std::path::PathBuf;

/// Environment variable overriding the blocks directory.
pub const ENV_BLOCKS_DIR: &str = "STG_BLOCKS_DIR";

/// Environment variable overriding the index file path.
pub const ENV_METADATA_FILE: &str = "STG_METADATA_FILE";

/// Largest frame length the server will read. Sized for a 64 MiB payload
/// plus the operation header and filename.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024 + 4096;

/// Main configuration for a stgblock instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding one file per block
    pub blocks_dir: PathBuf,

    /// Path of the single JSON index file
    pub metadata_file: PathBuf,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client sessions
    pub max_connections: usize,

    /// Handshake read deadline (milliseconds)
    pub handshake_timeout_ms: u64,

    /// Largest accepted frame length in bytes
    pub max_frame_len: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blocks_dir: PathBuf::from("./stgblock_data/blocks"),
            metadata_file: PathBuf::from("./stgblock_data/metadata.json"),
            listen_addr: "0.0.0.0:8001".to_string(),
            max_connections: 1024,
            handshake_timeout_ms: 10_000,
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Apply `STG_BLOCKS_DIR` / `STG_METADATA_FILE` from the environment.
    /// Unset variables leave the current values in place.
    pub fn apply_env(mut self) -> Self {
        if let Ok(v) = std::env::var(ENV_BLOCKS_DIR) {
            if !v.is_empty() {
                self.config.blocks_dir = PathBuf::from(v);
            }
        }
        if let Ok(v) = std::env::var(ENV_METADATA_FILE) {
            if !v.is_empty() {
                self.config.metadata_file = PathBuf::from(v);
            }
        }
        self
    }

    pub fn blocks_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.blocks_dir = dir.into();
        self
    }

    pub fn metadata_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.metadata_file = path.into();
        self
    }

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn max_connections(mut self, limit: usize) -> Self {
        self.config.max_connections = limit;
        self
    }

    pub fn handshake_timeout_ms(mut self, ms: u64) -> Self {
        self.config.handshake_timeout_ms = ms;
        self
    }

    pub fn max_frame_len(mut self, len: u32) -> Self {
        self.config.max_frame_len = len;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
