//! Peer registry
//!
//! Tracks live sessions keyed by their handshake identifier. Reads and
//! writes both go through one mutex; the registry is never iterated on a hot
//! path. Presence does not imply liveness; the session owns that and calls
//! [`PeerRegistry::remove`] at disconnect.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

/// One connected client session.
#[derive(Debug)]
pub struct Peer {
    /// Identifier assigned at handshake
    pub id: String,

    /// Negotiated protocol version
    pub version: u8,

    /// Remote address
    pub addr: SocketAddr,

    /// Connection handle
    pub stream: TcpStream,

    /// When the handshake completed
    pub connected_at: SystemTime,
}

/// Concurrent mapping of peer identifier → session record.
#[derive(Default)]
pub struct PeerRegistry {
    peers: Mutex<HashMap<String, Arc<Peer>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer. A peer that reuses a live identifier replaces the
    /// existing entry; the replaced record is returned so the caller can log
    /// the collision. Identifiers stay unique at any instant.
    pub fn add(&self, peer: Peer) -> Option<Arc<Peer>> {
        self.peers.lock().insert(peer.id.clone(), Arc::new(peer))
    }

    /// Remove a peer by identifier. Whichever session disconnects first
    /// removes the entry under its identifier.
    pub fn remove(&self, id: &str) -> Option<Arc<Peer>> {
        self.peers.lock().remove(id)
    }

    /// Look up a peer by identifier.
    pub fn get(&self, id: &str) -> Option<Arc<Peer>> {
        self.peers.lock().get(id).cloned()
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }
}
