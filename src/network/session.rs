//! Session state machine
//!
//! One session per connection, driven through four states:
//!
//! ```text
//! AwaitingHandshake ──► AwaitingFrameLength ──► AwaitingFramePayload
//!        │                      ▲                       │
//!        │                      └───────────────────────┘
//!        └──────────────────────► Closed ◄──────────────┘
//! ```
//!
//! The handshake read carries a deadline; framed reads are unbounded. Decode
//! and engine failures produce an ERROR response and the session continues;
//! connection failures and oversized frames close it.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::config::Config;
use crate::engine::FileEngine;
use crate::error::{Result, StoreError};
use crate::protocol::codec;
use crate::protocol::{
    decode_handshake_request, encode_handshake_response, ErrorCode, HandshakeResponse, Response,
    FRAME_PREFIX_LEN, SENTINEL,
};

use super::{dispatch, Peer, PeerRegistry};

/// Where the state machine is between reads.
enum SessionState {
    AwaitingHandshake,
    AwaitingFrameLength,
    AwaitingFramePayload(u32),
    Closed,
}

/// Handles a single client connection from handshake to teardown.
pub struct Session {
    /// Write half (and the handle timeouts are set on)
    stream: TcpStream,

    /// Buffered read half
    reader: BufReader<TcpStream>,

    addr: SocketAddr,
    engine: Arc<FileEngine>,
    registry: Arc<PeerRegistry>,
    handshake_timeout: Duration,
    max_frame_len: u32,

    /// Set once the handshake registers us
    peer_id: Option<String>,
}

impl Session {
    pub fn new(
        stream: TcpStream,
        engine: Arc<FileEngine>,
        registry: Arc<PeerRegistry>,
        config: &Config,
    ) -> Result<Self> {
        let addr = stream.peer_addr()?;
        let reader = BufReader::new(stream.try_clone()?);

        Ok(Self {
            stream,
            reader,
            addr,
            engine,
            registry,
            handshake_timeout: Duration::from_millis(config.handshake_timeout_ms),
            max_frame_len: config.max_frame_len,
            peer_id: None,
        })
    }

    /// Drive the state machine until the connection closes.
    pub fn run(mut self) {
        tracing::info!(addr = %self.addr, "client connected");

        let mut state = SessionState::AwaitingHandshake;
        loop {
            state = match state {
                SessionState::AwaitingHandshake => self.handshake(),
                SessionState::AwaitingFrameLength => self.read_frame_length(),
                SessionState::AwaitingFramePayload(len) => self.handle_frame(len),
                SessionState::Closed => break,
            };
        }

        self.teardown();
    }

    // =========================================================================
    // State Handlers
    // =========================================================================

    /// Read and answer the handshake under its deadline.
    fn handshake(&mut self) -> SessionState {
        if let Err(e) = self.stream.set_read_timeout(Some(self.handshake_timeout)) {
            tracing::error!(addr = %self.addr, error = %e, "cannot arm handshake deadline");
            return SessionState::Closed;
        }

        let mut raw = Vec::new();
        match self.reader.read_until(SENTINEL, &mut raw) {
            Ok(0) => {
                tracing::info!(addr = %self.addr, "connection closed before handshake");
                return SessionState::Closed;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(addr = %self.addr, error = %e, "handshake read failed");
                return SessionState::Closed;
            }
        }

        let request = match decode_handshake_request(&raw) {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(addr = %self.addr, error = %e, "bad handshake");
                self.send_handshake_error();
                return SessionState::Closed;
            }
        };

        // Framed reads after this point are unbounded.
        if let Err(e) = self.stream.set_read_timeout(None) {
            tracing::error!(addr = %self.addr, error = %e, "cannot clear handshake deadline");
            return SessionState::Closed;
        }

        let peer_stream = match self.stream.try_clone() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(addr = %self.addr, error = %e, "cannot clone stream for registry");
                return SessionState::Closed;
            }
        };

        let peer = Peer {
            id: request.client_id.clone(),
            version: request.version,
            addr: self.addr,
            stream: peer_stream,
            connected_at: SystemTime::now(),
        };
        if let Some(replaced) = self.registry.add(peer) {
            tracing::warn!(
                peer = %request.client_id,
                prior_addr = %replaced.addr,
                "peer identifier reused; replacing registry entry"
            );
        }
        self.peer_id = Some(request.client_id.clone());

        let reply = encode_handshake_response(&HandshakeResponse::ok(&request.client_id));
        if let Err(e) = self.stream.write_all(&reply) {
            tracing::error!(peer = %request.client_id, error = %e, "handshake reply failed");
            return SessionState::Closed;
        }

        tracing::info!(
            peer = %request.client_id,
            addr = %self.addr,
            version = request.version,
            "handshake completed"
        );
        SessionState::AwaitingFrameLength
    }

    /// Read the 4-byte frame length and vet it.
    fn read_frame_length(&mut self) -> SessionState {
        let mut prefix = [0u8; FRAME_PREFIX_LEN];
        if let Err(e) = self.reader.read_exact(&mut prefix) {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                tracing::info!(peer = self.peer_id(), addr = %self.addr, "client disconnected");
            } else {
                tracing::error!(peer = self.peer_id(), error = %e, "frame length read failed");
            }
            return SessionState::Closed;
        }

        let len = u32::from_be_bytes(prefix);
        if len == 0 {
            tracing::warn!(peer = self.peer_id(), "zero-length frame");
            return match self.send_response(&Response::error(ErrorCode::BadRequest)) {
                Ok(()) => SessionState::AwaitingFrameLength,
                Err(_) => SessionState::Closed,
            };
        }
        if len > self.max_frame_len {
            // The payload is refused unread, which desynchronizes the
            // stream; answer and close.
            tracing::warn!(
                peer = self.peer_id(),
                len,
                limit = self.max_frame_len,
                "oversized frame"
            );
            let _ = self.send_response(&Response::error(ErrorCode::BadRequest));
            return SessionState::Closed;
        }

        SessionState::AwaitingFramePayload(len)
    }

    /// Read the declared payload, decode, dispatch, respond.
    fn handle_frame(&mut self, len: u32) -> SessionState {
        let mut frame = vec![0u8; len as usize];
        if let Err(e) = self.reader.read_exact(&mut frame) {
            tracing::error!(peer = self.peer_id(), len, error = %e, "frame payload read failed");
            return SessionState::Closed;
        }

        let response = match codec::decode_request(&frame) {
            Ok(request) => {
                tracing::debug!(
                    peer = self.peer_id(),
                    op = ?request.op_code(),
                    file = request.filename(),
                    "request decoded"
                );
                dispatch(&self.engine, &request)
            }
            Err(e) => {
                tracing::warn!(peer = self.peer_id(), error = %e, "request decode failed");
                Response::error(ErrorCode::from(&e))
            }
        };

        match self.send_response(&response) {
            Ok(()) => SessionState::AwaitingFrameLength,
            Err(e) => {
                tracing::error!(peer = self.peer_id(), error = %e, "response write failed");
                SessionState::Closed
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Write one framed response unit.
    fn send_response(&mut self, response: &Response) -> Result<()> {
        let unit = codec::encode_response(response);
        codec::write_frame(&mut self.stream, &unit)
            .map_err(|e| StoreError::Network(format!("response write: {}", e)))
    }

    /// Best-effort 4-byte handshake error reply; the connection is closing
    /// either way.
    fn send_handshake_error(&mut self) {
        let reply = encode_handshake_response(&HandshakeResponse::error(ErrorCode::BadRequest));
        let _ = self.stream.write_all(&reply);
    }

    fn peer_id(&self) -> &str {
        self.peer_id.as_deref().unwrap_or("-")
    }

    fn teardown(&mut self) {
        if let Some(id) = self.peer_id.take() {
            self.registry.remove(&id);
            tracing::info!(peer = %id, addr = %self.addr, "session closed");
        } else {
            tracing::debug!(addr = %self.addr, "session closed before handshake");
        }
    }
}
