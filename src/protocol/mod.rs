//! Wire protocol for stgblock
//!
//! A connection opens with an unframed handshake (magic, version, client
//! identifier, sentinel). Every byte after the handshake response belongs to
//! the framed stream: a 4-byte big-endian length prefix followed by exactly
//! that many payload bytes. Request payloads carry no sentinel; response
//! units end with one, so legacy clients may delimit on either.
//!
//! All multi-byte integers are big-endian.

mod handshake;
mod request;
mod response;

pub mod codec;

pub use handshake::{
    decode_handshake_request, decode_handshake_response, encode_handshake_request,
    encode_handshake_response, HandshakeRequest, HandshakeResponse, HANDSHAKE_MAGIC,
    PROTOCOL_VERSION,
};
pub use request::{OpCode, Request};
pub use response::{ErrorCode, Response, Status};

/// Terminator byte on handshake messages and response units.
pub const SENTINEL: u8 = 0x0A;

/// Size of the frame length prefix on the wire.
pub const FRAME_PREFIX_LEN: usize = 4;
