//! Handshake messages
//!
//! The opening exchange on every connection. Unlike the request/response
//! frames that follow, handshake messages carry no length prefix; both sides
//! delimit on the trailing sentinel.
//!
//! ## Request layout
//! ```text
//! ┌───────────┬─────────┬──────────────┬────────────┬──────────┬──────────┐
//! │ "STG" (3) │ ver (1) │ reserved (8) │ id_len (1) │  id (N)  │ 0x0A (1) │
//! └───────────┴─────────┴──────────────┴────────────┴──────────┴──────────┘
//! ```
//!
//! ## Response layout
//! - Success: `[0x00][id_len][id][0x0A]`
//! - Error:   `[0x01][err_hi][err_lo][0x0A]`

use crate::error::{Result, StoreError};
use super::{ErrorCode, Status, SENTINEL};

/// Magic bytes opening every handshake request
pub const HANDSHAKE_MAGIC: [u8; 3] = *b"STG";

/// The only protocol version this server speaks
pub const PROTOCOL_VERSION: u8 = 1;

/// Reserved bytes between the version and the identifier length
const RESERVED_LEN: usize = 8;

/// Offset of the identifier length byte
const ID_LEN_OFFSET: usize = 4 + RESERVED_LEN;

/// Shortest well-formed request: magic + version + reserved + id_len + 0x0A
const MIN_REQUEST_LEN: usize = ID_LEN_OFFSET + 2;

/// Client identifiers must be at least this long
const MIN_CLIENT_ID_LEN: usize = 4;

/// A decoded handshake request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub version: u8,
    pub client_id: String,
}

/// A handshake response, either an identifier assignment or an error code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub status: Status,
    pub error: ErrorCode,
    pub assigned_id: String,
}

impl HandshakeResponse {
    pub fn ok(assigned_id: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            error: ErrorCode::NoError,
            assigned_id: assigned_id.into(),
        }
    }

    pub fn error(code: ErrorCode) -> Self {
        Self {
            status: Status::Error,
            error: code,
            assigned_id: String::new(),
        }
    }
}

/// Decode a handshake request, validating every field.
pub fn decode_handshake_request(raw: &[u8]) -> Result<HandshakeRequest> {
    if raw.len() < MIN_REQUEST_LEN {
        return Err(StoreError::BadRequest(format!(
            "handshake too short: {} bytes",
            raw.len()
        )));
    }

    if raw[0..3] != HANDSHAKE_MAGIC {
        return Err(StoreError::BadRequest("handshake magic mismatch".to_string()));
    }

    let version = raw[3];
    if version != PROTOCOL_VERSION {
        return Err(StoreError::BadRequest(format!(
            "unsupported protocol version {}",
            version
        )));
    }

    let id_len = raw[ID_LEN_OFFSET] as usize;
    if id_len < MIN_CLIENT_ID_LEN {
        return Err(StoreError::BadRequest(format!(
            "client id too short: {} bytes",
            id_len
        )));
    }

    let id_start = ID_LEN_OFFSET + 1;
    let id_end = id_start + id_len;
    if raw.len() <= id_end {
        return Err(StoreError::BadRequest(
            "handshake truncated inside client id".to_string(),
        ));
    }

    if raw[id_end] != SENTINEL {
        return Err(StoreError::BadRequest(
            "handshake missing terminator".to_string(),
        ));
    }

    let client_id = String::from_utf8(raw[id_start..id_end].to_vec())
        .map_err(|_| StoreError::BadRequest("client id is not valid UTF-8".to_string()))?;

    Ok(HandshakeRequest { version, client_id })
}

/// Encode a handshake request (client side).
pub fn encode_handshake_request(client_id: &str) -> Result<Vec<u8>> {
    let id = client_id.as_bytes();
    if id.len() < MIN_CLIENT_ID_LEN {
        return Err(StoreError::BadRequest(format!(
            "client id too short: {} bytes",
            id.len()
        )));
    }
    if id.len() > u8::MAX as usize {
        return Err(StoreError::BadRequest(format!(
            "client id too long: {} bytes",
            id.len()
        )));
    }

    let mut out = Vec::with_capacity(MIN_REQUEST_LEN + id.len());
    out.extend_from_slice(&HANDSHAKE_MAGIC);
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&[0u8; RESERVED_LEN]);
    out.push(id.len() as u8);
    out.extend_from_slice(id);
    out.push(SENTINEL);
    Ok(out)
}

/// Encode a handshake response.
///
/// The error form is always exactly four bytes so a client can read it even
/// when its own request was malformed.
pub fn encode_handshake_response(resp: &HandshakeResponse) -> Vec<u8> {
    match resp.status {
        Status::Ok => {
            let id = resp.assigned_id.as_bytes();
            let mut out = Vec::with_capacity(3 + id.len());
            out.push(Status::Ok as u8);
            out.push(id.len() as u8);
            out.extend_from_slice(id);
            out.push(SENTINEL);
            out
        }
        Status::Error => {
            let code = resp.error as u16;
            vec![
                Status::Error as u8,
                (code >> 8) as u8,
                (code & 0xFF) as u8,
                SENTINEL,
            ]
        }
    }
}

/// Decode a handshake response (client side).
pub fn decode_handshake_response(raw: &[u8]) -> Result<HandshakeResponse> {
    if raw.len() < 4 {
        return Err(StoreError::BadRequest(format!(
            "handshake response too short: {} bytes",
            raw.len()
        )));
    }

    match raw[0] {
        0x00 => {
            let id_len = raw[1] as usize;
            if raw.len() <= 2 + id_len || raw[2 + id_len] != SENTINEL {
                return Err(StoreError::BadRequest(
                    "malformed handshake response".to_string(),
                ));
            }
            let assigned_id = String::from_utf8(raw[2..2 + id_len].to_vec())
                .map_err(|_| StoreError::BadRequest("assigned id is not valid UTF-8".to_string()))?;
            Ok(HandshakeResponse::ok(assigned_id))
        }
        0x01 => {
            if raw[3] != SENTINEL {
                return Err(StoreError::BadRequest(
                    "malformed handshake error response".to_string(),
                ));
            }
            let code = u16::from_be_bytes([raw[1], raw[2]]);
            let code = ErrorCode::from_wire(code).unwrap_or(ErrorCode::Internal);
            Ok(HandshakeResponse::error(code))
        }
        other => Err(StoreError::BadRequest(format!(
            "unknown handshake status: 0x{:02x}",
            other
        ))),
    }
}
