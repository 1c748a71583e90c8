//! Protocol codec
//!
//! Encoding and decoding functions for framed requests and responses, with
//! complete bounds checking. Decoding never partially consumes input: a
//! malformed frame produces an error and nothing else.
//!
//! ## Request frame payload
//! ```text
//! ┌────────┬────────────┬──────────────┬─────────────┬─────────────┐
//! │ op (1) │ fn_len (1) │ filename (F) │ plen (4)    │ payload (P) │
//! └────────┴────────────┴──────────────┴─────────────┴─────────────┘
//!                                       └── WRITE / UPDATE only ──┘
//! ```
//!
//! ## Response frame payload
//! ```text
//! ┌────────────┬──────────┬──────────┬─────────────┬──────────┐
//! │ status (1) │ code (2) │ plen (4) │ payload (P) │ 0x0A (1) │
//! └────────────┴──────────┴──────────┴─────────────┴──────────┘
//! ```

use std::io::{Read, Write};

use crate::error::{Result, StoreError};
use super::{ErrorCode, OpCode, Request, Response, Status, FRAME_PREFIX_LEN, SENTINEL};

/// Fixed bytes of a response unit: status + error code + payload length.
pub const RESPONSE_HEADER_LEN: usize = 7;

/// READ, UPDATE and DELETE refuse filenames shorter than this. WRITE accepts
/// any non-empty filename; the asymmetry is part of the wire contract.
const MIN_FILENAME_LEN: usize = 8;

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Decode a request from a frame payload (the bytes after the length prefix).
pub fn decode_request(frame: &[u8]) -> Result<Request> {
    if frame.len() < 2 {
        return Err(StoreError::BadRequest(format!(
            "frame too short: {} bytes",
            frame.len()
        )));
    }

    let op = OpCode::from_byte(frame[0]).ok_or_else(|| {
        StoreError::BadRequest(format!("unsupported operation code: 0x{:02x}", frame[0]))
    })?;

    let fn_len = frame[1] as usize;
    let floor = match op {
        OpCode::Write => 1,
        _ => MIN_FILENAME_LEN,
    };
    if fn_len < floor {
        return Err(StoreError::BadRequest(format!(
            "filename length {} below minimum {}",
            fn_len, floor
        )));
    }

    if frame.len() < 2 + fn_len {
        return Err(StoreError::BadRequest(
            "frame truncated inside filename".to_string(),
        ));
    }
    let filename = String::from_utf8(frame[2..2 + fn_len].to_vec())
        .map_err(|_| StoreError::BadRequest("filename is not valid UTF-8".to_string()))?;

    let rest = &frame[2 + fn_len..];
    match op {
        OpCode::Read | OpCode::Delete => {
            // These frames end at the filename.
            if !rest.is_empty() {
                return Err(StoreError::BadRequest(format!(
                    "{} trailing bytes after filename",
                    rest.len()
                )));
            }
            Ok(match op {
                OpCode::Read => Request::Read { filename },
                _ => Request::Delete { filename },
            })
        }
        OpCode::Write | OpCode::Update => {
            if rest.len() < 4 {
                return Err(StoreError::BadRequest(
                    "frame truncated inside payload length".to_string(),
                ));
            }
            let declared = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
            if declared == 0 {
                return Err(StoreError::BadRequest(
                    "zero-length payload".to_string(),
                ));
            }

            let payload = &rest[4..];
            if payload.len() != declared {
                return Err(StoreError::BadRequest(format!(
                    "declared payload length {} but {} bytes present",
                    declared,
                    payload.len()
                )));
            }

            let payload = payload.to_vec();
            Ok(match op {
                OpCode::Write => Request::Write { filename, payload },
                _ => Request::Update { filename, payload },
            })
        }
    }
}

/// Encode a request into a frame payload (client side). The length prefix is
/// added by [`write_frame`].
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    let filename = request.filename().as_bytes();
    if filename.is_empty() || filename.len() > u8::MAX as usize {
        return Err(StoreError::BadRequest(format!(
            "filename length {} not encodable",
            filename.len()
        )));
    }

    let payload = match request {
        Request::Write { payload, .. } | Request::Update { payload, .. } => Some(payload),
        _ => None,
    };

    let mut out = Vec::with_capacity(2 + filename.len() + payload.map_or(0, |p| 4 + p.len()));
    out.push(request.op_code() as u8);
    out.push(filename.len() as u8);
    out.extend_from_slice(filename);
    if let Some(payload) = payload {
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
    }
    Ok(out)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response unit: header, payload, trailing sentinel.
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);

    let mut out = Vec::with_capacity(RESPONSE_HEADER_LEN + payload.len() + 1);
    out.push(response.status as u8);
    out.extend_from_slice(&(response.error as u16).to_be_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out.push(SENTINEL);
    out
}

/// Decode a response unit (client side).
pub fn decode_response(raw: &[u8]) -> Result<Response> {
    if raw.len() < RESPONSE_HEADER_LEN + 1 {
        return Err(StoreError::BadRequest(format!(
            "response too short: {} bytes",
            raw.len()
        )));
    }

    let status = match raw[0] {
        0x00 => Status::Ok,
        0x01 => Status::Error,
        other => {
            return Err(StoreError::BadRequest(format!(
                "unknown response status: 0x{:02x}",
                other
            )))
        }
    };

    let code = u16::from_be_bytes([raw[1], raw[2]]);
    let error = ErrorCode::from_wire(code)
        .ok_or_else(|| StoreError::BadRequest(format!("unknown error code: 0x{:04x}", code)))?;

    let declared = u32::from_be_bytes([raw[3], raw[4], raw[5], raw[6]]) as usize;
    if status == Status::Error && declared != 0 {
        return Err(StoreError::BadRequest(
            "error response carries a payload".to_string(),
        ));
    }
    if raw.len() != RESPONSE_HEADER_LEN + declared + 1 {
        return Err(StoreError::BadRequest(format!(
            "declared payload length {} but {} bytes present",
            declared,
            raw.len() - RESPONSE_HEADER_LEN - 1
        )));
    }
    if raw[raw.len() - 1] != SENTINEL {
        return Err(StoreError::BadRequest(
            "response missing terminator".to_string(),
        ));
    }

    let payload = if declared > 0 {
        Some(raw[RESPONSE_HEADER_LEN..RESPONSE_HEADER_LEN + declared].to_vec())
    } else {
        None
    };

    Ok(Response { status, error, payload })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write one frame: 4-byte big-endian length prefix, then the payload.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame: length prefix, then exactly that many payload bytes.
///
/// Used by clients and tests; the server session reads its prefix and payload
/// in separate state-machine steps so it can refuse oversized frames before
/// touching the payload.
pub fn read_frame<R: Read>(reader: &mut R, max_len: u32) -> Result<Vec<u8>> {
    let mut prefix = [0u8; FRAME_PREFIX_LEN];
    reader.read_exact(&mut prefix)?;

    let len = u32::from_be_bytes(prefix);
    if len == 0 {
        return Err(StoreError::BadRequest("zero-length frame".to_string()));
    }
    if len > max_len {
        return Err(StoreError::BadRequest(format!(
            "frame length {} exceeds limit {}",
            len, max_len
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}
