//! Codec Tests
//!
//! Wire-format tests for handshake, request and response encoding/decoding,
//! pinned to literal byte sequences where the format matters.

use std::io::Cursor;

use stgblock::protocol::codec::{
    decode_request, decode_response, encode_request, encode_response, read_frame, write_frame,
};
use stgblock::protocol::{
    decode_handshake_request, decode_handshake_response, encode_handshake_request,
    encode_handshake_response, ErrorCode, HandshakeResponse, OpCode, Request, Response, Status,
};

// =============================================================================
// Handshake Wire Format
// =============================================================================

#[test]
fn handshake_request_literal_bytes() {
    let raw = [
        0x53, 0x54, 0x47, // "STG"
        0x01, // version
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // reserved
        0x04, // id length
        0x44, 0x4F, 0x39, 0x31, // "DO91"
        0x0A,
    ];
    let req = decode_handshake_request(&raw).unwrap();
    assert_eq!(req.version, 1);
    assert_eq!(req.client_id, "DO91");

    assert_eq!(encode_handshake_request("DO91").unwrap(), raw);
}

#[test]
fn handshake_rejects_unsupported_version() {
    let raw = [
        0x53, 0x54, 0x47, 0x02, // version 2
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x44, 0x4F, 0x39, 0x31, 0x0A,
    ];
    assert!(decode_handshake_request(&raw).is_err());

    // The reply a server sends for that request.
    let reply = encode_handshake_response(&HandshakeResponse::error(ErrorCode::BadRequest));
    assert_eq!(reply, [0x01, 0x00, 0x02, 0x0A]);
}

#[test]
fn handshake_ok_reply_echoes_id() {
    let reply = encode_handshake_response(&HandshakeResponse::ok("DO91"));
    assert_eq!(reply, [0x00, 0x04, 0x44, 0x4F, 0x39, 0x31, 0x0A]);

    let decoded = decode_handshake_response(&reply).unwrap();
    assert_eq!(decoded.status, Status::Ok);
    assert_eq!(decoded.assigned_id, "DO91");
}

#[test]
fn handshake_rejects_short_input() {
    assert!(decode_handshake_request(b"STG").is_err());
    assert!(decode_handshake_request(&[]).is_err());
}

// =============================================================================
// Request Decoding
// =============================================================================

#[test]
fn decode_write_literal_bytes() {
    // WRITE "data.txt" with payload "Hello World".
    let frame = [
        0x02, // WRITE
        0x08, // filename length
        0x64, 0x61, 0x74, 0x61, 0x2E, 0x74, 0x78, 0x74, // "data.txt"
        0x00, 0x00, 0x00, 0x0B, // payload length 11
        0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x20, 0x57, 0x6F, 0x72, 0x6C, 0x64,
    ];

    match decode_request(&frame).unwrap() {
        Request::Write { filename, payload } => {
            assert_eq!(filename, "data.txt");
            assert_eq!(payload, b"Hello World");
        }
        other => panic!("expected WRITE, got {:?}", other),
    }
}

#[test]
fn decode_read_ends_at_filename() {
    let mut frame = vec![0x01, 0x08];
    frame.extend_from_slice(b"data.txt");

    match decode_request(&frame).unwrap() {
        Request::Read { filename } => assert_eq!(filename, "data.txt"),
        other => panic!("expected READ, got {:?}", other),
    }

    // Trailing bytes after the filename are a decode error.
    frame.push(0x00);
    assert!(decode_request(&frame).is_err());
}

#[test]
fn decode_delete() {
    let mut frame = vec![0x04, 0x08];
    frame.extend_from_slice(b"data.txt");

    match decode_request(&frame).unwrap() {
        Request::Delete { filename } => assert_eq!(filename, "data.txt"),
        other => panic!("expected DELETE, got {:?}", other),
    }
}

#[test]
fn decode_update() {
    let mut frame = vec![0x03, 0x08];
    frame.extend_from_slice(b"data.txt");
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x02]);
    frame.extend_from_slice(b"v2");

    match decode_request(&frame).unwrap() {
        Request::Update { filename, payload } => {
            assert_eq!(filename, "data.txt");
            assert_eq!(payload, b"v2");
        }
        other => panic!("expected UPDATE, got {:?}", other),
    }
}

#[test]
fn unsupported_operation_code() {
    let mut frame = vec![0x05, 0x08];
    frame.extend_from_slice(b"data.txt");
    assert!(decode_request(&frame).is_err());
    assert!(OpCode::from_byte(0x05).is_none());
}

#[test]
fn filename_floor_differs_by_operation() {
    // READ requires at least 8 bytes of filename.
    let mut read = vec![0x01, 0x07];
    read.extend_from_slice(b"data.tx");
    assert!(decode_request(&read).is_err());

    // WRITE accepts a single-byte filename.
    let frame = [0x02, 0x01, b'f', 0x00, 0x00, 0x00, 0x01, 0x58];
    assert!(decode_request(&frame).is_ok());

    // But never an empty one.
    let frame = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01, 0x58];
    assert!(decode_request(&frame).is_err());
}

#[test]
fn declared_length_must_match_bytes_present() {
    // Declares 6 payload bytes but carries 11.
    let mut frame = vec![0x02, 0x08];
    frame.extend_from_slice(b"data.txt");
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x06]);
    frame.extend_from_slice(b"Hello World");
    assert!(decode_request(&frame).is_err());

    // Declares 11 but carries 5.
    let mut frame = vec![0x02, 0x08];
    frame.extend_from_slice(b"data.txt");
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x0B]);
    frame.extend_from_slice(b"Hello");
    assert!(decode_request(&frame).is_err());
}

#[test]
fn zero_length_payload_is_rejected() {
    let mut frame = vec![0x02, 0x08];
    frame.extend_from_slice(b"data.txt");
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    assert!(decode_request(&frame).is_err());
}

#[test]
fn truncated_frames_are_rejected() {
    assert!(decode_request(&[]).is_err());
    assert!(decode_request(&[0x01]).is_err());

    // Filename length says 8 but only 3 bytes follow.
    let frame = [0x01, 0x08, b'd', b'a', b't'];
    assert!(decode_request(&frame).is_err());

    // WRITE truncated inside the payload length field.
    let mut frame = vec![0x02, 0x08];
    frame.extend_from_slice(b"data.txt");
    frame.extend_from_slice(&[0x00, 0x00]);
    assert!(decode_request(&frame).is_err());
}

#[test]
fn request_roundtrip_through_encoder() {
    let requests = vec![
        Request::Read {
            filename: "data.txt".to_string(),
        },
        Request::Write {
            filename: "report.csv".to_string(),
            payload: vec![0x00, 0x01, 0xFF, 0xFE],
        },
        Request::Update {
            filename: "report.csv".to_string(),
            payload: b"updated".to_vec(),
        },
        Request::Delete {
            filename: "data.txt".to_string(),
        },
    ];

    for request in requests {
        let encoded = encode_request(&request).unwrap();
        let decoded = decode_request(&encoded).unwrap();
        assert_eq!(decoded.op_code(), request.op_code());
        assert_eq!(decoded.filename(), request.filename());
    }
}

// =============================================================================
// Response Wire Format
// =============================================================================

#[test]
fn ok_response_without_payload_literal_bytes() {
    let unit = encode_response(&Response::ok(None));
    assert_eq!(unit, [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0A]);
}

#[test]
fn ok_response_with_payload_literal_bytes() {
    let unit = encode_response(&Response::ok(Some(b"Hello World".to_vec())));
    let expected = [
        0x00, // status OK
        0x00, 0x00, // no error
        0x00, 0x00, 0x00, 0x0B, // payload length 11
        0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x20, 0x57, 0x6F, 0x72, 0x6C, 0x64, // "Hello World"
        0x0A,
    ];
    assert_eq!(unit, expected);
}

#[test]
fn not_found_response_literal_bytes() {
    let unit = encode_response(&Response::error(ErrorCode::NotFound));
    assert_eq!(unit, [0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x0A]);
}

#[test]
fn bad_request_response_literal_bytes() {
    let unit = encode_response(&Response::error(ErrorCode::BadRequest));
    assert_eq!(unit, [0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x0A]);
}

#[test]
fn response_roundtrip() {
    let responses = vec![
        Response::ok(Some(b"payload".to_vec())),
        Response::ok(None),
        Response::error(ErrorCode::NotFound),
        Response::error(ErrorCode::Internal),
    ];

    for response in responses {
        let unit = encode_response(&response);
        assert_eq!(decode_response(&unit).unwrap(), response);
    }
}

#[test]
fn response_missing_sentinel_is_rejected() {
    let mut unit = encode_response(&Response::ok(None));
    let last = unit.len() - 1;
    unit[last] = 0x00;
    assert!(decode_response(&unit).is_err());
}

#[test]
fn error_response_with_payload_is_rejected() {
    // ERROR status (NotFound) declaring a 3-byte payload; error responses
    // must have payload length 0.
    let unit = [
        0x01, // status ERROR
        0x00, 0x01, // NotFound
        0x00, 0x00, 0x00, 0x03, // payload length 3
        0x6F, 0x6F, 0x70, // "oop"
        0x0A,
    ];
    assert!(decode_response(&unit).is_err());
}

#[test]
fn response_length_mismatch_is_rejected() {
    let mut unit = encode_response(&Response::ok(Some(b"abc".to_vec())));
    // Claim a longer payload than is present.
    unit[6] = 0x09;
    assert!(decode_response(&unit).is_err());
}

// =============================================================================
// Frame I/O
// =============================================================================

#[test]
fn frame_roundtrip() {
    let mut buffer = Vec::new();
    write_frame(&mut buffer, b"hello frame").unwrap();

    // 4-byte big-endian prefix then the payload.
    assert_eq!(&buffer[..4], &[0x00, 0x00, 0x00, 0x0B]);

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_frame(&mut cursor, 1024).unwrap(), b"hello frame");
}

#[test]
fn zero_length_frame_is_rejected() {
    let mut cursor = Cursor::new(vec![0x00, 0x00, 0x00, 0x00]);
    assert!(read_frame(&mut cursor, 1024).is_err());
}

#[test]
fn oversized_frame_is_rejected_without_reading_payload() {
    let mut buffer = vec![0x00, 0x00, 0x10, 0x00]; // declares 4096
    buffer.extend_from_slice(&[0u8; 8]);

    let mut cursor = Cursor::new(buffer);
    assert!(read_frame(&mut cursor, 1024).is_err());
    // Only the prefix was consumed.
    assert_eq!(cursor.position(), 4);
}

#[test]
fn multiple_frames_in_sequence() {
    let mut buffer = Vec::new();
    write_frame(&mut buffer, b"first").unwrap();
    write_frame(&mut buffer, b"second").unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_frame(&mut cursor, 1024).unwrap(), b"first");
    assert_eq!(read_frame(&mut cursor, 1024).unwrap(), b"second");
}
