//! Request dispatcher
//!
//! Routes a decoded request to the file engine and folds the outcome into a
//! response. This is where tagged errors collapse into wire codes.

use crate::engine::FileEngine;
use crate::protocol::{ErrorCode, Request, Response};

/// Execute one request against the engine.
pub fn dispatch(engine: &FileEngine, request: &Request) -> Response {
    let op = request.op_code();
    let filename = request.filename();

    let result = match request {
        Request::Read { filename } => engine.read(filename).map(Some),
        Request::Write { filename, payload } => engine.write(filename, payload).map(|()| None),
        Request::Update { filename, payload } => engine.update(filename, payload).map(Some),
        Request::Delete { filename } => engine.delete(filename).map(|()| None),
    };

    match result {
        Ok(payload) => Response::ok(payload),
        Err(e) => {
            let code = ErrorCode::from(&e);
            tracing::warn!(?op, file = filename, error = %e, ?code, "request failed");
            Response::error(code)
        }
    }
}
