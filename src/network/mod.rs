//! Network layer
//!
//! TCP listener, per-connection session state machine, peer registry and the
//! request dispatcher.

mod dispatcher;
mod registry;
mod server;
mod session;

pub use dispatcher::dispatch;
pub use registry::{Peer, PeerRegistry};
pub use server::{Server, ShutdownHandle};
pub use session::Session;
