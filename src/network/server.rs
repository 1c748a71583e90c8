//! TCP Server
//!
//! Accepts connections and runs one session thread per connection. The
//! accept loop polls a shutdown flag so SIGINT/SIGTERM can stop it without
//! tearing down sessions mid-request; live sessions drain to their next
//! boundary (EOF or process exit).

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::engine::FileEngine;
use crate::error::{Result, StoreError};

use super::{PeerRegistry, Session};

/// Flips the server's shutdown flag from another thread (signal handlers,
/// tests).
#[derive(Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// TCP server for stgblock
///
/// ## Architecture
/// - Main thread accepts connections
/// - One session thread per connection
/// - Shared FileEngine and PeerRegistry across sessions
pub struct Server {
    /// Server configuration
    config: Config,

    /// Shared storage engine
    engine: Arc<FileEngine>,

    /// Live sessions by peer identifier
    registry: Arc<PeerRegistry>,

    /// TCP listener (created on bind)
    listener: Option<TcpListener>,

    /// Shutdown flag
    shutdown: Arc<AtomicBool>,

    /// Active session count
    active_sessions: Arc<AtomicUsize>,

    /// Monotonic counter naming session threads
    next_session: u64,
}

impl Server {
    /// Create a new server with the given config and engine
    pub fn new(config: Config, engine: Arc<FileEngine>) -> Self {
        Self {
            config,
            engine,
            registry: Arc::new(PeerRegistry::new()),
            listener: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            active_sessions: Arc::new(AtomicUsize::new(0)),
            next_session: 0,
        }
    }

    /// Bind the listener without starting the accept loop. Useful when the
    /// caller needs the bound address first (port 0 in tests).
    pub fn bind(&mut self) -> Result<SocketAddr> {
        if self.listener.is_none() {
            let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
                StoreError::Network(format!(
                    "failed to bind to {}: {}",
                    self.config.listen_addr, e
                ))
            })?;

            // Non-blocking so the accept loop can poll the shutdown flag.
            listener.set_nonblocking(true)?;
            self.listener = Some(listener);
        }

        let addr = self.local_addr().expect("listener just bound");
        Ok(addr)
    }

    /// Start the server (blocking). Returns when shutdown is signaled.
    pub fn run(&mut self) -> Result<()> {
        let addr = self.bind()?;
        tracing::info!(%addr, "server listening");

        self.accept_loop();
        self.cleanup();
        Ok(())
    }

    /// Main accept loop
    fn accept_loop(&mut self) {
        while !self.shutdown.load(Ordering::Relaxed) {
            let listener = self.listener.as_ref().unwrap();
            match listener.accept() {
                Ok((stream, addr)) => {
                    let current = self.active_sessions.load(Ordering::Relaxed);
                    if current >= self.config.max_connections {
                        tracing::warn!(
                            %addr,
                            current,
                            limit = self.config.max_connections,
                            "connection limit reached, rejecting"
                        );
                        drop(stream);
                        continue;
                    }

                    // The session does its own blocking reads.
                    if let Err(e) = stream.set_nonblocking(false) {
                        tracing::error!(%addr, error = %e, "cannot configure stream");
                        continue;
                    }

                    self.spawn_session(stream);
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    if !self.shutdown.load(Ordering::Relaxed) {
                        tracing::error!(error = %e, "accept error");
                    }
                }
            }
        }
    }

    /// Start one session thread for an accepted connection.
    fn spawn_session(&mut self, stream: std::net::TcpStream) {
        let session = match Session::new(
            stream,
            Arc::clone(&self.engine),
            Arc::clone(&self.registry),
            &self.config,
        ) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to create session");
                return;
            }
        };

        self.next_session += 1;
        let name = format!("stgblock-session-{}", self.next_session);
        let active = Arc::clone(&self.active_sessions);
        active.fetch_add(1, Ordering::Relaxed);

        let spawned = thread::Builder::new().name(name).spawn(move || {
            session.run();
            active.fetch_sub(1, Ordering::Relaxed);
        });

        if let Err(e) = spawned {
            tracing::error!(error = %e, "failed to spawn session thread");
            self.active_sessions.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Stop accepting and report what is still draining.
    fn cleanup(&mut self) {
        self.listener = None;

        let remaining = self.active_sessions.load(Ordering::Relaxed);
        if remaining > 0 {
            tracing::info!(sessions = remaining, "letting live sessions drain");
        }
        tracing::info!("server shutdown complete");
    }

    /// Get a handle that signals the accept loop to stop.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed)
    }

    /// Get the number of active sessions
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Get the bound address (if bound)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }
}
