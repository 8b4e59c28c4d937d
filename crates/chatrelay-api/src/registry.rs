//! Registry of open client connections.
//!
//! Pure lifecycle bookkeeping: the accept loop registers a connection after
//! the upgrade and unregisters it when the loop exits. Relay tasks write
//! through their own [`ConnectionHandle`] clone and never touch the registry.

use chatrelay_types::wire::{ConnectionId, OutboundFrame};
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Write side of one client connection.
///
/// Frames sent here are serialized by the connection's single writer task,
/// so concurrent relays never interleave bytes within a frame.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    frames: mpsc::Sender<OutboundFrame>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, frames: mpsc::Sender<OutboundFrame>) -> Self {
        Self { id, frames }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn frames(&self) -> &mpsc::Sender<OutboundFrame> {
        &self.frames
    }
}

/// The set of currently open connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection.
    pub fn register(&self, handle: ConnectionHandle) {
        self.connections.insert(handle.id(), handle);
    }

    /// Remove a connection. Removing an absent ID is a no-op.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        self.connections.remove(id).is_some()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
