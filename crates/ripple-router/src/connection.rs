//! Connection handles
//!
//! The hub never owns a client session. It keeps a [`Connection`]: the
//! identity plus the producer half of the session's bounded mailbox.
//! The adapter task owns the consumer half and the socket, and holds a
//! [`Registration`] guard so the hub is told exactly once when the
//! session ends, whatever the exit path.

use ripple_core::Command;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::hub::HubHandle;

/// Process-unique connection identity, assigned by the hub.
pub type ConnectionId = String;

/// Hub-side handle to one client session, keyed by identity in the
/// hub's map. Non-owning: dropping it closes the mailbox, which
/// unwinds the adapter's write loop.
pub(crate) struct Connection {
    mailbox: mpsc::Sender<Command>,
}

impl Connection {
    pub fn new(mailbox: mpsc::Sender<Command>) -> Self {
        Self { mailbox }
    }

    /// Non-blocking enqueue into the session's mailbox. A `Full` or
    /// `Closed` result means the peer is not draining; the hub treats
    /// both as a disconnect.
    pub fn enqueue(&self, cmd: Command) -> Result<(), TrySendError<Command>> {
        self.mailbox.try_send(cmd)
    }
}

/// Unregistration guard for one registered connection.
///
/// Adapters release it on their normal exit path; if the adapter task
/// is cancelled or unwinds instead, `Drop` performs the same
/// unregistration. Unregistering twice is a hub-side no-op, so the
/// guard may race a forced drop (full mailbox) safely.
pub struct Registration {
    id: ConnectionId,
    hub: HubHandle,
    released: bool,
}

impl Registration {
    pub(crate) fn new(id: ConnectionId, hub: HubHandle) -> Self {
        Self {
            id,
            hub,
            released: false,
        }
    }

    /// The identity the hub assigned to this connection.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Unregister now instead of at drop time.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.hub.unregister(&self.id);
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release_inner();
    }
}
