//! Transport trait definitions
//!
//! The router speaks to connections exclusively through these seams,
//! so routing logic never depends on a concrete socket type.

use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;

use crate::error::Result;

/// Events surfaced by a transport's read side
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Connection established
    Connected,
    /// One inbound frame payload
    Data(Bytes),
    /// Connection closed, cleanly or not
    Disconnected { reason: Option<String> },
    /// Transport-level error (the connection is about to close)
    Error(String),
}

/// Write half of a connection
#[async_trait]
pub trait TransportSender: Send + Sync {
    /// Queue one outbound frame
    async fn send(&self, data: Bytes) -> Result<()>;

    /// Whether the peer is still believed reachable
    fn is_connected(&self) -> bool;

    /// Close the connection from our side
    async fn close(&self) -> Result<()>;
}

/// Read half of a connection
#[async_trait]
pub trait TransportReceiver: Send {
    /// Next event; `None` once the connection is gone for good
    async fn recv(&mut self) -> Option<TransportEvent>;
}

/// A listener producing framed connections
#[async_trait]
pub trait TransportServer: Send + Sync {
    type Sender: TransportSender;
    type Receiver: TransportReceiver;

    /// Accept the next connection
    async fn accept(&mut self) -> Result<(Self::Sender, Self::Receiver, SocketAddr)>;

    /// Bound address
    fn local_addr(&self) -> Result<SocketAddr>;
}
