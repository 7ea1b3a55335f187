//! Ripple Transport Layer
//!
//! Framing for the ripple wire protocol. The router only sees the
//! seams defined in [`traits`]; the concrete duplex implementation is
//! WebSocket ([`websocket`]). The push transport (SSE) needs no
//! implementation here: it is a write-only drain over the HTTP
//! response body the surrounding server already owns, handled by the
//! router's SSE adapter.

pub mod error;
pub mod traits;
pub mod websocket;

pub use error::{Result, TransportError};
pub use traits::{TransportEvent, TransportReceiver, TransportSender, TransportServer};
pub use websocket::{connect, WebSocketConfig, WebSocketReceiver, WebSocketSender, WebSocketServer};
