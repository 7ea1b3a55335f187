//! Transport adapters
//!
//! Both adapters share the hub and the command protocol and differ
//! only in framing: the duplex adapter runs a read loop and a write
//! loop per WebSocket connection, the push adapter only drains a
//! mailbox into a long-lived HTTP response body.

pub mod sse;
pub mod websocket;

pub use sse::serve_sse;
pub use websocket::{serve_on, serve_websocket};
