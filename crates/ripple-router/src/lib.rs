//! Ripple Router
//!
//! The hub is the single logical owner of all routing state:
//! - assigns connection identities and delivers `init`
//! - maintains the identity map and channel subscription table
//! - routes every inbound command through one serialized loop
//! - fans published messages out to channel members
//!
//! Transports plug in through the adapters: a duplex WebSocket loop
//! and a push-only SSE drain. The credential check behind the `auth`
//! command is injected as a [`Validator`], so the hub is constructible
//! and testable in isolation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ripple_core::DEFAULT_WS_PORT;
//! use ripple_router::{serve_websocket, Hub, HubConfig};
//! use ripple_transport::WebSocketConfig;
//! # struct MyValidator;
//! # #[async_trait::async_trait]
//! # impl ripple_router::Validator for MyValidator {
//! #     async fn validate(&self, _c: &str) -> anyhow::Result<ripple_router::AuthClaims> {
//! #         Ok(Default::default())
//! #     }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = Hub::spawn(HubConfig::default(), Arc::new(MyValidator));
//!     let addr = format!("0.0.0.0:{}", DEFAULT_WS_PORT);
//!     serve_websocket(hub, &addr, WebSocketConfig::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod auth;
pub mod connection;
pub mod error;
pub mod hub;

pub use adapters::{serve_on, serve_sse, serve_websocket};
pub use auth::{AuthClaims, Validator};
pub use connection::{ConnectionId, Registration};
pub use error::{HubError, Result};
pub use hub::{Hub, HubConfig, HubHandle};
