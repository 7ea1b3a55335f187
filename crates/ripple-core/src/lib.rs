//! Ripple Core
//!
//! Protocol primitives for the ripple message router:
//! - The [`Command`] envelope and [`CommandKind`] set
//! - JSON wire codec and SSE event framing ([`codec`])
//! - Reserved identifiers shared by router and transports

pub mod codec;
pub mod command;
pub mod error;

pub use codec::{decode, encode, encode_sse};
pub use command::{db_channel, is_reserved_channel, Command, CommandKind};
pub use error::{Error, Result};

/// Identity stamped on router-originated commands. Never assigned to a
/// real connection (connection identities are UUIDs).
pub const SYSTEM_ID: &str = "sys";

/// Channel name prefix reserved for database change notifications.
/// Clients cannot publish to channels carrying this prefix.
pub const DB_CHANNEL_PREFIX: &str = "db-";

/// Default WebSocket port
pub const DEFAULT_WS_PORT: u16 = 7350;
