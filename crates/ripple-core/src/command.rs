//! The command envelope
//!
//! Every message on every transport, in either direction, is one
//! [`Command`]. The `type` field decides routing; the remaining fields
//! are interpreted per kind (see the router crate).

use serde::{Deserialize, Serialize};

use crate::DB_CHANNEL_PREFIX;

/// Recognized command types.
///
/// Unrecognized wire values land in [`CommandKind::Unknown`] so the
/// router can answer with an error naming the offending type instead
/// of failing to decode the whole frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// router -> new connection: delivers the assigned identity
    Init,
    /// client -> router: round-trips `data` back to the sender
    Echo,
    /// client -> router: validate `data` as a credential
    Auth,
    /// router -> sender: successful `auth` reply
    Token,
    /// client -> router: subscribe to the channel named by `data`
    Join,
    /// router -> sender: successful `join` reply
    Joined,
    /// client -> router: publish `data` to `channel`
    ChanIn,
    /// router -> subscribers: delivery form of a published message
    ChanOut,
    /// router -> subscribers of `db-<table>`: record created
    DbCreated,
    /// router -> subscribers of `db-<table>`: record updated
    DbUpdated,
    /// router -> subscribers of `db-<table>`: record deleted
    DbDeleted,
    /// router -> sender: generic success acknowledgment
    Ok,
    /// router -> any: failure reply, `data` holds the reason
    Error,
    /// anything else seen on the wire
    #[serde(untagged)]
    Unknown(String),
}

impl CommandKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            CommandKind::Init => "init",
            CommandKind::Echo => "echo",
            CommandKind::Auth => "auth",
            CommandKind::Token => "token",
            CommandKind::Join => "join",
            CommandKind::Joined => "joined",
            CommandKind::ChanIn => "chan_in",
            CommandKind::ChanOut => "chan_out",
            CommandKind::DbCreated => "db_created",
            CommandKind::DbUpdated => "db_updated",
            CommandKind::DbDeleted => "db_deleted",
            CommandKind::Ok => "ok",
            CommandKind::Error => "error",
            CommandKind::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The protocol's single message envelope.
///
/// Commands are immutable value objects; routing never mutates one in
/// place, it builds the outbound payload it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Sender identity (assigned by the router at registration)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sid: String,
    /// Command type
    #[serde(rename = "type")]
    pub kind: CommandKind,
    /// Opaque payload
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    /// Subscription topic, where the kind calls for one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel: String,
    /// Credential, where the kind calls for one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
}

impl Command {
    /// A bare command of the given kind.
    pub fn new(kind: CommandKind) -> Self {
        Self {
            sid: String::new(),
            kind,
            data: String::new(),
            channel: String::new(),
            token: String::new(),
        }
    }

    fn with_data(kind: CommandKind, data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::new(kind)
        }
    }

    /// The `init` command delivering a freshly assigned identity.
    pub fn init(id: impl Into<String>) -> Self {
        Self::with_data(CommandKind::Init, id)
    }

    /// Generic success acknowledgment.
    pub fn ok() -> Self {
        Self::new(CommandKind::Ok)
    }

    /// Failure reply carrying a human-readable reason.
    pub fn error(reason: impl Into<String>) -> Self {
        Self::with_data(CommandKind::Error, reason)
    }

    /// Successful `join` reply naming the channel.
    pub fn joined(channel: impl Into<String>) -> Self {
        Self::with_data(CommandKind::Joined, channel)
    }

    /// Successful `auth` reply carrying the validated credential.
    pub fn token(credential: impl Into<String>) -> Self {
        Self::with_data(CommandKind::Token, credential)
    }

    /// Whether this is a database change notification.
    pub fn is_db_event(&self) -> bool {
        matches!(
            self.kind,
            CommandKind::DbCreated | CommandKind::DbUpdated | CommandKind::DbDeleted
        )
    }
}

/// Reserved channel name for change notifications of `table`.
pub fn db_channel(table: &str) -> String {
    format!("{}{}", DB_CHANNEL_PREFIX, table)
}

/// Whether `name` is reserved for database notifications.
///
/// The check is case-insensitive so `DB-tasks` cannot sidestep the
/// publish restriction.
pub fn is_reserved_channel(name: &str) -> bool {
    name.get(..DB_CHANNEL_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(DB_CHANNEL_PREFIX))
}
