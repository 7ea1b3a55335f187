//! Wire codecs
//!
//! Both transports speak JSON with the same field names; they differ
//! only in framing. The duplex transport carries one JSON object per
//! frame, the push transport wraps the same object in an SSE `data:`
//! event.

use bytes::Bytes;

use crate::command::Command;
use crate::error::{Error, Result};

/// Encode a command as a single JSON object.
pub fn encode(cmd: &Command) -> Result<Bytes> {
    serde_json::to_vec(cmd)
        .map(Bytes::from)
        .map_err(|e| Error::Encode(e.to_string()))
}

/// Decode one inbound frame into a command.
pub fn decode(data: &[u8]) -> Result<Command> {
    serde_json::from_slice(data).map_err(|e| Error::Decode(e.to_string()))
}

/// Encode a command as one server-sent event: `data: <json>\n\n`.
pub fn encode_sse(cmd: &Command) -> Result<Bytes> {
    let json = serde_json::to_string(cmd).map_err(|e| Error::Encode(e.to_string()))?;
    Ok(Bytes::from(format!("data: {}\n\n", json)))
}
