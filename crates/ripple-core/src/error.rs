//! Error types for the ripple protocol

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// JSON serialization failed
    #[error("encode error: {0}")]
    Encode(String),

    /// Inbound frame was not a valid command
    #[error("decode error: {0}")]
    Decode(String),
}
