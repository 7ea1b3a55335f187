//! Hub error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubError>;

#[derive(Error, Debug)]
pub enum HubError {
    /// The hub task is gone; no event can be delivered
    #[error("hub is closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(#[from] ripple_transport::TransportError),

    #[error("protocol error: {0}")]
    Core(#[from] ripple_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
