//! Credential validation seam
//!
//! The hub does not know how credentials are checked; the surrounding
//! system injects an implementation at spawn time and the hub only
//! observes success or failure of the `auth` command.

use async_trait::async_trait;

/// Identity claims produced by a successful validation.
pub type AuthClaims = serde_json::Map<String, serde_json::Value>;

/// Validates the opaque credential carried by an `auth` command.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, credential: &str) -> anyhow::Result<AuthClaims>;
}
