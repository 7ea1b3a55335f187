//! Shared helpers for router integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use ripple_core::Command;
use ripple_router::{AuthClaims, Validator};
use std::sync::Once;
use std::time::Duration;
use tokio::sync::mpsc;

/// Validator that accepts any credential.
pub struct AcceptAll;

#[async_trait]
impl Validator for AcceptAll {
    async fn validate(&self, _credential: &str) -> anyhow::Result<AuthClaims> {
        Ok(AuthClaims::new())
    }
}

/// Validator that accepts exactly one credential.
pub struct Keyed(pub &'static str);

#[async_trait]
impl Validator for Keyed {
    async fn validate(&self, credential: &str) -> anyhow::Result<AuthClaims> {
        if credential == self.0 {
            let mut claims = AuthClaims::new();
            claims.insert("role".into(), serde_json::Value::String("user".into()));
            Ok(claims)
        } else {
            anyhow::bail!("bad credential")
        }
    }
}

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Receive the next mailbox command or fail after two seconds.
pub async fn recv_cmd(mailbox: &mut mpsc::Receiver<Command>) -> Command {
    tokio::time::timeout(Duration::from_secs(2), mailbox.recv())
        .await
        .expect("timed out waiting for command")
        .expect("mailbox closed")
}
