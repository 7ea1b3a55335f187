//! Push (server-sent events) adapter
//!
//! One call per client request, over whatever `AsyncWrite` the
//! surrounding HTTP server hands us for the long-lived response body.
//! There is no read loop: client-to-server events for this transport
//! arrive through an ordinary HTTP endpoint that calls
//! [`HubHandle::dispatch`] or [`HubHandle::publish`] directly.

use ripple_core::codec;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::Result;
use crate::hub::HubHandle;

/// Register a push connection and drain its mailbox into `writer` as
/// `data: <json>\n\n` events, flushing after every event.
///
/// Returns when the hub drops the connection or a write fails. If the
/// caller's request future is cancelled instead (the client went
/// away), the registration guard still unregisters on drop.
pub async fn serve_sse<W>(hub: &HubHandle, writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let (registration, mailbox) = hub.register().await?;
    debug!("sse connection registered as {}", registration.id());

    let result = drain(writer, mailbox).await;
    registration.release();
    result
}

async fn drain<W>(mut writer: W, mut mailbox: tokio::sync::mpsc::Receiver<ripple_core::Command>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(cmd) = mailbox.recv().await {
        let frame = codec::encode_sse(&cmd)?;
        writer.write_all(&frame).await?;
        // the peer must see every event immediately
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthClaims, Validator};
    use crate::hub::{Hub, HubConfig};
    use async_trait::async_trait;
    use ripple_core::CommandKind;
    use std::sync::Arc;
    use std::time::Duration;

    struct AllowAll;

    #[async_trait]
    impl Validator for AllowAll {
        async fn validate(&self, _credential: &str) -> anyhow::Result<AuthClaims> {
            Ok(AuthClaims::new())
        }
    }

    #[tokio::test]
    async fn init_is_framed_as_sse_event() {
        let hub = Hub::spawn(HubConfig::default(), Arc::new(AllowAll));

        let (duplex_writer, mut duplex_reader) = tokio::io::duplex(4096);
        let hub_clone = hub.clone();
        let server = tokio::spawn(async move { serve_sse(&hub_clone, duplex_writer).await });

        let mut buf = vec![0u8; 4096];
        let n = tokio::time::timeout(Duration::from_secs(2), async {
            use tokio::io::AsyncReadExt;
            duplex_reader.read(&mut buf).await.unwrap()
        })
        .await
        .unwrap();

        let text = std::str::from_utf8(&buf[..n]).unwrap();
        assert!(text.starts_with("data: {"), "got: {}", text);
        assert!(text.ends_with("\n\n"));

        let cmd = ripple_core::decode(
            text.trim_start_matches("data: ").trim_end().as_bytes(),
        )
        .unwrap();
        assert_eq!(cmd.kind, CommandKind::Init);
        assert!(!cmd.data.is_empty());

        server.abort();
    }
}
