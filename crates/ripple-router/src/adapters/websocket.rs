//! Duplex (WebSocket) adapter
//!
//! Per connection: register with the hub, spawn a write loop draining
//! the mailbox to the socket, and run the read loop feeding decoded
//! commands into the hub's serialized dispatch. The heartbeat and the
//! idle grace window live in the transport layer; whichever loop exits
//! first, the [`Registration`] guard unregisters exactly once.

use std::net::SocketAddr;

use ripple_core::{codec, Command};
use ripple_transport::{
    TransportEvent, TransportReceiver, TransportSender, TransportServer, WebSocketConfig,
    WebSocketServer,
};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::hub::HubHandle;

/// Bind a WebSocket listener and serve connections against `hub`.
pub async fn serve_websocket(hub: HubHandle, addr: &str, config: WebSocketConfig) -> Result<()> {
    let server = WebSocketServer::bind(addr).await?.with_config(config);
    serve_on(hub, server).await
}

/// Serve connections from any [`TransportServer`] implementation.
pub async fn serve_on<S>(hub: HubHandle, mut server: S) -> Result<()>
where
    S: TransportServer + 'static,
    S::Sender: 'static,
    S::Receiver: 'static,
{
    info!("router accepting connections");

    loop {
        match server.accept().await {
            Ok((sender, receiver, addr)) => {
                let hub = hub.clone();
                tokio::spawn(async move {
                    if let Err(e) = drive_connection(hub, sender, receiver, addr).await {
                        warn!("connection {} ended: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("accept error: {}", e);
            }
        }
    }
}

/// Run one duplex connection to completion.
async fn drive_connection<Snd, Rcv>(
    hub: HubHandle,
    sender: Snd,
    mut receiver: Rcv,
    addr: SocketAddr,
) -> Result<()>
where
    Snd: TransportSender + 'static,
    Rcv: TransportReceiver,
{
    let (registration, mut mailbox) = hub.register().await?;
    let id = registration.id().to_string();
    debug!("connection {} registered as {}", addr, id);

    // Write loop. Ends when the mailbox closes (hub dropped us) or the
    // socket rejects a write; either way the peer is done.
    let writer = tokio::spawn(async move {
        while let Some(cmd) = mailbox.recv().await {
            let bytes = match codec::encode(&cmd) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("encode error: {}", e);
                    continue;
                }
            };
            if sender.send(bytes).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    // Read loop: the only producer of this connection's dispatches, so
    // per-connection command order is preserved into the hub queue.
    while let Some(event) = receiver.recv().await {
        match event {
            TransportEvent::Data(data) => match codec::decode(&data) {
                Ok(cmd) => {
                    if hub.dispatch(cmd).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    // recoverable: answer the sender, keep the
                    // connection open
                    warn!("bad frame from {}: {}", id, e);
                    hub.send_to(&id, Command::error(format!("malformed command: {}", e)));
                }
            },
            TransportEvent::Disconnected { reason } => {
                info!("client {} disconnected: {:?}", id, reason);
                break;
            }
            TransportEvent::Error(e) => {
                error!("transport error on {}: {}", id, e);
                break;
            }
            TransportEvent::Connected => {}
        }
    }

    registration.release();
    let _ = writer.await;
    Ok(())
}
