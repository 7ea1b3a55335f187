//! WebSocket transport
//!
//! Frames are text, one JSON command per frame. The server side owns
//! liveness: it pings on a fixed interval and gives up on peers that
//! stay silent past the idle grace window, so silently-dead
//! connections are detected without any cooperation from routing.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    accept_async_with_config, connect_async,
    tungstenite::protocol::{Message as WsMessage, WebSocketConfig as WsProtocolConfig},
};
use tracing::{debug, error, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{TransportEvent, TransportReceiver, TransportSender, TransportServer};

/// WebSocket server configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Maximum inbound frame size in bytes
    pub max_message_size: usize,
    /// Heartbeat ping period
    pub ping_interval: Duration,
    /// How long a peer may stay silent before it is abandoned.
    /// Must exceed `ping_interval` or healthy peers get dropped.
    pub idle_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024,
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(75),
        }
    }
}

/// Write half of a WebSocket connection
pub struct WebSocketSender {
    tx: mpsc::Sender<WsMessage>,
    connected: Arc<Mutex<bool>>,
}

#[async_trait]
impl TransportSender for WebSocketSender {
    async fn send(&self, data: Bytes) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let text = String::from_utf8(data.to_vec())
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        self.tx
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    async fn close(&self) -> Result<()> {
        let _ = self.tx.send(WsMessage::Close(None)).await;
        *self.connected.lock() = false;
        Ok(())
    }
}

/// Read half of a WebSocket connection
pub struct WebSocketReceiver {
    rx: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
impl TransportReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// Connect to a ripple WebSocket endpoint.
///
/// Used by test harnesses and embedding clients; the returned pair
/// behaves like a server-accepted connection minus the heartbeat (the
/// server drives liveness).
pub async fn connect(url: &str) -> Result<(WebSocketSender, WebSocketReceiver)> {
    info!("connecting to {}", url);

    let (ws_stream, response) = connect_async(url)
        .await
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
    debug!("connected, status {}", response.status());

    let (mut write, mut read) = ws_stream.split();

    let (send_tx, mut send_rx) = mpsc::channel::<WsMessage>(100);
    let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(100);

    let connected = Arc::new(Mutex::new(true));
    let connected_write = connected.clone();
    let connected_read = connected.clone();

    // Writer task: pump queued frames out
    tokio::spawn(async move {
        while let Some(msg) = send_rx.recv().await {
            if let Err(e) = write.send(msg).await {
                error!("write error: {}", e);
                break;
            }
        }
        *connected_write.lock() = false;
    });

    // Reader task: surface frames as events
    tokio::spawn(async move {
        let _ = event_tx.send(TransportEvent::Connected).await;

        while let Some(result) = read.next().await {
            match result {
                Ok(msg) => {
                    if !forward_frame(msg, &event_tx).await {
                        break;
                    }
                }
                Err(e) => {
                    let _ = event_tx
                        .send(TransportEvent::Disconnected {
                            reason: Some(e.to_string()),
                        })
                        .await;
                    break;
                }
            }
        }

        *connected_read.lock() = false;
    });

    Ok((
        WebSocketSender {
            tx: send_tx,
            connected,
        },
        WebSocketReceiver { rx: event_rx },
    ))
}

/// Relay one inbound frame to the event channel.
/// Returns false when the connection is finished.
async fn forward_frame(msg: WsMessage, event_tx: &mpsc::Sender<TransportEvent>) -> bool {
    match msg {
        WsMessage::Text(text) => {
            let _ = event_tx.send(TransportEvent::Data(Bytes::from(text))).await;
            true
        }
        WsMessage::Binary(data) => {
            let _ = event_tx.send(TransportEvent::Data(Bytes::from(data))).await;
            true
        }
        // tungstenite answers pings itself; both directions only
        // matter as proof of life, which the caller's timeout tracks
        WsMessage::Ping(_) | WsMessage::Pong(_) => true,
        WsMessage::Close(frame) => {
            let reason = frame.map(|f| f.reason.to_string());
            let _ = event_tx.send(TransportEvent::Disconnected { reason }).await;
            false
        }
        WsMessage::Frame(_) => true,
    }
}

/// WebSocket listener
pub struct WebSocketServer {
    listener: tokio::net::TcpListener,
    config: WebSocketConfig,
}

impl WebSocketServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!("websocket server listening on {}", addr);

        Ok(Self {
            listener,
            config: WebSocketConfig::default(),
        })
    }

    pub fn with_config(mut self, config: WebSocketConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl TransportServer for WebSocketServer {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn accept(&mut self) -> Result<(Self::Sender, Self::Receiver, SocketAddr)> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        debug!("accepted tcp connection from {}", addr);

        let mut ws_config = WsProtocolConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);

        let ws_stream = accept_async_with_config(stream, Some(ws_config))
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!("websocket client connected from {}", addr);

        let (mut write, mut read) = ws_stream.split();

        let (send_tx, mut send_rx) = mpsc::channel::<WsMessage>(100);
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(100);

        let connected = Arc::new(Mutex::new(true));
        let connected_write = connected.clone();
        let connected_read = connected.clone();

        // Writer task: pump queued frames, ping on the heartbeat
        // interval. A failed ping means the peer is gone.
        let ping_interval = self.config.ping_interval;
        tokio::spawn(async move {
            let mut ping = tokio::time::interval(ping_interval);
            ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick completes immediately
            ping.tick().await;

            loop {
                tokio::select! {
                    msg = send_rx.recv() => match msg {
                        Some(msg) => {
                            if let Err(e) = write.send(msg).await {
                                error!("write error to {}: {}", addr, e);
                                break;
                            }
                        }
                        None => {
                            let _ = write.send(WsMessage::Close(None)).await;
                            break;
                        }
                    },
                    _ = ping.tick() => {
                        if let Err(e) = write.send(WsMessage::Ping(Vec::new())).await {
                            warn!("heartbeat to {} failed: {}", addr, e);
                            break;
                        }
                    }
                }
            }
            *connected_write.lock() = false;
        });

        // Reader task: surface frames, abandon silent peers
        let idle_timeout = self.config.idle_timeout;
        tokio::spawn(async move {
            let _ = event_tx.send(TransportEvent::Connected).await;

            loop {
                let frame = match tokio::time::timeout(idle_timeout, read.next()).await {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        let _ = event_tx
                            .send(TransportEvent::Disconnected { reason: None })
                            .await;
                        break;
                    }
                    Err(_) => {
                        warn!("peer {} idle past grace window", addr);
                        let _ = event_tx
                            .send(TransportEvent::Disconnected {
                                reason: Some("idle timeout".into()),
                            })
                            .await;
                        break;
                    }
                };

                match frame {
                    Ok(msg) => {
                        if !forward_frame(msg, &event_tx).await {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = event_tx
                            .send(TransportEvent::Disconnected {
                                reason: Some(e.to_string()),
                            })
                            .await;
                        break;
                    }
                }
            }

            *connected_read.lock() = false;
        });

        Ok((
            WebSocketSender {
                tx: send_tx,
                connected,
            },
            WebSocketReceiver { rx: event_rx },
            addr,
        ))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(TransportError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_keep_peers_alive() {
        let config = WebSocketConfig::default();
        assert!(config.idle_timeout > config.ping_interval);
    }

    #[tokio::test]
    async fn bind_reports_local_addr() {
        let server = WebSocketServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }
}
