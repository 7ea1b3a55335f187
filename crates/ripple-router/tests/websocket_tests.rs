//! WebSocket end-to-end tests
//!
//! Real sockets on ephemeral ports, using the transport crate's client
//! connector against a served hub.

mod common;

use common::{init_tracing, AcceptAll};
use ripple_core::{codec, Command, CommandKind};
use ripple_router::{serve_on, Hub, HubConfig, HubHandle};
use ripple_transport::{
    connect, TransportEvent, TransportReceiver, TransportSender, TransportServer, WebSocketConfig,
    WebSocketReceiver, WebSocketSender, WebSocketServer,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

async fn start_router() -> (HubHandle, SocketAddr, tokio::task::JoinHandle<()>) {
    init_tracing();
    let hub = Hub::spawn(HubConfig::default(), Arc::new(AcceptAll));
    let server = WebSocketServer::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    let serve_hub = hub.clone();
    let handle = tokio::spawn(async move {
        let _ = serve_on(serve_hub, server).await;
    });
    (hub, addr, handle)
}

/// Connect and wait for the `init` command; returns the assigned id.
async fn connect_client(addr: SocketAddr) -> (WebSocketSender, WebSocketReceiver, String) {
    let url = format!("ws://{}", addr);
    let (sender, mut receiver) = connect(&url).await.unwrap();
    let init = next_command(&mut receiver).await;
    assert_eq!(init.kind, CommandKind::Init);
    let id = init.data;
    (sender, receiver, id)
}

async fn next_command(receiver: &mut WebSocketReceiver) -> Command {
    timeout(Duration::from_secs(2), async {
        loop {
            match receiver.recv().await {
                Some(TransportEvent::Data(data)) => return codec::decode(&data).unwrap(),
                Some(TransportEvent::Connected) => continue,
                other => panic!("connection ended while waiting for a command: {:?}", other),
            }
        }
    })
    .await
    .expect("timed out waiting for a command")
}

async fn send_command(sender: &WebSocketSender, cmd: &Command) {
    sender.send(codec::encode(cmd).unwrap()).await.unwrap();
}

fn client_cmd(sid: &str, kind: CommandKind, data: &str, channel: &str) -> Command {
    Command {
        sid: sid.to_string(),
        kind,
        data: data.to_string(),
        channel: channel.to_string(),
        token: String::new(),
    }
}

#[tokio::test]
async fn connect_receives_init() {
    let (_hub, addr, server) = start_router().await;

    let (_sender, _receiver, id) = connect_client(addr).await;
    assert!(!id.is_empty());

    server.abort();
}

#[tokio::test]
async fn echo_round_trips_over_the_wire() {
    let (_hub, addr, server) = start_router().await;
    let (sender, mut receiver, id) = connect_client(addr).await;

    send_command(&sender, &client_cmd(&id, CommandKind::Echo, "hello", "")).await;

    let reply = next_command(&mut receiver).await;
    assert_eq!(reply.kind, CommandKind::Echo);
    assert_eq!(reply.data, "echo: hello");

    server.abort();
}

#[tokio::test]
async fn two_clients_share_a_room() {
    let (_hub, addr, server) = start_router().await;

    let (sender_a, mut receiver_a, id_a) = connect_client(addr).await;
    let (sender_b, mut receiver_b, id_b) = connect_client(addr).await;

    send_command(&sender_a, &client_cmd(&id_a, CommandKind::Join, "room1", "")).await;
    assert_eq!(next_command(&mut receiver_a).await.kind, CommandKind::Joined);
    send_command(&sender_b, &client_cmd(&id_b, CommandKind::Join, "room1", "")).await;
    assert_eq!(next_command(&mut receiver_b).await.kind, CommandKind::Joined);

    send_command(&sender_a, &client_cmd(&id_a, CommandKind::ChanIn, "hi", "room1")).await;

    // b receives the delivery form
    let delivery = next_command(&mut receiver_b).await;
    assert_eq!(delivery.kind, CommandKind::ChanOut);
    assert_eq!(delivery.data, "hi");
    assert_eq!(delivery.channel, "room1");
    assert_eq!(delivery.sid, id_a);

    // a receives the ack and, as a member, its own delivery
    let mut got_ok = false;
    let mut got_delivery = false;
    for _ in 0..2 {
        match next_command(&mut receiver_a).await.kind {
            CommandKind::Ok => got_ok = true,
            CommandKind::ChanOut => got_delivery = true,
            other => panic!("unexpected reply: {}", other),
        }
    }
    assert!(got_ok && got_delivery);

    server.abort();
}

#[tokio::test]
async fn reserved_channel_is_rejected_over_the_wire() {
    let (_hub, addr, server) = start_router().await;
    let (sender, mut receiver, id) = connect_client(addr).await;

    send_command(
        &sender,
        &client_cmd(&id, CommandKind::ChanIn, "fake", "db-users"),
    )
    .await;

    let reply = next_command(&mut receiver).await;
    assert_eq!(reply.kind, CommandKind::Error);
    assert_eq!(reply.data, "you cannot write to database channel");

    server.abort();
}

#[tokio::test]
async fn unknown_command_gets_a_named_error() {
    let (_hub, addr, server) = start_router().await;
    let (sender, mut receiver, id) = connect_client(addr).await;

    send_command(
        &sender,
        &client_cmd(&id, CommandKind::Unknown("frobnicate".into()), "", ""),
    )
    .await;

    let reply = next_command(&mut receiver).await;
    assert_eq!(reply.kind, CommandKind::Error);
    assert_eq!(reply.data, "frobnicate command not found");

    server.abort();
}

#[tokio::test]
async fn malformed_frame_keeps_the_connection_open() {
    let (_hub, addr, server) = start_router().await;
    let (sender, mut receiver, id) = connect_client(addr).await;

    sender
        .send(bytes::Bytes::from_static(b"this is not json"))
        .await
        .unwrap();

    let reply = next_command(&mut receiver).await;
    assert_eq!(reply.kind, CommandKind::Error);
    assert!(reply.data.starts_with("malformed command"));

    // still usable afterwards
    send_command(&sender, &client_cmd(&id, CommandKind::Echo, "alive", "")).await;
    assert_eq!(next_command(&mut receiver).await.data, "echo: alive");

    server.abort();
}

#[tokio::test]
async fn disconnect_unregisters_and_scrubs() {
    let (hub, addr, server) = start_router().await;
    let (sender, receiver, id) = connect_client(addr).await;

    send_command(&sender, &client_cmd(&id, CommandKind::Join, "room1", "")).await;

    // wait until the membership lands
    wait_for(|| {
        let hub = hub.clone();
        let id = id.clone();
        async move { hub.channel_members("room1").await.unwrap() == vec![id] }
    })
    .await;

    sender.close().await.unwrap();
    drop(receiver);

    // the adapter's exit path must unregister and scrub
    wait_for(|| {
        let hub = hub.clone();
        async move {
            hub.channel_members("room1").await.unwrap().is_empty()
                && hub.connection_count().await.unwrap() == 0
        }
    })
    .await;

    server.abort();
}

#[tokio::test]
async fn silent_peer_is_abandoned_after_idle_grace() {
    init_tracing();
    let hub = Hub::spawn(HubConfig::default(), Arc::new(AcceptAll));
    let server = WebSocketServer::bind("127.0.0.1:0")
        .await
        .unwrap()
        .with_config(WebSocketConfig {
            ping_interval: Duration::from_millis(50),
            idle_timeout: Duration::from_millis(200),
            ..WebSocketConfig::default()
        });
    let addr = server.local_addr().unwrap();
    let serve_hub = hub.clone();
    let server_task = tokio::spawn(async move {
        let _ = serve_on(serve_hub, server).await;
    });

    // Handshake only. The stream is never polled afterwards, so this
    // peer neither reads frames nor answers heartbeat pings.
    let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let (ws, _response) = tokio_tungstenite::client_async(format!("ws://{}", addr), stream)
        .await
        .unwrap();

    wait_for(|| {
        let hub = hub.clone();
        async move { hub.connection_count().await.unwrap() == 1 }
    })
    .await;

    // the idle grace window must expire and unregister the peer
    wait_for(|| {
        let hub = hub.clone();
        async move { hub.connection_count().await.unwrap() == 0 }
    })
    .await;

    drop(ws);
    server_task.abort();
}

/// Poll `check` until it holds or two seconds pass.
async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(Duration::from_secs(2), async {
        loop {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
