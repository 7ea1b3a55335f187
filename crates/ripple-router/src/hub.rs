//! The hub: serialized owner of all routing state
//!
//! One spawned task owns the identity map and the subscription table
//! and processes events strictly in arrival order. Everything else —
//! transport adapters, the storage layer's publish calls, test
//! harnesses — talks to it through a cloneable [`HubHandle`] over an
//! unbounded event queue, so producers never block and never touch
//! hub state directly. No locks anywhere: the loop is the only writer.

use std::collections::HashMap;
use std::sync::Arc;

use ripple_core::{is_reserved_channel, Command, CommandKind, SYSTEM_ID};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Validator;
use crate::connection::{Connection, ConnectionId, Registration};
use crate::error::{HubError, Result};

/// Hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Outbound mailbox capacity per connection. A connection that
    /// lets its mailbox fill up is treated as disconnected.
    pub mailbox_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 64,
        }
    }
}

/// Events processed by the hub loop
enum HubEvent {
    Register {
        reply: oneshot::Sender<(ConnectionId, mpsc::Receiver<Command>)>,
    },
    Unregister {
        id: ConnectionId,
    },
    Dispatch {
        cmd: Command,
    },
    Publish {
        cmd: Command,
        channel: String,
    },
    SendTo {
        id: ConnectionId,
        cmd: Command,
    },
    ConnectionCount {
        reply: oneshot::Sender<usize>,
    },
    ChannelMembers {
        channel: String,
        reply: oneshot::Sender<Vec<ConnectionId>>,
    },
}

/// Cloneable handle feeding events into the hub loop.
///
/// Every method is safe to call from any task. The fire-and-forget
/// methods cannot block; the awaiting ones only wait for the hub's
/// serialized reply, never for other connections.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubEvent>,
}

impl HubHandle {
    /// Register a new connection. The hub assigns the identity, queues
    /// the `init` command, and hands back the mailbox to drain.
    pub async fn register(&self) -> Result<(Registration, mpsc::Receiver<Command>)> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubEvent::Register { reply })
            .map_err(|_| HubError::Closed)?;
        let (id, mailbox) = rx.await.map_err(|_| HubError::Closed)?;
        Ok((Registration::new(id, self.clone()), mailbox))
    }

    /// Remove a connection from all routing state. Idempotent.
    pub fn unregister(&self, id: &str) {
        let _ = self.tx.send(HubEvent::Unregister { id: id.to_string() });
    }

    /// Feed one inbound command into the routing loop.
    pub fn dispatch(&self, cmd: Command) -> Result<()> {
        self.tx
            .send(HubEvent::Dispatch { cmd })
            .map_err(|_| HubError::Closed)
    }

    /// Publish a command to every current member of `channel`.
    ///
    /// This is the entry point the storage layer uses for `db_*`
    /// change notifications; members that disconnected since the last
    /// scrub are skipped silently.
    pub fn publish(&self, cmd: Command, channel: &str) -> Result<()> {
        self.tx
            .send(HubEvent::Publish {
                cmd,
                channel: channel.to_string(),
            })
            .map_err(|_| HubError::Closed)
    }

    /// Queue a router-origin command to one connection.
    pub fn send_to(&self, id: &str, cmd: Command) {
        let _ = self.tx.send(HubEvent::SendTo {
            id: id.to_string(),
            cmd,
        });
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubEvent::ConnectionCount { reply })
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Current members of `channel` (empty when absent).
    pub async fn channel_members(&self, channel: &str) -> Result<Vec<ConnectionId>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubEvent::ChannelMembers {
                channel: channel.to_string(),
                reply,
            })
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }
}

/// Routing state and loop. Constructed through [`Hub::spawn`]; the
/// state never leaves the spawned task.
pub struct Hub {
    config: HubConfig,
    validator: Arc<dyn Validator>,
    /// identity -> live connection; source of truth for liveness
    connections: HashMap<ConnectionId, Connection>,
    /// channel -> member identities, deduplicated
    subscriptions: HashMap<String, Vec<ConnectionId>>,
}

impl Hub {
    /// Spawn the hub loop and return the handle to it.
    pub fn spawn(config: HubConfig, validator: Arc<dyn Validator>) -> HubHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Hub {
            config,
            validator,
            connections: HashMap::new(),
            subscriptions: HashMap::new(),
        };
        tokio::spawn(hub.run(rx));
        HubHandle { tx }
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<HubEvent>) {
        info!("hub loop started");
        while let Some(event) = events.recv().await {
            match event {
                HubEvent::Register { reply } => self.register(reply),
                HubEvent::Unregister { id } => self.unregister(&id),
                HubEvent::Dispatch { cmd } => self.dispatch(cmd).await,
                HubEvent::Publish { cmd, channel } => self.publish_to(cmd, &channel),
                HubEvent::SendTo { id, cmd } => self.send_to(&id, cmd),
                HubEvent::ConnectionCount { reply } => {
                    let _ = reply.send(self.connections.len());
                }
                HubEvent::ChannelMembers { channel, reply } => {
                    let members = self.subscriptions.get(&channel).cloned().unwrap_or_default();
                    let _ = reply.send(members);
                }
            }
        }
        info!("hub loop stopped");
    }

    fn register(&mut self, reply: oneshot::Sender<(ConnectionId, mpsc::Receiver<Command>)>) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(self.config.mailbox_capacity);

        self.connections.insert(id.clone(), Connection::new(tx));
        self.send_to(&id, Command::init(id.clone()));

        debug!("registered connection {}", id);

        if reply.send((id.clone(), rx)).is_err() {
            // the adapter gave up while registering
            self.unregister(&id);
        }
    }

    fn unregister(&mut self, id: &str) {
        if self.connections.remove(id).is_none() {
            return;
        }
        self.scrub(id);
        info!("unregistered connection {}", id);
    }

    /// Remove an identity from every channel, dropping emptied ones.
    fn scrub(&mut self, id: &str) {
        self.subscriptions.retain(|_, members| {
            members.retain(|member| member != id);
            !members.is_empty()
        });
    }

    async fn dispatch(&mut self, cmd: Command) {
        let sid = cmd.sid.clone();
        if !self.connections.contains_key(&sid) {
            // the sender disconnected between send and processing;
            // there is nobody left to answer
            debug!("dropping {} from unknown sender {:?}", cmd.kind, sid);
            return;
        }

        let reply = match cmd.kind.clone() {
            CommandKind::Echo => {
                let mut payload = cmd.clone();
                payload.data = format!("echo: {}", cmd.data);
                payload
            }
            CommandKind::Auth => match self.validator.validate(&cmd.data).await {
                Ok(claims) => {
                    debug!("auth ok for {} ({} claims)", sid, claims.len());
                    Command::token(cmd.data.clone())
                }
                Err(e) => {
                    warn!("auth failed for {}: {}", sid, e);
                    Command::error("invalid token")
                }
            },
            CommandKind::Join => self.join(&sid, &cmd.data),
            CommandKind::ChanIn => {
                if cmd.channel.is_empty() {
                    Command::error("no channel was specified")
                } else if is_reserved_channel(&cmd.channel) {
                    // clients writing to db-* could forge synthetic
                    // change events
                    Command::error("you cannot write to database channel")
                } else {
                    let channel = cmd.channel.clone();
                    self.publish_to(cmd, &channel);
                    Command::ok()
                }
            }
            other => Command::error(format!("{} command not found", other)),
        };

        self.send_to(&sid, reply);
    }

    fn join(&mut self, sid: &str, channel: &str) -> Command {
        if channel.is_empty() {
            return Command::error("no channel was specified");
        }

        let members = self.subscriptions.entry(channel.to_string()).or_default();
        if !members.iter().any(|member| member == sid) {
            members.push(sid.to_string());
        }

        debug!("{} joined {}", sid, channel);
        Command::joined(channel)
    }

    /// Fan a command out to every current member of `channel`.
    fn publish_to(&mut self, mut cmd: Command, channel: &str) {
        if cmd.kind == CommandKind::ChanIn {
            cmd.kind = CommandKind::ChanOut;
        }
        if cmd.is_db_event() {
            cmd.sid = SYSTEM_ID.to_string();
        }
        cmd.channel = channel.to_string();

        let members = match self.subscriptions.get(channel) {
            Some(members) => members.clone(),
            None => return,
        };

        debug!("publishing {} to {} ({} members)", cmd.kind, channel, members.len());
        for sid in members {
            self.send_to(&sid, cmd.clone());
        }
    }

    /// Enqueue to one connection's mailbox. A full (or closed) mailbox
    /// means the peer is not draining: it is dropped from all state so
    /// one slow consumer cannot stall delivery to everyone else.
    fn send_to(&mut self, sid: &str, cmd: Command) {
        let stalled = match self.connections.get(sid) {
            Some(conn) => conn.enqueue(cmd).is_err(),
            // disconnected since the decision was computed; expected
            None => false,
        };

        if stalled {
            warn!("mailbox full, dropping connection {}", sid);
            self.connections.remove(sid);
            self.scrub(sid);
        }
    }
}
