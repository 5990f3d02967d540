//! Phoenix socket client over `tokio-tungstenite`.
//!
//! A [`Socket`] owns one background task that holds the websocket. Joins and
//! heartbeats are queued to that task; incoming frames are routed to join
//! replies or to the handlers registered on a [`Channel`].

use std::collections::HashMap;
use std::future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::message::{Frame, PHX_CLOSE, PHX_ERROR, PHX_REPLY, Reply, transport_url};
use super::registry::HandlerRegistry;
use crate::error::FeedError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    /// The transport ended. Nothing reconnects it.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Unjoined,
    Joining,
    Joined,
    JoinFailed,
}

/// What the server answered to a join.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Joined(Value),
    Rejected(Value),
}

#[derive(Default)]
struct TopicEntry {
    state: ChannelState,
    handlers: HandlerRegistry,
}

type Topics = Arc<RwLock<HashMap<String, TopicEntry>>>;

struct PendingJoin {
    topic: String,
    reply_tx: oneshot::Sender<JoinOutcome>,
}

enum Command {
    Join {
        topic: String,
        params: Value,
        reply_tx: oneshot::Sender<JoinOutcome>,
    },
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub struct Socket {
    endpoint: String,
    cmd_tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    topics: Topics,
    _handler: JoinHandle<()>,
}

impl Socket {
    /// Starts connecting to `endpoint` in the background and returns at once.
    /// Must be called from inside a tokio runtime. A zero `heartbeat` turns
    /// heartbeats off.
    pub fn connect(endpoint: &str, heartbeat: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);
        let topics: Topics = Arc::new(RwLock::new(HashMap::new()));

        let handler = tokio::spawn(socket_loop(
            transport_url(endpoint),
            cmd_rx,
            state_tx,
            topics.clone(),
            heartbeat,
        ));

        Socket {
            endpoint: endpoint.to_string(),
            cmd_tx,
            state,
            topics,
            _handler: handler,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Resolves once the transport has ended.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == ConnectionState::Closed).await;
    }

    /// A handle on `topic`. Nothing is sent until [`Channel::join`].
    pub fn channel(&self, topic: &str, params: Value) -> Channel {
        write(&self.topics).entry(topic.to_string()).or_default();
        Channel {
            topic: topic.to_string(),
            params,
            cmd_tx: self.cmd_tx.clone(),
            topics: self.topics.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Channel {
    topic: String,
    params: Value,
    cmd_tx: mpsc::UnboundedSender<Command>,
    topics: Topics,
}

impl Channel {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> ChannelState {
        read(&self.topics)
            .get(&self.topic)
            .map(|entry| entry.state)
            .unwrap_or_default()
    }

    /// Binds `handler` to `event` on this topic. Works before or after join.
    pub fn on<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        write(&self.topics)
            .entry(self.topic.clone())
            .or_default()
            .handlers
            .register(event, Arc::new(handler));
    }

    pub async fn join(&self) -> Result<JoinOutcome, FeedError> {
        {
            let mut topics = write(&self.topics);
            let entry = topics.entry(self.topic.clone()).or_default();
            if entry.state != ChannelState::Unjoined {
                return Err(FeedError::AlreadyJoined(self.topic.clone()));
            }
            entry.state = ChannelState::Joining;
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let sent = self.cmd_tx.send(Command::Join {
            topic: self.topic.clone(),
            params: self.params.clone(),
            reply_tx,
        });
        if sent.is_err() {
            return Err(self.abandon_join());
        }

        match reply_rx.await {
            Ok(outcome) => Ok(outcome),
            Err(_) => Err(self.abandon_join()),
        }
    }

    // The socket went away before a reply arrived; the join can never finish.
    fn abandon_join(&self) -> FeedError {
        if let Some(entry) = write(&self.topics).get_mut(&self.topic) {
            entry.state = ChannelState::JoinFailed;
        }
        FeedError::ConnectionClosed
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending::<()>().await,
    }
}

async fn socket_loop(
    url: String,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    topics: Topics,
    heartbeat: Duration,
) {
    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            tracing::error!(error = %e, url = %url, "failed to connect feed socket");
            state.send_replace(ConnectionState::Closed);
            return;
        }
    };
    state.send_replace(ConnectionState::Connected);
    tracing::info!(url = %url, "feed socket connected");

    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut pending: HashMap<String, PendingJoin> = HashMap::new();
    let mut next_ref: u64 = 1;
    let mut heartbeat = (!heartbeat.is_zero())
        .then(|| tokio::time::interval_at(Instant::now() + heartbeat, heartbeat));

    loop {
        let outgoing = tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(Command::Join { topic, params, reply_tx }) = cmd else { break };
                let reference = next_ref.to_string();
                next_ref += 1;
                let frame = Frame::join(&topic, params, reference.clone());
                pending.insert(reference, PendingJoin { topic, reply_tx });
                frame
            }
            _ = next_tick(&mut heartbeat) => {
                let reference = next_ref.to_string();
                next_ref += 1;
                Frame::heartbeat(reference)
            }
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else { break };
                let Message::Text(text) = msg else { continue };
                match Frame::decode(&text) {
                    Ok(frame) => handle_frame(frame, &mut pending, &topics),
                    Err(e) => tracing::debug!(error = %e, "skipping undecodable frame"),
                }
                continue;
            }
        };

        let text = match outgoing.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, event = %outgoing.event, "failed to encode frame");
                continue;
            }
        };
        if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
            tracing::warn!(error = %e, "failed to write to feed socket");
            break;
        }
    }

    state.send_replace(ConnectionState::Closed);
    tracing::warn!(url = %url, "feed socket closed");
}

fn handle_frame(frame: Frame, pending: &mut HashMap<String, PendingJoin>, topics: &Topics) {
    match frame.event.as_str() {
        PHX_REPLY => {
            // Heartbeat replies have no pending entry and are dropped here.
            let Some(join) = frame.reference.as_deref().and_then(|r| pending.remove(r)) else {
                return;
            };
            let reply: Reply = serde_json::from_value(frame.payload).unwrap_or_else(|e| Reply {
                status: "error".to_string(),
                response: json!({ "reason": format!("malformed reply: {}", e) }),
            });

            let (outcome, state) = if reply.is_ok() {
                tracing::info!(topic = %join.topic, response = %reply.response, "joined topic");
                (JoinOutcome::Joined(reply.response), ChannelState::Joined)
            } else {
                tracing::warn!(topic = %join.topic, response = %reply.response, "unable to join topic");
                (JoinOutcome::Rejected(reply.response), ChannelState::JoinFailed)
            };

            write(topics).entry(join.topic).or_default().state = state;
            let _ = join.reply_tx.send(outcome);
        }
        PHX_ERROR | PHX_CLOSE => {
            tracing::warn!(topic = %frame.topic, event = %frame.event, payload = %frame.payload, "channel reported");
        }
        event => {
            let handlers = match read(topics).get(&frame.topic) {
                Some(entry) if entry.state == ChannelState::Joined => entry.handlers.handlers_for(event),
                _ => {
                    tracing::debug!(topic = %frame.topic, event = %event, "frame for topic that is not joined");
                    return;
                }
            };
            if handlers.is_empty() {
                tracing::debug!(topic = %frame.topic, event = %event, "no handler for event");
            }
            for handler in &handlers {
                handler(&frame.payload);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn topics_with(topic: &str, state: ChannelState) -> Topics {
        let mut map = HashMap::new();
        map.insert(
            topic.to_string(),
            TopicEntry {
                state,
                handlers: HandlerRegistry::new(),
            },
        );
        Arc::new(RwLock::new(map))
    }

    fn reply(reference: &str, status: &str) -> Frame {
        Frame {
            topic: "bookmark:feed".into(),
            event: PHX_REPLY.into(),
            payload: json!({ "status": status, "response": { "from": "server" } }),
            reference: Some(reference.into()),
        }
    }

    fn push(event: &str, payload: Value) -> Frame {
        Frame {
            topic: "bookmark:feed".into(),
            event: event.into(),
            payload,
            reference: None,
        }
    }

    #[test]
    fn test_ok_reply_marks_topic_joined() {
        let topics = topics_with("bookmark:feed", ChannelState::Joining);
        let (reply_tx, mut reply_rx) = oneshot::channel();
        let mut pending = HashMap::new();
        pending.insert(
            "1".to_string(),
            PendingJoin {
                topic: "bookmark:feed".into(),
                reply_tx,
            },
        );

        handle_frame(reply("1", "ok"), &mut pending, &topics);

        assert!(pending.is_empty());
        assert_eq!(
            reply_rx.try_recv().unwrap(),
            JoinOutcome::Joined(json!({ "from": "server" }))
        );
        assert_eq!(read(&topics)["bookmark:feed"].state, ChannelState::Joined);
    }

    #[test]
    fn test_error_reply_marks_topic_failed() {
        let topics = topics_with("bookmark:feed", ChannelState::Joining);
        let (reply_tx, mut reply_rx) = oneshot::channel();
        let mut pending = HashMap::new();
        pending.insert(
            "7".to_string(),
            PendingJoin {
                topic: "bookmark:feed".into(),
                reply_tx,
            },
        );

        handle_frame(reply("7", "error"), &mut pending, &topics);

        assert!(matches!(reply_rx.try_recv().unwrap(), JoinOutcome::Rejected(_)));
        assert_eq!(read(&topics)["bookmark:feed"].state, ChannelState::JoinFailed);
    }

    #[test]
    fn test_unmatched_reply_is_ignored() {
        let topics = topics_with("bookmark:feed", ChannelState::Joined);
        let mut pending = HashMap::new();
        handle_frame(reply("42", "ok"), &mut pending, &topics);
        assert_eq!(read(&topics)["bookmark:feed"].state, ChannelState::Joined);
    }

    #[test]
    fn test_events_dispatch_only_when_joined() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for (state, expected) in [(ChannelState::Joining, 0), (ChannelState::Joined, 1)] {
            let topics = topics_with("bookmark:feed", state);
            let log = seen.clone();
            write(&topics)
                .get_mut("bookmark:feed")
                .unwrap()
                .handlers
                .register("bookmark:created", Arc::new(move |p: &Value| log.lock().unwrap().push(p.clone())));

            seen.lock().unwrap().clear();
            handle_frame(push("bookmark:created", json!({"id": 1})), &mut HashMap::new(), &topics);
            assert_eq!(seen.lock().unwrap().len(), expected);
        }
    }

    #[test]
    fn test_handler_may_register_more_handlers() {
        let topics = topics_with("bookmark:feed", ChannelState::Joined);
        let inner = topics.clone();
        write(&topics)
            .get_mut("bookmark:feed")
            .unwrap()
            .handlers
            .register(
                "bookmark:created",
                Arc::new(move |_: &Value| {
                    write(&inner)
                        .get_mut("bookmark:feed")
                        .unwrap()
                        .handlers
                        .register("bookmark:deleted", Arc::new(|_: &Value| {}));
                }),
            );

        handle_frame(push("bookmark:created", json!({})), &mut HashMap::new(), &topics);
        assert!(read(&topics)["bookmark:feed"].handlers.is_registered("bookmark:deleted"));
    }
}
