//! Live bookmark feed.
//!
//! The server broadcasts bookmark lifecycle events over a Phoenix channel.
//! [`Socket`] and [`Channel`] speak the channel protocol; [`FeedSubscriber`]
//! wires one of each to the bookmark feed and hands out typed
//! [`FeedEvent`]s.
//!
//! # Usage
//!
//! ```rust,ignore
//! let subscriber = FeedSubscriber::from_config(&cfg);
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! subscriber.forward_to(tx);
//!
//! match subscriber.join().await? {
//!     JoinOutcome::Joined(_) => {}
//!     JoinOutcome::Rejected(reason) => return Err(anyhow!("rejected: {reason}")),
//! }
//! while let Some(event) = rx.recv().await {
//!     println!("{:?}", event.kind);
//! }
//! ```

mod message;
mod registry;
mod socket;

use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::FeedError;
use crate::model::{FeedEvent, FeedEventKind};

pub use message::{Frame, Reply, transport_url};
pub use registry::{Handler, HandlerRegistry};
pub use socket::{Channel, ChannelState, ConnectionState, JoinOutcome, Socket};

pub const BOOKMARK_FEED_TOPIC: &str = "bookmark:feed";

pub fn tag_topic(tag: &str) -> String {
    format!("tag:{}", tag)
}

pub struct FeedSubscriber {
    socket: Socket,
    channel: Channel,
}

impl FeedSubscriber {
    pub fn connect(endpoint: &str, topic: &str, heartbeat: Duration) -> Self {
        let socket = Socket::connect(endpoint, heartbeat);
        let channel = socket.channel(topic, json!({}));
        FeedSubscriber { socket, channel }
    }

    pub fn from_config(cfg: &Config) -> Self {
        FeedSubscriber::connect(
            &cfg.socket_endpoint(),
            &cfg.feed.topic,
            cfg.feed.heartbeat_interval(),
        )
    }

    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn on<F>(&self, kind: FeedEventKind, handler: F)
    where
        F: Fn(FeedEvent) + Send + Sync + 'static,
    {
        self.channel.on(kind.event_name(), move |payload: &Value| {
            handler(FeedEvent {
                kind,
                payload: payload.clone(),
            })
        });
    }

    /// Sends created, updated and deleted events into `sink`.
    pub fn forward_to(&self, sink: mpsc::UnboundedSender<FeedEvent>) {
        for kind in FeedEventKind::ALL {
            let sink = sink.clone();
            self.on(kind, move |event| {
                if sink.send(event).is_err() {
                    tracing::debug!("feed event receiver dropped");
                }
            });
        }
    }

    pub async fn join(&self) -> Result<JoinOutcome, FeedError> {
        self.channel.join().await
    }
}
