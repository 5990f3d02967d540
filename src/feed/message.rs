//! Phoenix channel frames, V1 JSON serializer.
//!
//! Every frame is a JSON object `{"topic", "event", "payload", "ref"}`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::FeedError;

pub const PHX_JOIN: &str = "phx_join";
pub const PHX_REPLY: &str = "phx_reply";
pub const PHX_ERROR: &str = "phx_error";
pub const PHX_CLOSE: &str = "phx_close";
pub const HEARTBEAT: &str = "heartbeat";
pub const PHOENIX_TOPIC: &str = "phoenix";

pub const SERIALIZER_VSN: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl Frame {
    pub fn join(topic: &str, params: Value, reference: String) -> Self {
        Frame {
            topic: topic.to_string(),
            event: PHX_JOIN.to_string(),
            payload: params,
            reference: Some(reference),
        }
    }

    pub fn heartbeat(reference: String) -> Self {
        Frame {
            topic: PHOENIX_TOPIC.to_string(),
            event: HEARTBEAT.to_string(),
            payload: json!({}),
            reference: Some(reference),
        }
    }

    pub fn decode(text: &str) -> Result<Self, FeedError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, FeedError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Payload of a `phx_reply` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reply {
    pub status: String,
    #[serde(default)]
    pub response: Value,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Turns a socket endpoint such as `ws://host/socket` into the websocket
/// transport URL the server listens on.
pub fn transport_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    let base = if endpoint.ends_with("/websocket") {
        endpoint.to_string()
    } else {
        format!("{}/websocket", endpoint)
    };
    format!("{}?vsn={}", base, SERIALIZER_VSN)
}
