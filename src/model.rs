use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: String,
    pub public: bool,
}

impl Bookmark {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Bookmark {
            title: title.into(),
            url: url.into(),
            description: String::new(),
            tags: String::new(),
            public: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedEventKind {
    Created,
    Updated,
    Deleted,
}

impl FeedEventKind {
    pub const ALL: [FeedEventKind; 3] = [
        FeedEventKind::Created,
        FeedEventKind::Updated,
        FeedEventKind::Deleted,
    ];

    pub fn event_name(&self) -> &'static str {
        match self {
            FeedEventKind::Created => "bookmark:created",
            FeedEventKind::Updated => "bookmark:updated",
            FeedEventKind::Deleted => "bookmark:deleted",
        }
    }

    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "bookmark:created" => Some(FeedEventKind::Created),
            "bookmark:updated" => Some(FeedEventKind::Updated),
            "bookmark:deleted" => Some(FeedEventKind::Deleted),
            _ => None,
        }
    }
}

/// A lifecycle event as delivered on the feed. The payload is whatever the
/// server pushed, untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub kind: FeedEventKind,
    pub payload: Value,
}

/// Pushed as `bookmark:chat` on bookmark and tag topics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatMessage {
    pub bookmark_title: String,
    pub user_email: String,
    pub content: String,
    pub timestamp: String,
}

pub const CHAT_EVENT: &str = "bookmark:chat";
