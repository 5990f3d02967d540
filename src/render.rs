use serde_json::Value;

use crate::model::{ChatMessage, FeedEvent, FeedEventKind};

pub fn render_event(event: &FeedEvent) -> String {
    match event.kind {
        FeedEventKind::Created => format!(
            "\n=== New Bookmark ===\nTitle: {}\nURL: {}\nTags: {}",
            field(&event.payload, "title"),
            field(&event.payload, "url"),
            tags(&event.payload),
        ),
        FeedEventKind::Updated => format!("\n=== Bookmark Updated ===\n{}", pretty(&event.payload)),
        FeedEventKind::Deleted => format!("\n=== Bookmark Deleted ===\n{}", pretty(&event.payload)),
    }
}

pub fn render_chat(msg: &ChatMessage) -> String {
    format!(
        "\n=== Chat Message ===\nBookmark: {}\nUser: {}\nMessage: {}\nTime: {}",
        msg.bookmark_title, msg.user_email, msg.content, msg.timestamp
    )
}

fn field(payload: &Value, name: &str) -> String {
    match payload.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

// Tag feeds send a list, the bookmark feed sends the raw string.
fn tags(payload: &Value) -> String {
    match payload.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => field(payload, "tags"),
    }
}

fn pretty(payload: &Value) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
}
