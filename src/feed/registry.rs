use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Event name to handlers, kept in registration order.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, event: impl Into<String>, handler: Handler) {
        self.handlers.entry(event.into()).or_default().push(handler);
    }

    pub fn handlers_for(&self, event: &str) -> Vec<Handler> {
        self.handlers.get(event).cloned().unwrap_or_default()
    }

    pub fn is_registered(&self, event: &str) -> bool {
        self.handlers.get(event).is_some_and(|h| !h.is_empty())
    }

    /// Runs every handler bound to `event` and returns how many ran.
    pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let handlers = self.handlers_for(event);
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut counts: Vec<_> = self
            .handlers
            .iter()
            .map(|(event, handlers)| (event.as_str(), handlers.len()))
            .collect();
        counts.sort();
        f.debug_struct("HandlerRegistry").field("handlers", &counts).finish()
    }
}
