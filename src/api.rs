use crate::model::Bookmark;
use serde::Serialize;
use serde_json::Value;

const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Debug, Serialize)]
pub struct CreateBookmarkRequest<'a> {
    pub bookmark: &'a Bookmark,
}

impl<'a> CreateBookmarkRequest<'a> {
    pub fn new(bookmark: &'a Bookmark) -> Self {
        CreateBookmarkRequest { bookmark }
    }
}

/// Picks the failure detail out of an error response body: `errors`, then
/// `error`, then a fixed fallback. Missing and falsy fields are skipped.
pub fn error_detail(body: &Value) -> String {
    let found = ["errors", "error"]
        .iter()
        .filter_map(|field| body.get(field))
        .find(|value| is_truthy(value));

    match found {
        Some(Value::String(s)) => s.clone(),
        Some(value) => value.to_string(),
        None => UNKNOWN_ERROR.to_owned(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}
