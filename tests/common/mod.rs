#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const WAIT: Duration = Duration::from_secs(5);

async fn serve(app: Router) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
pub async fn dead_address() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[derive(Debug)]
pub struct RecordedRequest {
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub body: String,
}

#[derive(Clone)]
struct BookmarkApi {
    status: StatusCode,
    body: String,
    delay: Duration,
    requests: mpsc::UnboundedSender<RecordedRequest>,
}

async fn create_bookmark(State(api): State<BookmarkApi>, headers: HeaderMap, body: String) -> Response {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let _ = api.requests.send(RecordedRequest {
        content_type: header_value(header::CONTENT_TYPE),
        accept: header_value(header::ACCEPT),
        body,
    });

    if !api.delay.is_zero() {
        tokio::time::sleep(api.delay).await;
    }
    (api.status, api.body).into_response()
}

/// Serves `POST /api/bookmarks` answering every request with `status` and
/// `body`. Returns the base url and the requests it saw.
pub async fn spawn_bookmark_api(
    status: u16,
    body: &str,
) -> (String, mpsc::UnboundedReceiver<RecordedRequest>) {
    spawn_slow_bookmark_api(status, body, Duration::ZERO).await
}

pub async fn spawn_slow_bookmark_api(
    status: u16,
    body: &str,
    delay: Duration,
) -> (String, mpsc::UnboundedReceiver<RecordedRequest>) {
    let (requests, rx) = mpsc::unbounded_channel();
    let api = BookmarkApi {
        status: StatusCode::from_u16(status).unwrap(),
        body: body.to_string(),
        delay,
        requests,
    };
    let app = Router::new()
        .route("/api/bookmarks", post(create_bookmark))
        .with_state(api);
    let addr = serve(app).await;
    (format!("http://{}", addr), rx)
}

/// A Phoenix channel server that answers joins and then pushes a script of
/// events on the joined topic.
#[derive(Clone)]
pub struct FeedStub {
    join_status: &'static str,
    join_response: Value,
    pushes: Arc<Vec<(String, Value)>>,
    hang_up_after_pushes: bool,
    frames: Option<mpsc::UnboundedSender<Value>>,
}

impl FeedStub {
    pub fn accepting() -> Self {
        FeedStub {
            join_status: "ok",
            join_response: json!({}),
            pushes: Arc::new(Vec::new()),
            hang_up_after_pushes: false,
            frames: None,
        }
    }

    pub fn rejecting(response: Value) -> Self {
        FeedStub {
            join_status: "error",
            join_response: response,
            ..FeedStub::accepting()
        }
    }

    pub fn push(mut self, event: &str, payload: Value) -> Self {
        Arc::make_mut(&mut self.pushes).push((event.to_string(), payload));
        self
    }

    pub fn hang_up_after_pushes(mut self) -> Self {
        self.hang_up_after_pushes = true;
        self
    }

    /// Starts the server. Returns the socket endpoint and every frame the
    /// client sent.
    pub async fn spawn(mut self) -> (String, mpsc::UnboundedReceiver<Value>) {
        let (frames, rx) = mpsc::unbounded_channel();
        self.frames = Some(frames);
        let app = Router::new()
            .route("/socket/websocket", get(socket_upgrade))
            .with_state(self);
        let addr = serve(app).await;
        (format!("ws://{}/socket", addr), rx)
    }
}

async fn socket_upgrade(ws: WebSocketUpgrade, State(stub): State<FeedStub>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, stub))
}

async fn serve_socket(mut socket: WebSocket, stub: FeedStub) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        if let Some(frames) = &stub.frames {
            let _ = frames.send(frame.clone());
        }
        if frame["event"] != "phx_join" {
            continue;
        }

        let reply = json!({
            "topic": frame["topic"],
            "event": "phx_reply",
            "payload": { "status": stub.join_status, "response": stub.join_response },
            "ref": frame["ref"],
        });
        if socket.send(Message::Text(reply.to_string())).await.is_err() {
            return;
        }
        if stub.join_status != "ok" {
            continue;
        }

        for (event, payload) in stub.pushes.iter() {
            let push = json!({
                "topic": frame["topic"],
                "event": event,
                "payload": payload,
                "ref": null,
            });
            if socket.send(Message::Text(push.to_string())).await.is_err() {
                return;
            }
        }
        if stub.hang_up_after_pushes {
            return;
        }
    }
}
