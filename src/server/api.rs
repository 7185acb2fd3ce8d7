use anyhow::Result;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use colored::*;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use super::GroceryStore;
use crate::model::{Frame, ItemUpdate, ListEvent, EVENT_WELCOME};

/// How far a slow channel subscriber may fall behind before frames are
/// dropped for it.
const EVENT_BUFFER: usize = 256;

#[derive(Clone)]
pub struct AppState {
    store: GroceryStore,
    events: broadcast::Sender<String>,
}

impl AppState {
    pub fn new(store: GroceryStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self { store, events }
    }

    /// Fan one event out to every connected channel subscriber.
    fn publish(&self, event: &ListEvent) {
        match serde_json::to_string(&event.to_frame()) {
            // Send only fails when nobody is subscribed, which is fine.
            Ok(frame) => {
                let _ = self.events.send(frame);
            }
            Err(err) => error!("failed to encode event frame: {err}"),
        }
    }
}

pub fn router(store: GroceryStore) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/groceries", get(list_groceries).post(create_grocery))
        .route("/groceries/{id}", put(update_grocery).delete(delete_grocery))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(store))
}

pub async fn serve(port: u16, store: GroceryStore) -> Result<()> {
    let app = router(store);

    let addr = format!("0.0.0.0:{}", port);
    println!(
        "{} Groceries server running at {}",
        "✓".green(),
        format!("http://{}", addr).bright_blue()
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_groceries(State(state): State<AppState>) -> Response {
    match state.store.list() {
        Ok(items) => Json(items).into_response(),
        Err(err) => storage_error(err),
    }
}

#[derive(Deserialize)]
struct CreateBody {
    name: Option<String>,
    quantity: Option<u32>,
}

async fn create_grocery(State(state): State<AppState>, Json(body): Json<CreateBody>) -> Response {
    let name = body.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "name required");
    }

    // Zero and absent both fall back to a quantity of one.
    let quantity = match body.quantity {
        Some(quantity) if quantity > 0 => quantity,
        _ => 1,
    };

    match state.store.insert(name, quantity) {
        Ok(item) => {
            state.publish(&ListEvent::Created(item.clone()));
            (StatusCode::CREATED, Json(item)).into_response()
        }
        Err(err) => storage_error(err),
    }
}

async fn update_grocery(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<ItemUpdate>,
) -> Response {
    if update.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "no fields to update");
    }

    match state.store.update(id, &update) {
        Ok(Some(item)) => {
            state.publish(&ListEvent::Updated(item.clone()));
            Json(item).into_response()
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not found"),
        Err(err) => storage_error(err),
    }
}

async fn delete_grocery(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.store.delete(id) {
        Ok(true) => {
            state.publish(&ListEvent::Deleted { id });
            Json(json!({ "id": id })).into_response()
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, "not found"),
        Err(err) => storage_error(err),
    }
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(state, socket))
}

async fn handle_ws(state: AppState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();

    // Greet before any broadcast frames.
    let welcome = Frame::new(EVENT_WELCOME, json!({ "message": "welcome" }));
    if let Ok(text) = serde_json::to_string(&welcome) {
        let _ = sender.send(Message::Text(text.into())).await;
    }

    let mut rx = state.events.subscribe();
    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(frame) => {
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "channel subscriber lagged, frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // The channel is server-push only; inbound frames are logged and dropped.
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Text(text)) => debug!(frame = %text, "ignoring inbound frame"),
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn storage_error(err: anyhow::Error) -> Response {
    error!("storage failure: {err:#}");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
}

/// Same-origin browser client for the list, speaking the identical
/// snapshot-plus-events contract over relative URLs.
const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>HomeHub - Groceries</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 480px; margin: 2rem auto; }
    ul { padding-left: 1.2rem; }
    li { margin: 0.25rem 0; }
    li.checked { text-decoration: line-through; color: #888; }
    button { padding: 0.4rem 1rem; }
  </style>
</head>
<body>
  <h2>Groceries</h2>
  <ul id="list"></ul>
  <button id="add">Add</button>
  <script>
    let items = [];
    const list = document.getElementById('list');

    function label(item) {
      return item.quantity > 1 ? `${item.name} (x${item.quantity})` : item.name;
    }

    function render() {
      list.innerHTML = '';
      for (const item of items) {
        const li = document.createElement('li');
        li.textContent = label(item);
        if (item.checked) li.classList.add('checked');
        list.appendChild(li);
      }
    }

    fetch('/groceries')
      .then((res) => res.json())
      .then((data) => { items = data; render(); })
      .catch(console.error);

    const proto = location.protocol === 'https:' ? 'wss://' : 'ws://';
    const socket = new WebSocket(proto + location.host + '/ws');
    socket.onmessage = (msg) => {
      const frame = JSON.parse(msg.data);
      if (frame.event === 'groceries:created') {
        const at = items.findIndex((it) => it.id === frame.data.id);
        if (at >= 0) items[at] = frame.data;
        else items = [frame.data, ...items];
      } else if (frame.event === 'groceries:updated') {
        items = items.map((it) => (it.id === frame.data.id ? frame.data : it));
      } else if (frame.event === 'groceries:deleted') {
        items = items.filter((it) => it.id !== frame.data.id);
      } else {
        return;
      }
      render();
    };

    document.getElementById('add').onclick = () => {
      const name = prompt('Item name');
      if (!name) return;
      fetch('/groceries', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ name }),
      }).catch(console.error);
    };
  </script>
</body>
</html>
"#;
