//! Reload notifications over WebSocket.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::header,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;

use super::routes::AppState;

pub const SOCKET_PATH: &str = "/__livereload";
pub const CLIENT_SCRIPT_PATH: &str = "/__livereload.js";

const CLIENT_SCRIPT: &str = r#"(function () {
  var scheme = location.protocol === "https:" ? "wss://" : "ws://";
  function connect(delay) {
    var socket = new WebSocket(scheme + location.host + "/__livereload");
    socket.onmessage = function (msg) {
      try {
        if (JSON.parse(msg.data).type === "reload") { location.reload(); }
      } catch (e) {}
    };
    socket.onclose = function () {
      setTimeout(function () { connect(Math.min(delay * 2, 5000)); }, delay);
    };
  }
  connect(500);
})();
"#;

/// Message sent to browsers.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
}

/// Fan-out of reload signals to every connected browser.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadEvent>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Tell connected clients to reload. Returns how many were notified.
    pub fn reload(&self) -> usize {
        let event = ReloadEvent {
            kind: "reload".to_string(),
            timestamp: Utc::now(),
        };
        // no receivers is fine
        let notified = self.tx.send(event).unwrap_or(0);
        tracing::debug!("Reload sent to {} clients", notified);
        notified
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        CLIENT_SCRIPT,
    )
}

pub async fn livereload_ws(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rx = state.reload.subscribe();
    ws.on_upgrade(move |socket| handle_reload_stream(socket, rx))
}

async fn handle_reload_stream(socket: WebSocket, mut rx: broadcast::Receiver<ReloadEvent>) {
    tracing::debug!("Live-reload client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(j) => j,
                        Err(_) => continue,
                    };
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("Live-reload client lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tokio::select! {
        _ = &mut recv_task => {
            send_task.abort();
        }
        _ = &mut send_task => {
            recv_task.abort();
        }
    }

    tracing::debug!("Live-reload client disconnected");
}
