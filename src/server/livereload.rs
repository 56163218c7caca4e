//! Livereload endpoint
//!
//! Pages load `/livereload.js` from the livereload port; the client opens
//! a WebSocket back to `/livereload` and reloads on every `reload` message.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::debug;

/// Messages pushed to connected pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReloadMessage {
    Connected,

    /// Reload the page
    Reload {
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    /// Rebuild failed; the page stays as it is
    Error { message: String },
}

/// Client script served at `/livereload.js`
pub const LIVERELOAD_CLIENT: &str = r#"(function () {
  var script = document.currentScript;
  var origin = script ? new URL(script.src) : window.location;
  var protocol = origin.protocol === 'https:' ? 'wss:' : 'ws:';

  function connect() {
    var ws = new WebSocket(protocol + '//' + origin.host + '/livereload');
    ws.onmessage = function (event) {
      var message = JSON.parse(event.data);
      if (message.type === 'reload') {
        window.location.reload();
      } else if (message.type === 'error') {
        console.error('[jetkit] ' + message.message);
      }
    };
    ws.onclose = function () {
      setTimeout(connect, 1000);
    };
  }

  connect();
})();
"#;

/// Routes for the livereload port
pub fn livereload_router(reload_tx: broadcast::Sender<ReloadMessage>) -> Router {
    Router::new()
        .route("/livereload.js", get(serve_client))
        .route("/livereload", get(livereload_websocket))
        .layer(CorsLayer::permissive())
        .with_state(reload_tx)
}

async fn serve_client() -> Response {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        LIVERELOAD_CLIENT,
    )
        .into_response()
}

async fn livereload_websocket(
    ws: WebSocketUpgrade,
    State(reload_tx): State<broadcast::Sender<ReloadMessage>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, reload_tx.subscribe()))
}

async fn handle_socket(socket: WebSocket, mut reload_rx: broadcast::Receiver<ReloadMessage>) {
    let (mut sender, mut receiver) = socket.split();

    if let Ok(json) = serde_json::to_string(&ReloadMessage::Connected) {
        if sender.send(Message::Text(json)).await.is_err() {
            return;
        }
    }
    debug!("Livereload client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match reload_rx.recv().await {
                Ok(message) => {
                    let Ok(json) = serde_json::to_string(&message) else {
                        continue;
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    debug!("Livereload client disconnected");
}
