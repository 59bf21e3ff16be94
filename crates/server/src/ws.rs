//! `GET /mcp/ws` upgrade. Each connection gets its own
//! `ByteRateLimiter`; frames arriving faster than the configured
//! bytes/second budget close the socket with `1008` policy-violation.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket},
    },
    routing::get,
};
use context::{ClientIdentity, ToolInvocationContext};
use protocol::McpServer;
use tower::ServiceBuilder;
use uuid::Uuid;

use crate::{auth::AuthLayer, rate_limit::ByteRateLimiter};

const POLICY_VIOLATION: u16 = 1008;

#[derive(Clone)]
struct AppState {
    mcp: Arc<McpServer>,
    bytes_per_second: u64,
}

pub fn router(mcp: Arc<McpServer>, server_config: &config::ServerConfig) -> Router {
    let state = AppState { mcp, bytes_per_second: server_config.websocket.bytes_per_second };

    Router::new()
        .route("/mcp/ws", get(upgrade))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(AuthLayer::new(server_config.auth.clone())))
}

async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    identity: axum::extract::Extension<ClientIdentity>,
) -> axum::response::Response {
    let identity = identity.0;
    ws.on_upgrade(move |socket| handle_connection(socket, state, identity))
}

async fn handle_connection(mut socket: WebSocket, state: AppState, identity: ClientIdentity) {
    let limiter = ByteRateLimiter::new(state.bytes_per_second);

    while let Some(Ok(message)) = socket.recv().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => continue,
        };

        if !limiter.admit(text.len()) {
            log::warn!("websocket connection exceeded its byte-rate budget, closing");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: POLICY_VIOLATION,
                    reason: "rate limit exceeded".into(),
                })))
                .await;
            break;
        }

        let raw: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(err) => {
                log::debug!("ignoring malformed websocket frame: {err}");
                continue;
            }
        };

        let ctx = ToolInvocationContext::new(Uuid::new_v4().to_string()).with_client(Some(identity.clone()));

        if let Some(response) = state.mcp.handle(&raw, ctx).await
            && let Ok(text) = serde_json::to_string(&response)
            && socket.send(Message::Text(text.into())).await.is_err()
        {
            break;
        }
    }
}
