//! `POST /mcp/rpc` plus the `GET /mcp/tools` convenience listing.
//! `GET /mcp/health` is mounted separately in `lib.rs`, outside auth and
//! CORS.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
};
use context::{ClientIdentity, ToolInvocationContext};
use http::StatusCode;
use protocol::McpServer;
use serde_json::{Value, json};
use tower::ServiceBuilder;
use uuid::Uuid;

use crate::{auth::AuthLayer, cors};

#[derive(Clone)]
struct AppState {
    mcp: Arc<McpServer>,
}

/// Builds the `http` transport's router: `POST /mcp/rpc` behind auth and
/// (optionally) CORS, plus the unauthenticated `GET /mcp/tools` convenience
/// listing. `/mcp/health` is added by the caller in `lib.rs`.
///
/// `/mcp/tools` is merged in as its own unlayered `Router` rather than
/// routed alongside `/mcp/rpc` under the same `.layer(...)` stack — merging
/// keeps each side's own layers, the same trick `mount_health` uses to keep
/// `/mcp/health` outside auth/CORS. `AuthLayer` applies to every request a
/// layered router receives regardless of path, so routing `/mcp/tools`
/// through the auth-layered router would 401 it whenever auth is enabled.
pub fn router(mcp: Arc<McpServer>, server_config: &config::ServerConfig) -> Router {
    let state = AppState { mcp };

    let mut rpc = Router::new()
        .route("/mcp/rpc", post(handle_rpc))
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(server_config.body_limit_bytes as usize))
        .layer(ServiceBuilder::new().layer(AuthLayer::new(server_config.auth.clone())));

    if let Some(cors_config) = &server_config.cors {
        rpc = rpc.layer(cors::CorsLayer::new(cors_config.clone()));
    }

    let tools = Router::new().route("/mcp/tools", get(list_tools)).with_state(state);

    rpc.merge(tools)
}

async fn handle_rpc(
    State(state): State<AppState>,
    identity: axum::extract::Extension<ClientIdentity>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let ctx = ToolInvocationContext::new(Uuid::new_v4().to_string()).with_client(Some(identity.0));

    match state.mcp.handle(&body, ctx).await {
        Some(response) => (StatusCode::OK, Json(response)),
        None => (StatusCode::OK, Json(Value::Null)),
    }
}

async fn list_tools(State(state): State<AppState>) -> Json<Value> {
    let raw = json!({ "jsonrpc": "2.0", "id": 0, "method": "tools/list" });
    let ctx = ToolInvocationContext::new(Uuid::new_v4().to_string());
    let response = state.mcp.handle(&raw, ctx).await.unwrap_or(Value::Null);
    Json(response.get("result").cloned().unwrap_or(Value::Null))
}
