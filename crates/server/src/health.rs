//! `GET /mcp/health`. Never authenticated — mounted outside
//! the auth layer regardless of the configured `AuthMode`.

use axum::{Json, http::StatusCode};
use serde_json::{Value, json};

pub async fn health() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
