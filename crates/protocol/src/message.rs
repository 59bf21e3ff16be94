//! Request/response/notification framing and batching.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_codes;

/// A JSON-RPC id: a number, a string, or `null` (used only on error
/// responses whose request could not be parsed far enough to recover one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Number(i64),
    String(String),
    Null,
}

impl Default for Id {
    fn default() -> Self {
        Id::Null
    }
}

/// A decoded incoming message: a request (has an `id`) or a notification
/// (does not). Both share the same wire shape, so one struct models both.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Id>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl IncomingMessage {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// `{ code, message, data? }` — `data` carries a framework `ErrorInfo` when
/// the failure originated below the protocol layer.
#[derive(Debug, Clone, Serialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(error_codes::METHOD_NOT_FOUND, format!("unknown method '{method}'"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }
}

/// A framed JSON-RPC response: exactly one of `result`/`error` is present.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingResponse {
    pub jsonrpc: &'static str,
    pub id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl OutgoingResponse {
    pub fn ok(id: Id, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    pub fn err(id: Id, error: RpcErrorObject) -> Self {
        Self { jsonrpc: "2.0", id, result: None, error: Some(error) }
    }
}

/// Parses a raw JSON-RPC payload (object or batch array) into individual
/// messages, each paired with the raw value it was parsed from so a caller
/// can recover the `id` even when parsing the method/params fails.
pub fn parse_batch(raw: &Value) -> Vec<Result<IncomingMessage, (Option<Id>, String)>> {
    match raw {
        Value::Array(items) => items.iter().map(parse_one).collect(),
        other => vec![parse_one(other)],
    }
}

fn parse_one(value: &Value) -> Result<IncomingMessage, (Option<Id>, String)> {
    let id = value.get("id").and_then(|v| serde_json::from_value::<Id>(v.clone()).ok());

    if !value.is_object() {
        return Err((id, "request must be a JSON object".to_string()));
    }

    if value.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err((id, "missing or invalid 'jsonrpc' version".to_string()));
    }

    if value.get("method").and_then(Value::as_str).is_none() {
        return Err((id, "missing 'method'".to_string()));
    }

    serde_json::from_value::<IncomingMessage>(value.clone()).map_err(|err| (id, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_request_parses() {
        let raw = serde_json::json!({"jsonrpc":"2.0","id":1,"method":"tools/list"});
        let parsed = parse_batch(&raw);
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].is_ok());
        assert!(!parsed[0].as_ref().unwrap().is_notification());
    }

    #[test]
    fn notification_has_no_id() {
        let raw = serde_json::json!({"jsonrpc":"2.0","method":"notifications/cancelled","params":{"id":1}});
        let parsed = parse_batch(&raw);
        assert!(parsed[0].as_ref().unwrap().is_notification());
    }

    #[test]
    fn batch_preserves_length_and_order() {
        let raw = serde_json::json!([
            {"jsonrpc":"2.0","id":1,"method":"tools/list"},
            {"jsonrpc":"2.0","id":2,"method":"tools/list"},
        ]);
        let parsed = parse_batch(&raw);
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn missing_jsonrpc_version_is_an_error() {
        let raw = serde_json::json!({"id":1,"method":"tools/list"});
        let parsed = parse_batch(&raw);
        assert!(parsed[0].is_err());
    }
}
