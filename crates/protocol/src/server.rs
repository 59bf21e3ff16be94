//! `McpServer`: routes decoded JSON-RPC requests to the `registry::Dispatcher`,
//! a `resources::ResourceStore`, and a `PromptRegistry`, and re-frames their
//! results as `OutgoingResponse`s. The three transports in the `server`
//! crate each hand this one object a raw JSON value (single request or
//! batch) and write back whatever it returns.

use std::sync::Arc;

use context::ToolInvocationContext;
use registry::Dispatcher;
use resources::ResourceStore;
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    DEFAULT_PAGE_SIZE, PromptRegistry,
    message::{self, Id, IncomingMessage, OutgoingResponse, RpcErrorObject},
    methods,
};

/// Identifies this server in the `initialize` handshake.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into() }
    }
}

/// Ties the wire format to the framework's working parts. Transport-agnostic:
/// a pipe, HTTP, or WebSocket handler each call [`McpServer::handle`] with a
/// decoded JSON value and write the returned value back out.
pub struct McpServer {
    info: ServerInfo,
    dispatcher: Arc<Dispatcher>,
    resources: Arc<dyn ResourceStore>,
    prompts: Arc<PromptRegistry>,
    /// Pre-rendered capability summary, if the caller built
    /// one with the `templating` crate. Rendering happens once at startup,
    /// not on every `initialize` call — `McpServer` just carries the text.
    instructions: Option<String>,
}

impl McpServer {
    pub fn new(
        info: ServerInfo,
        dispatcher: Arc<Dispatcher>,
        resources: Arc<dyn ResourceStore>,
        prompts: Arc<PromptRegistry>,
    ) -> Self {
        Self { info, dispatcher, resources, prompts, instructions: None }
    }

    /// Attaches a rendered instruction-templating summary, returned from
    /// `initialize` alongside `serverInfo`/`capabilities`.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Handles one raw JSON-RPC payload, which may be a single object or a
    /// batch array. Returns `None` when the payload contained
    /// only notifications, since those get no response at all.
    pub async fn handle(&self, raw: &Value, ctx: ToolInvocationContext) -> Option<Value> {
        let is_batch = raw.is_array();
        let parsed = message::parse_batch(raw);

        let mut responses = Vec::with_capacity(parsed.len());
        for outcome in parsed {
            if let Some(response) = self.handle_one(outcome, &ctx).await {
                responses.push(response);
            }
        }

        if responses.is_empty() {
            return None;
        }

        Some(if is_batch {
            json!(responses)
        } else {
            serde_json::to_value(responses.into_iter().next().unwrap()).unwrap_or(Value::Null)
        })
    }

    async fn handle_one(
        &self,
        outcome: Result<IncomingMessage, (Option<Id>, String)>,
        ctx: &ToolInvocationContext,
    ) -> Option<OutgoingResponse> {
        let message = match outcome {
            Ok(message) => message,
            Err((id, reason)) => return Some(OutgoingResponse::err(id.unwrap_or_default(), RpcErrorObject::invalid_request(reason))),
        };

        let notification = message.is_notification();
        let id = message.id.clone().unwrap_or_default();
        let result = self.route(&message, ctx).await;

        if notification {
            if let Err(err) = &result {
                log::warn!("notification '{}' failed: {}", message.method, err.message);
            }
            return None;
        }

        Some(match result {
            Ok(value) => OutgoingResponse::ok(id, value),
            Err(err) => OutgoingResponse::err(id, err),
        })
    }

    async fn route(&self, message: &IncomingMessage, ctx: &ToolInvocationContext) -> Result<Value, RpcErrorObject> {
        match message.method.as_str() {
            methods::INITIALIZE => Ok(self.initialize()),
            methods::TOOLS_LIST => Ok(self.tools_list(message.params.as_ref())),
            methods::TOOLS_CALL => self.tools_call(message.params.as_ref(), ctx).await,
            methods::RESOURCES_LIST => Ok(self.resources_list().await),
            methods::RESOURCES_READ => self.resources_read(message.params.as_ref()).await,
            methods::PROMPTS_LIST => Ok(self.prompts_list()),
            methods::PROMPTS_GET => self.prompts_get(message.params.as_ref()),
            methods::NOTIFICATIONS_CANCELLED => {
                self.notifications_cancelled(message.params.as_ref(), ctx);
                Ok(Value::Null)
            }
            other => Err(RpcErrorObject::method_not_found(other)),
        }
    }

    fn initialize(&self) -> Value {
        let mut response = json!({
            "serverInfo": { "name": self.info.name, "version": self.info.version },
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": {},
                "prompts": { "listChanged": false },
            },
        });

        if let Some(instructions) = &self.instructions {
            response["instructions"] = json!(instructions);
        }

        response
    }

    fn tools_list(&self, params: Option<&Value>) -> Value {
        let descriptors = self.dispatcher.registry().descriptors();
        let (page, next_cursor) = paginate(&descriptors, cursor_offset(params));

        let tools: Vec<Value> = page
            .iter()
            .map(|d| {
                json!({
                    "name": d.name,
                    "description": d.description,
                    "inputSchema": d.input_schema(),
                })
            })
            .collect();

        match next_cursor {
            Some(cursor) => json!({ "tools": tools, "nextCursor": cursor.to_string() }),
            None => json!({ "tools": tools }),
        }
    }

    async fn tools_call(&self, params: Option<&Value>, ctx: &ToolInvocationContext) -> Result<Value, RpcErrorObject> {
        let params = params.ok_or_else(|| RpcErrorObject::invalid_params("'tools/call' requires params"))?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcErrorObject::invalid_params("'tools/call' requires params.name"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let result = self.dispatcher.dispatch(name, arguments, ctx.clone()).await;
        Ok(serde_json::to_value(result).unwrap_or(Value::Null))
    }

    async fn resources_list(&self) -> Value {
        let resources: Vec<Value> = self
            .resources
            .list()
            .await
            .iter()
            .map(|r| json!({ "uri": r.uri, "mimeType": r.mime_type, "createdAt": r.created_at }))
            .collect();
        json!({ "resources": resources })
    }

    async fn resources_read(&self, params: Option<&Value>) -> Result<Value, RpcErrorObject> {
        let uri = params
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str)
            .ok_or_else(|| RpcErrorObject::invalid_params("'resources/read' requires params.uri"))?;

        let bytes = self
            .resources
            .retrieve(uri)
            .await
            .ok_or_else(|| RpcErrorObject::invalid_params(format!("no resource found at '{uri}'")))?;

        let text = String::from_utf8(bytes.as_ref().clone()).ok();

        Ok(json!({
            "uri": uri,
            "contents": match text {
                Some(text) => json!([{ "uri": uri, "text": text }]),
                None => json!([{ "uri": uri, "blob": base64_encode(&bytes) }]),
            }
        }))
    }

    fn prompts_list(&self) -> Value {
        let prompts: Vec<Value> = self
            .prompts
            .list()
            .iter()
            .map(|p| json!({ "name": p.name, "description": p.description, "arguments": p.arguments }))
            .collect();
        json!({ "prompts": prompts })
    }

    fn prompts_get(&self, params: Option<&Value>) -> Result<Value, RpcErrorObject> {
        let name = params
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| RpcErrorObject::invalid_params("'prompts/get' requires params.name"))?;
        let arguments = params.and_then(|p| p.get("arguments")).cloned().unwrap_or(Value::Null);

        let message = self.prompts.get(name, &arguments).map_err(|err| RpcErrorObject::invalid_params(err.to_string()))?;
        Ok(json!({ "messages": [message] }))
    }

    fn notifications_cancelled(&self, params: Option<&Value>, ctx: &ToolInvocationContext) {
        let reason = params.and_then(|p| p.get("reason")).and_then(Value::as_str).unwrap_or("client requested cancellation");
        log::info!("cancellation requested: {reason}");
        ctx.cancellation.cancel();
    }
}

fn cursor_offset(params: Option<&Value>) -> usize {
    params
        .and_then(|p| p.get("cursor"))
        .and_then(Value::as_str)
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(0)
}

/// Splits `items` into the page starting at `offset`, sized
/// `DEFAULT_PAGE_SIZE`, and the cursor for the next page if one remains.
fn paginate<T: Clone>(items: &[T], offset: usize) -> (Vec<T>, Option<usize>) {
    if offset >= items.len() {
        return (Vec::new(), None);
    }

    let end = (offset + DEFAULT_PAGE_SIZE).min(items.len());
    let page = items[offset..end].to_vec();
    let next = if end < items.len() { Some(end) } else { None };
    (page, next)
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use middleware::MiddlewareChain;
    use registry::{ParamField, ToolRegistry};
    use response::{Action, BuildContext, ErrorInfo, ResponseBuilder, ToolResult};

    use super::*;

    struct Echo;

    struct EchoBuilder;

    #[async_trait]
    impl ResponseBuilder<Value> for EchoBuilder {
        fn insights(&self, _data: &Value, _ctx: &BuildContext) -> Vec<String> {
            Vec::new()
        }
        fn actions(&self, _data: &Value, _ctx: &BuildContext) -> Vec<Action> {
            Vec::new()
        }
    }

    #[async_trait]
    impl registry::Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters(&self) -> Vec<ParamField> {
            vec![ParamField::string("text").required()]
        }
        async fn call(&self, params: Value, _ctx: ToolInvocationContext) -> Result<ToolResult<Value>, ErrorInfo> {
            Ok(EchoBuilder.build(params, BuildContext::new()).await)
        }
    }

    fn server() -> McpServer {
        let registry = ToolRegistry::new(MiddlewareChain::default());
        registry.register(Arc::new(Echo)).unwrap();
        registry.freeze();

        let dispatcher = Arc::new(Dispatcher::new(registry));
        let resources = resources::MemoryResourceStore::new() as Arc<dyn ResourceStore>;
        let prompts = Arc::new(PromptRegistry::new());

        McpServer::new(ServerInfo::new("test-server", "0.1.0"), dispatcher, resources, prompts)
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let server = server();
        let raw = json!({"jsonrpc":"2.0","id":1,"method":"initialize"});
        let response = server.handle(&raw, ToolInvocationContext::new("1")).await.unwrap();
        assert_eq!(response["result"]["serverInfo"]["name"], "test-server");
    }

    #[tokio::test]
    async fn tools_list_includes_registered_tool() {
        let server = server();
        let raw = json!({"jsonrpc":"2.0","id":1,"method":"tools/list"});
        let response = server.handle(&raw, ToolInvocationContext::new("1")).await.unwrap();
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo");
    }

    #[tokio::test]
    async fn tools_call_routes_through_dispatcher() {
        let server = server();
        let raw = json!({"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"echo","arguments":{"text":"hi"}}});
        let response = server.handle(&raw, ToolInvocationContext::new("1")).await.unwrap();
        assert_eq!(response["result"]["data"]["text"], "hi");
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let server = server();
        let raw = json!({"jsonrpc":"2.0","id":1,"method":"nope"});
        let response = server.handle(&raw, ToolInvocationContext::new("1")).await.unwrap();
        assert_eq!(response["error"]["code"], crate::error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let server = server();
        let raw = json!({"jsonrpc":"2.0","method":"notifications/cancelled","params":{}});
        assert!(server.handle(&raw, ToolInvocationContext::new("1")).await.is_none());
    }

    #[tokio::test]
    async fn batch_preserves_array_shape() {
        let server = server();
        let raw = json!([
            {"jsonrpc":"2.0","id":1,"method":"initialize"},
            {"jsonrpc":"2.0","id":2,"method":"tools/list"},
        ]);
        let response = server.handle(&raw, ToolInvocationContext::new("1")).await.unwrap();
        assert!(response.is_array());
        assert_eq!(response.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn resources_read_rejects_unknown_uri() {
        let server = server();
        let raw = json!({"jsonrpc":"2.0","id":1,"method":"resources/read","params":{"uri":"mcp://nope/nope"}});
        let response = server.handle(&raw, ToolInvocationContext::new("1")).await.unwrap();
        assert_eq!(response["error"]["code"], crate::error_codes::INVALID_PARAMS);
    }
}
