//! Shared harness for end-to-end scenarios spanning the whole server.
//! Each test file builds its own tool set and wires it through the real
//! `registry`/`response`/`protocol` stack rather than asserting against a
//! single crate in isolation.

use std::sync::Arc;

use context::ToolInvocationContext;
use middleware::MiddlewareChain;
use protocol::{McpServer, PromptRegistry, ServerInfo};
use registry::{Dispatcher, Tool, ToolRegistry};
use resources::{MemoryResourceStore, ResourceStore};
use serde_json::Value;

/// Builds an in-process [`McpServer`] around `tools`, all sharing `chain`.
/// Good enough for every scenario that doesn't need a real transport.
pub fn build_server(tools: Vec<Arc<dyn Tool>>, chain: MiddlewareChain) -> McpServer {
    let registry = ToolRegistry::new(chain);
    for tool in tools {
        registry.register(tool).expect("tool names must be unique in test fixtures");
    }
    registry.freeze();

    let dispatcher = Arc::new(Dispatcher::new(registry));
    let resources = MemoryResourceStore::new() as Arc<dyn ResourceStore>;
    let prompts = Arc::new(PromptRegistry::new());

    McpServer::new(ServerInfo::new("integration-test-server", "0.1.0"), dispatcher, resources, prompts)
}

/// Sends one JSON-RPC request and unwraps the single-response case (no
/// batching involved). Panics if the call was a pure notification.
pub async fn call(server: &McpServer, request: Value) -> Value {
    server
        .handle(&request, ToolInvocationContext::new("test"))
        .await
        .expect("a non-notification request always produces a response")
}

/// A `tools/call` request body for `name(arguments)` with request id `1`.
pub fn tools_call(name: &str, arguments: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments },
    })
}
