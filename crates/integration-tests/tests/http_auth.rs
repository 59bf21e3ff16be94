//! The HTTP transport with `apiKey` authentication rejects `POST
//! /mcp/rpc` without the header and serves `tools/list` once it is
//! presented.

use std::sync::Arc;

use async_trait::async_trait;
use config::{AuthMode, Config};
use context::ToolInvocationContext;
use middleware::MiddlewareChain;
use registry::{Dispatcher, ParamField, Tool, ToolRegistry};
use resources::{MemoryResourceStore, ResourceStore};
use response::{Action, BuildContext, ErrorInfo, ResponseBuilder, ToolResult};
use secrecy::SecretString;
use serde_json::{Value, json};
use server::{ServeConfig, serve};
use tokio_util::sync::CancellationToken;

struct Echo;

#[async_trait]
impl Tool for Echo {
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
        let text = params["text"].as_str().unwrap_or_default();
        Ok(EchoBuilder.build(json!({ "text": text }), BuildContext::new()).await)
    }
}

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

#[tokio::test]
async fn api_key_protected_http_transport() {
    let registry = ToolRegistry::new(MiddlewareChain::default());
    registry.register(Arc::new(Echo)).unwrap();
    registry.freeze();

    let dispatcher = Arc::new(Dispatcher::new(registry));
    let resources = MemoryResourceStore::new() as Arc<dyn ResourceStore>;
    let prompts = Arc::new(protocol::PromptRegistry::new());
    let mcp = Arc::new(protocol::McpServer::new(
        protocol::ServerInfo::new("integration-test-server", "0.1.0"),
        dispatcher,
        resources,
        prompts,
    ));

    let mut config = Config::default();
    config.server.transport = config::TransportKind::Http;
    config.server.listen_address = Some("127.0.0.1:0".parse().unwrap());
    config.server.auth = AuthMode::ApiKey { header: "X-API-Key".to_string(), key: SecretString::from("secret".to_string()) };

    let shutdown_signal = CancellationToken::new();
    let (addr_tx, addr_rx) = tokio::sync::oneshot::channel();

    let server_shutdown = shutdown_signal.clone();
    let server_task = tokio::spawn(async move {
        serve(ServeConfig { mcp, config, shutdown_signal: server_shutdown, bound_addr_sender: Some(addr_tx) }).await
    });

    let addr = addr_rx.await.expect("the server must report its bound address");
    let base_url = format!("http://{addr}");
    let client = reqwest::Client::new();

    let body = json!({"jsonrpc":"2.0","id":1,"method":"tools/list"});

    let unauthenticated = client.post(format!("{base_url}/mcp/rpc")).json(&body).send().await.unwrap();
    assert_eq!(unauthenticated.status(), reqwest::StatusCode::UNAUTHORIZED);

    let authenticated =
        client.post(format!("{base_url}/mcp/rpc")).header("X-API-Key", "secret").json(&body).send().await.unwrap();
    assert_eq!(authenticated.status(), reqwest::StatusCode::OK);

    let parsed: Value = authenticated.json().await.unwrap();
    let tools = parsed["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], json!("echo"));

    let unauthenticated_tools_listing = client.get(format!("{base_url}/mcp/tools")).send().await.unwrap();
    assert_eq!(
        unauthenticated_tools_listing.status(),
        reqwest::StatusCode::OK,
        "GET /mcp/tools must stay unauthenticated even when auth is configured for /mcp/rpc"
    );
    let tools_listing: Value = unauthenticated_tools_listing.json().await.unwrap();
    let tools_listing = tools_listing["tools"].as_array().unwrap();
    assert_eq!(tools_listing.len(), 1);
    assert_eq!(tools_listing[0]["name"], json!("echo"));

    shutdown_signal.cancel();
    let _ = server_task.await;
}
