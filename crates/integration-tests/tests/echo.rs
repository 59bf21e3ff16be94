//! The `echo` tool's happy path and its validation failure on a missing
//! required parameter.

use std::sync::Arc;

use async_trait::async_trait;
use context::ToolInvocationContext;
use integration_tests::{build_server, call, tools_call};
use middleware::MiddlewareChain;
use registry::{ParamField, Tool};
use response::{Action, BuildContext, ErrorInfo, ResponseBuilder, ToolResult, codes};
use serde_json::{Value, json};

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

fn server() -> protocol::McpServer {
    build_server(vec![Arc::new(Echo)], MiddlewareChain::default())
}

#[tokio::test]
async fn echo_tool_happy_path() {
    let response = call(&server(), tools_call("echo", json!({ "text": "hi" }))).await;

    let result = &response["result"];
    assert_eq!(result["success"], json!(true));
    assert_eq!(result["data"]["text"], json!("hi"));
    assert!(result["meta"]["execution_ms"].is_u64());
}

#[tokio::test]
async fn missing_required_parameter_is_a_validation_error() {
    let response = call(&server(), tools_call("echo", json!({}))).await;

    let result = &response["result"];
    assert_eq!(result["success"], json!(false));
    assert_eq!(result["error"]["code"], json!(codes::VALIDATION_ERROR));
    assert!(result["error"]["message"].as_str().unwrap().contains("text"));
}
