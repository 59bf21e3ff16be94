//! With type-verification configured in `strict` mode, a tool call whose
//! code references an unverified identifier is blocked with
//! `TYPE_VERIFICATION_FAILED` and at least one recovery step.

use std::sync::Arc;

use async_trait::async_trait;
use context::ToolInvocationContext;
use integration_tests::{build_server, call, tools_call};
use middleware::{GateMode, MiddlewareChain, TypeVerificationMiddleware};
use registry::{ParamField, Tool};
use response::{Action, BuildContext, ErrorInfo, ResponseBuilder, ToolResult, codes};
use serde_json::{Value, json};
use verify_cache::{CacheConfig, VerificationCache};

struct RunSnippet;

#[async_trait]
impl Tool for RunSnippet {
    fn name(&self) -> &str {
        "run_snippet"
    }

    fn description(&self) -> &str {
        "runs a code snippet after type verification"
    }

    fn parameters(&self) -> Vec<ParamField> {
        vec![ParamField::string("code").required(), ParamField::string("file_path")]
    }

    async fn call(&self, params: Value, _ctx: ToolInvocationContext) -> Result<ToolResult<Value>, ErrorInfo> {
        let code = params["code"].as_str().unwrap_or_default();
        Ok(RunSnippetBuilder.build(json!({ "ran": code }), BuildContext::new()).await)
    }
}

struct RunSnippetBuilder;

#[async_trait]
impl ResponseBuilder<Value> for RunSnippetBuilder {
    fn insights(&self, _data: &Value, _ctx: &BuildContext) -> Vec<String> {
        Vec::new()
    }

    fn actions(&self, _data: &Value, _ctx: &BuildContext) -> Vec<Action> {
        Vec::new()
    }
}

#[tokio::test]
async fn unverified_identifier_is_blocked_in_strict_mode() {
    let cache = VerificationCache::new(CacheConfig::default());
    let chain = MiddlewareChain::new(vec![Arc::new(TypeVerificationMiddleware::new(GateMode::Strict, cache))]);

    let server = build_server(vec![Arc::new(RunSnippet)], chain);

    let request = tools_call("run_snippet", json!({ "code": "new DoesNotExist();", "file_path": "main.cs" }));
    let response = call(&server, request).await;
    let result = &response["result"];

    assert_eq!(result["success"], json!(false));
    assert_eq!(result["error"]["code"], json!(codes::TYPE_VERIFICATION_FAILED));
    let recovery = result["error"]["recovery"]["steps"].as_array().expect("a recovery hint must be attached");
    assert!(!recovery.is_empty());
}

#[tokio::test]
async fn verified_identifier_is_allowed_through() {
    let cache = VerificationCache::new(CacheConfig::default());
    cache.mark_verified("Widget", verify_cache::VerifyInput { method: "scan".into(), ..Default::default() });
    let chain = MiddlewareChain::new(vec![Arc::new(TypeVerificationMiddleware::new(GateMode::Strict, cache))]);

    let server = build_server(vec![Arc::new(RunSnippet)], chain);

    let request = tools_call("run_snippet", json!({ "code": "new Widget();", "file_path": "main.cs" }));
    let response = call(&server, request).await;

    assert_eq!(response["result"]["success"], json!(true));
    assert_eq!(response["result"]["data"]["ran"], json!("new Widget();"));
}
