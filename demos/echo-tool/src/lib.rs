//! A minimal reference tool: `echo(text: string, required)` returns its
//! input verbatim, shaped through the standard `response::ResponseBuilder`
//! contract rather than hand-built JSON.

use async_trait::async_trait;
use context::{ResponseModeHint, ToolInvocationContext};
use registry::{ParamField, Tool};
use response::{Action, BuildContext, ErrorInfo, ResponseBuilder, ResponseMode, ToolResult, codes};
use serde_json::Value;

/// `echo`: returns `{ "text": <the input> }`.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes the given text back unchanged."
    }

    fn parameters(&self) -> Vec<ParamField> {
        vec![ParamField::string("text").required().describe("the text to echo back")]
    }

    async fn call(&self, params: Value, ctx: ToolInvocationContext) -> Result<ToolResult<Value>, ErrorInfo> {
        // The dispatcher already validated `text` is present and is a
        // string before calling us; this get_or `VALIDATION_ERROR` exists
        // only for direct (non-dispatcher) callers such as unit tests.
        let Some(text) = params.get("text").and_then(Value::as_str) else {
            return Err(ErrorInfo::new(codes::VALIDATION_ERROR, "parameter 'text' is required"));
        };

        let data = serde_json::json!({ "text": text });
        Ok(EchoResponseBuilder.build(data, build_context(&ctx)).await)
    }
}

struct EchoResponseBuilder;

#[async_trait]
impl ResponseBuilder<Value> for EchoResponseBuilder {
    fn insights(&self, data: &Value, _ctx: &BuildContext) -> Vec<String> {
        let length = data.get("text").and_then(Value::as_str).map(str::len).unwrap_or(0);
        vec![format!("echoed {length} characters")]
    }

    fn actions(&self, _data: &Value, _ctx: &BuildContext) -> Vec<Action> {
        vec![Action { name: "echo".to_string(), parameters: serde_json::json!({}), priority: 0 }]
    }
}

fn build_context(ctx: &ToolInvocationContext) -> BuildContext {
    let mut build_ctx = BuildContext::new();
    build_ctx.response_mode = match ctx.response_mode {
        ResponseModeHint::Summary => ResponseMode::Summary,
        ResponseModeHint::Full => ResponseMode::Full,
    };
    build_ctx.token_limit_override = ctx.token_limit_override;
    build_ctx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_the_given_text() {
        let result = EchoTool.call(serde_json::json!({ "text": "hi" }), ToolInvocationContext::new("1")).await.unwrap();

        assert!(result.success);
        assert_eq!(result.data["text"], "hi");
        assert!(result.meta.token_info.estimated <= result.meta.token_info.limit);
    }

    #[tokio::test]
    async fn missing_text_is_a_validation_error_even_without_the_dispatcher() {
        let error = EchoTool.call(serde_json::json!({}), ToolInvocationContext::new("2")).await.unwrap_err();

        assert_eq!(error.code, codes::VALIDATION_ERROR);
        assert!(error.message.contains("text"));
    }
}
