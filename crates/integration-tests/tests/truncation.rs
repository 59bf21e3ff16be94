//! A tool returning 10,000 short strings in `summary` mode overflows its
//! budget, gets marked `truncated`, and offloads the full payload to a
//! resource `resources/read` can retrieve.

use std::sync::Arc;

use async_trait::async_trait;
use context::{ResponseModeHint, ToolInvocationContext};
use integration_tests::{call, tools_call};
use middleware::MiddlewareChain;
use registry::{ParamField, Tool};
use resources::ResourceStore;
use response::{Action, BuildContext, ErrorInfo, ResponseBuilder, ResponseMode, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Clone, Serialize, Deserialize)]
struct Items {
    items: Vec<String>,
}

struct BulkList {
    resources: Arc<dyn ResourceStore>,
}

#[async_trait]
impl Tool for BulkList {
    fn name(&self) -> &str {
        "bulk_list"
    }

    fn description(&self) -> &str {
        "returns 10,000 short strings"
    }

    fn parameters(&self) -> Vec<ParamField> {
        Vec::new()
    }

    async fn call(&self, _params: Value, ctx: ToolInvocationContext) -> Result<ToolResult<Value>, ErrorInfo> {
        let items: Vec<String> = (0..10_000).map(|i| format!("item-{i}")).collect();

        let mut build_ctx = BuildContext::new();
        build_ctx.response_mode = match ctx.response_mode {
            ResponseModeHint::Summary => ResponseMode::Summary,
            ResponseModeHint::Full => ResponseMode::Full,
        };
        build_ctx.resource_store = Some(self.resources.clone());

        let result = BulkListBuilder.build(Items { items }, build_ctx).await;

        Ok(ToolResult {
            success: result.success,
            data: serde_json::to_value(&result.data).unwrap_or(Value::Null),
            insights: result.insights,
            actions: result.actions,
            meta: result.meta,
            error: result.error,
        })
    }
}

struct BulkListBuilder;

#[async_trait]
impl ResponseBuilder<Items> for BulkListBuilder {
    fn insights(&self, data: &Items, _ctx: &BuildContext) -> Vec<String> {
        vec![format!("{} items total", data.items.len())]
    }

    fn actions(&self, _data: &Items, _ctx: &BuildContext) -> Vec<Action> {
        Vec::new()
    }

    fn summarize(&self, data: &Items) -> Option<Items> {
        Some(Items { items: data.items.iter().take(100).cloned().collect() })
    }
}

#[tokio::test]
async fn oversized_list_is_truncated_and_offloaded_to_a_resource() {
    let resources = resources::MemoryResourceStore::new() as Arc<dyn ResourceStore>;
    let tool = Arc::new(BulkList { resources: resources.clone() });

    let registry = registry::ToolRegistry::new(MiddlewareChain::default());
    registry.register(tool).unwrap();
    registry.freeze();

    let dispatcher = Arc::new(registry::Dispatcher::new(registry));
    let prompts = Arc::new(protocol::PromptRegistry::new());
    let server = protocol::McpServer::new(
        protocol::ServerInfo::new("integration-test-server", "0.1.0"),
        dispatcher,
        resources,
        prompts,
    );

    let response = call(&server, tools_call("bulk_list", json!({}))).await;
    let result = &response["result"];

    assert_eq!(result["success"], json!(true));
    assert_eq!(result["meta"]["truncated"], json!(true));
    let items = result["data"]["items"].as_array().expect("data.items must still be an array");
    assert!(items.len() < 10_000, "summary-mode budget should drop items from the envelope");

    let resource_uri = result["meta"]["resource_uri"].as_str().expect("an offloaded resource_uri must be present");

    let read_request = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "resources/read",
        "params": { "uri": resource_uri },
    });
    let read_response = call(&server, read_request).await;
    let text = read_response["result"]["contents"][0]["text"].as_str().expect("resource content must be text");
    let full: Items = serde_json::from_str(text).unwrap();
    assert_eq!(full.items.len(), 10_000);
}
