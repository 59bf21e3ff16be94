//! Assembles the uniform `ToolResult<T>` envelope: data, insights, suggested
//! actions, and token-budget metadata, trimming and offloading as needed to
//! stay under budget.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use reduce::{ReduceContext, Strategy};
use resources::ResourceStore;
use serde::{Deserialize, Serialize};
use tokenizer::SafetyMode;

/// The fixed taxonomy of error codes. Bare strings, never a
/// Rust enum exposed over the wire — new codes must serialize as plain
/// strings, and this set is deliberately non-exhaustive (a tool or
/// downstream crate may introduce its own).
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const TOOL_NOT_FOUND: &str = "TOOL_NOT_FOUND";
    pub const TYPE_VERIFICATION_FAILED: &str = "TYPE_VERIFICATION_FAILED";
    pub const TDD_VIOLATION: &str = "TDD_VIOLATION";
    pub const PATH_NOT_FOUND: &str = "PATH_NOT_FOUND";
    pub const ACCESS_DENIED: &str = "ACCESS_DENIED";
    pub const IO_ERROR: &str = "IO_ERROR";
    pub const HTTP_ERROR: &str = "HTTP_ERROR";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const CANCELLED: &str = "CANCELLED";
    pub const DEADLINE_EXCEEDED: &str = "DEADLINE_EXCEEDED";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Caller-supplied hint selecting a default token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    #[default]
    Summary,
    Full,
}

const SUMMARY_BUDGET: u64 = 5_000;
const FULL_BUDGET: u64 = 24_000;
/// Fraction of the budget carved out for insights.
const INSIGHTS_BUDGET_FRACTION: f64 = 0.2;

/// Process-wide override for the `[tokens]` `summary_budget`/`full_budget`
/// defaults, set once at startup from `config::TokensConfig`. Falls back to
/// `SUMMARY_BUDGET`/`FULL_BUDGET` when never configured (e.g. in tests that
/// build a `BuildContext` directly).
static DEFAULT_BUDGETS: std::sync::OnceLock<(u64, u64)> = std::sync::OnceLock::new();

/// Sets the `(summary_budget, full_budget)` pair every subsequent
/// `BuildContext` falls back to absent a `token_limit_override`. Intended to
/// be called once at process startup; later calls are ignored.
pub fn configure_default_budgets(summary_budget: u64, full_budget: u64) {
    let _ = DEFAULT_BUDGETS.set((summary_budget, full_budget));
}

/// `[tokens]`'s `safety_mode`/`safety_percent` choice, applied whenever a
/// `BuildContext` leaves `safety_mode` at its `SafetyMode::Default` (i.e. the
/// tool didn't pick one itself).
#[derive(Debug, Clone, Copy)]
pub enum DefaultSafety {
    Mode(SafetyMode),
    Percent { percent: f64, min_buf: u64, max_buf: u64 },
}

static DEFAULT_SAFETY: std::sync::OnceLock<DefaultSafety> = std::sync::OnceLock::new();

/// Sets the process-wide fallback safety buffer. Intended to be called once
/// at process startup; later calls are ignored.
pub fn configure_default_safety(safety: DefaultSafety) {
    let _ = DEFAULT_SAFETY.set(safety);
}

/// Everything a `ResponseBuilder::build` call needs beyond the raw data.
pub struct BuildContext {
    pub response_mode: ResponseMode,
    pub token_limit_override: Option<u64>,
    pub safety_mode: SafetyMode,
    pub start: Instant,
    pub resource_store: Option<Arc<dyn ResourceStore>>,
    pub resource_category: String,
}

impl BuildContext {
    pub fn new() -> Self {
        Self {
            response_mode: ResponseMode::Summary,
            token_limit_override: None,
            safety_mode: SafetyMode::Default,
            start: Instant::now(),
            resource_store: None,
            resource_category: "tool-result".to_string(),
        }
    }

    fn base_budget(&self) -> u64 {
        let (summary_budget, full_budget) = DEFAULT_BUDGETS.get().copied().unwrap_or((SUMMARY_BUDGET, FULL_BUDGET));

        self.token_limit_override.unwrap_or(match self.response_mode {
            ResponseMode::Summary => summary_budget,
            ResponseMode::Full => full_budget,
        })
    }

    /// Budget after the safety buffer is subtracted; `used` is always 0
    /// here since the budget models the entire response envelope.
    fn budget(&self) -> u64 {
        let total = self.base_budget();

        if self.safety_mode != SafetyMode::Default {
            return tokenizer::budget(total, 0, self.safety_mode);
        }

        match DEFAULT_SAFETY.get() {
            Some(DefaultSafety::Mode(mode)) => tokenizer::budget(total, 0, *mode),
            Some(DefaultSafety::Percent { percent, min_buf, max_buf }) => {
                tokenizer::budget_percent(total, 0, *percent, *min_buf, *max_buf)
            }
            None => tokenizer::budget(total, 0, SafetyMode::Default),
        }
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A suggested follow-up action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub parameters: serde_json::Value,
    pub priority: i64,
}

/// Recovery guidance attached to an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recovery {
    pub steps: Vec<String>,
}

/// `{ code, message, recovery? }`. `code` is always a bare taxonomy string,
/// never a language type name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<Recovery>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into(), recovery: None }
    }

    pub fn with_recovery(mut self, steps: Vec<String>) -> Self {
        self.recovery = Some(Recovery { steps });
        self
    }
}

/// Token accounting attached to every response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub estimated: u64,
    pub limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// `{ execution_ms, truncated, resource_uri?, token_info }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub execution_ms: u64,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_uri: Option<String>,
    pub token_info: TokenInfo,
}

/// The uniform envelope returned for every tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult<T> {
    pub success: bool,
    pub data: T,
    pub insights: Vec<String>,
    pub actions: Vec<Action>,
    pub meta: ResponseMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl<T> ToolResult<T> {
    /// Builds a failed result directly, bypassing the builder contract —
    /// used for validation/dispatch failures that never reach a tool body.
    pub fn failure(data: T, error: ErrorInfo, execution_ms: u64, limit: u64) -> Self {
        Self {
            success: false,
            data,
            insights: Vec::new(),
            actions: Vec::new(),
            meta: ResponseMeta {
                execution_ms,
                truncated: false,
                resource_uri: None,
                token_info: TokenInfo { estimated: 0, limit, strategy: None },
            },
            error: Some(error),
        }
    }
}

/// Implemented per tool (or per tool category) to supply insights and
/// suggested actions; `build` implements the 6-step budget-and-shape
/// contract and should not normally be overridden.
#[async_trait]
pub trait ResponseBuilder<T>: Send + Sync
where
    T: Serialize + Clone + Send + Sync,
{
    /// Short textual hints about the result.
    fn insights(&self, data: &T, ctx: &BuildContext) -> Vec<String>;

    /// Suggested follow-up calls, highest priority first.
    fn actions(&self, data: &T, ctx: &BuildContext) -> Vec<Action>;

    /// Best-effort summary of `data` when it does not fit the remaining
    /// budget. Returning `None` defers to resource offload / truncation
    /// marking.
    fn summarize(&self, _data: &T) -> Option<T> {
        None
    }

    async fn build(&self, data: T, ctx: BuildContext) -> ToolResult<T> {
        // Step 1: budget.
        let budget = ctx.budget();
        let insights_budget = (budget as f64 * INSIGHTS_BUDGET_FRACTION).floor() as u64;

        // Step 2: generate insights and actions.
        let raw_insights = self.insights(&data, &ctx);
        let raw_actions = self.actions(&data, &ctx);

        // Step 3: reduce insights (standard strategy).
        let insights_outcome = reduce::reduce(
            &raw_insights,
            &|s: &String| tokenizer::estimate_string(s),
            insights_budget,
            Strategy::Standard,
            None,
        );

        // Step 4: reduce actions (priority strategy, ties by insertion order).
        let priority_fn = |a: &Action| a.priority;
        let action_ctx = ReduceContext { priority_fn: Some(&priority_fn), score_fn: None };
        let actions_budget = budget.saturating_sub(insights_outcome.steps.last().map(|s| s.estimated).unwrap_or(0));
        let actions_outcome = reduce::reduce(
            &raw_actions,
            &|a: &Action| tokenizer::estimate_string(&a.name) + tokenizer::estimate_object(&a.parameters),
            actions_budget,
            Strategy::Priority,
            Some(&action_ctx),
        );

        let consumed = insights_outcome.steps.last().map(|s| s.estimated).unwrap_or(0)
            + actions_outcome.steps.last().map(|s| s.estimated).unwrap_or(0);
        let remaining_for_data = budget.saturating_sub(consumed);

        let data_value = serde_json::to_value(&data).unwrap_or(serde_json::Value::Null);
        let mut estimated_data = tokenizer::estimate_object(&data_value);

        let mut truncated = insights_outcome.truncated || actions_outcome.truncated;
        let mut resource_uri = None;
        let mut final_data = data.clone();

        // Step 5: if data still exceeds its remaining share, mark
        // truncated and do as much of {summarize, offload} as the builder
        // and context support — a shortened inline preview and a full-data
        // resource offload are independent and both apply when available.
        if estimated_data > remaining_for_data {
            if let Some(store) = &ctx.resource_store {
                let bytes = serde_json::to_vec(&data).unwrap_or_default();
                let uri = store.store(&ctx.resource_category, bytes, Some("application/json")).await;
                resource_uri = Some(uri);
            }

            if let Some(summary) = self.summarize(&data) {
                let summary_value = serde_json::to_value(&summary).unwrap_or(serde_json::Value::Null);
                estimated_data = tokenizer::estimate_object(&summary_value);
                final_data = summary;
            }

            truncated = true;
        }

        let total_estimated = estimated_data
            + insights_outcome.steps.last().map(|s| s.estimated).unwrap_or(0)
            + actions_outcome.steps.last().map(|s| s.estimated).unwrap_or(0);

        // Step 6: execution time.
        let execution_ms = ctx.start.elapsed().as_millis() as u64;

        ToolResult {
            success: true,
            data: final_data,
            insights: insights_outcome.items,
            actions: actions_outcome.items,
            meta: ResponseMeta {
                execution_ms,
                truncated,
                resource_uri,
                token_info: TokenInfo {
                    estimated: total_estimated,
                    limit: budget,
                    strategy: Some("standard+priority".to_string()),
                },
            },
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Serialize, Deserialize)]
    struct Payload {
        items: Vec<String>,
    }

    struct EchoBuilder;

    #[async_trait]
    impl ResponseBuilder<Payload> for EchoBuilder {
        fn insights(&self, data: &Payload, _ctx: &BuildContext) -> Vec<String> {
            vec![format!("{} items", data.items.len())]
        }

        fn actions(&self, _data: &Payload, _ctx: &BuildContext) -> Vec<Action> {
            vec![Action { name: "refine".into(), parameters: serde_json::json!({}), priority: 1 }]
        }
    }

    #[tokio::test]
    async fn small_payload_is_not_truncated() {
        let builder = EchoBuilder;
        let data = Payload { items: vec!["a".into(), "b".into()] };
        let result = builder.build(data, BuildContext::new()).await;

        assert!(result.success);
        assert!(!result.meta.truncated);
        assert!(result.meta.token_info.estimated <= result.meta.token_info.limit);
    }

    #[tokio::test]
    async fn oversized_payload_without_resource_store_is_marked_truncated() {
        let builder = EchoBuilder;
        let data = Payload { items: (0..10_000).map(|i| format!("item-{i}")).collect() };

        let mut ctx = BuildContext::new();
        ctx.token_limit_override = Some(200);
        ctx.safety_mode = SafetyMode::Minimal;

        let result = builder.build(data, ctx).await;
        assert!(result.meta.truncated);
    }

    #[tokio::test]
    async fn oversized_payload_with_resource_store_gets_offloaded() {
        let builder = EchoBuilder;
        let data = Payload { items: (0..10_000).map(|i| format!("item-{i}")).collect() };

        let mut ctx = BuildContext::new();
        ctx.token_limit_override = Some(200);
        ctx.safety_mode = SafetyMode::Minimal;
        ctx.resource_store = Some(resources::MemoryResourceStore::new());

        let result = builder.build(data, ctx).await;
        assert!(result.meta.truncated);
        assert!(result.meta.resource_uri.is_some());
    }
}
