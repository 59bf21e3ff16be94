//! Built-in middleware units: logging, token counting, type verification,
//! and TDD enforcement.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use verify_cache::VerificationCache;

use crate::{GateMode, Middleware, MiddlewareError};

/// Low-order unit that records the method name, elapsed time, and
/// (optionally) parameters under a debug gate.
pub struct LoggingMiddleware {
    pub order: i32,
    pub enabled: bool,
    pub debug_params: bool,
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self { order: 10, enabled: true, debug_params: false }
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn before(&self, tool_name: &str, params: &Value) -> Result<(), MiddlewareError> {
        if self.debug_params {
            log::debug!("dispatching '{tool_name}' params={params}");
        } else {
            log::debug!("dispatching '{tool_name}'");
        }
        Ok(())
    }

    async fn after(&self, tool_name: &str, _params: &Value, _result: &Value, elapsed_ms: u64) {
        log::info!("'{tool_name}' completed in {elapsed_ms}ms");
    }

    async fn on_error(&self, tool_name: &str, _params: &Value, error: &MiddlewareError, elapsed_ms: u64) {
        log::warn!("'{tool_name}' failed in {elapsed_ms}ms: {} ({})", error.message, error.code);
    }
}

/// High-order unit that records estimated input/output tokens.
pub struct TokenCountingMiddleware {
    pub order: i32,
    pub enabled: bool,
}

impl Default for TokenCountingMiddleware {
    fn default() -> Self {
        Self { order: 900, enabled: true }
    }
}

#[async_trait]
impl Middleware for TokenCountingMiddleware {
    fn name(&self) -> &str {
        "token-counting"
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn before(&self, tool_name: &str, params: &Value) -> Result<(), MiddlewareError> {
        let estimated = tokenizer::estimate_object(params);
        log::debug!("'{tool_name}' input ~{estimated} tokens");
        Ok(())
    }

    async fn after(&self, tool_name: &str, _params: &Value, result: &Value, _elapsed_ms: u64) {
        let estimated = tokenizer::estimate_object(result);
        log::debug!("'{tool_name}' output ~{estimated} tokens");
    }
}

/// Scans tool parameters for identifier references and consults the
/// verification cache. In `strict` mode, unverified references block the
/// call.
pub struct TypeVerificationMiddleware {
    pub order: i32,
    pub enabled: bool,
    pub mode: GateMode,
    pub cache: Arc<VerificationCache>,
}

impl TypeVerificationMiddleware {
    pub fn new(mode: GateMode, cache: Arc<VerificationCache>) -> Self {
        Self { order: 20, enabled: true, mode, cache }
    }

    fn code_blob(params: &Value) -> String {
        match params {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .values()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }

    fn file_path_hint(params: &Value) -> String {
        params
            .get("file_path")
            .or_else(|| params.get("filePath"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown.rs")
            .to_string()
    }
}

#[async_trait]
impl Middleware for TypeVerificationMiddleware {
    fn name(&self) -> &str {
        "type-verification"
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn enabled(&self) -> bool {
        self.enabled && self.mode != GateMode::Disabled
    }

    async fn before(&self, tool_name: &str, params: &Value) -> Result<(), MiddlewareError> {
        let code = Self::code_blob(params);
        if code.is_empty() {
            return Ok(());
        }

        let file_path = Self::file_path_hint(params);
        let references = verify_cache::unverified_types_in(&code, &file_path);

        let unverified: Vec<String> = references
            .iter()
            .filter(|r| !self.cache.is_verified(&r.type_name))
            .map(|r| r.type_name.clone())
            .collect();

        if unverified.is_empty() {
            return Ok(());
        }

        match self.mode {
            GateMode::Strict => Err(MiddlewareError::new(
                "TYPE_VERIFICATION_FAILED",
                format!("unverified identifiers referenced by '{tool_name}': {}", unverified.join(", ")),
            )
            .with_recovery(vec![format!(
                "verify the following identifiers before calling '{tool_name}': {}",
                unverified.join(", ")
            )])),
            GateMode::Warning => {
                log::warn!("'{tool_name}' references unverified identifiers: {}", unverified.join(", "));
                Ok(())
            }
            GateMode::Disabled => Ok(()),
        }
    }
}

/// Adapter consulted by `TddMiddleware` to determine whether a recently
/// observed test run for `tool_name` failed.
pub trait TestRunner: Send + Sync {
    fn has_recent_failing_test(&self, tool_name: &str) -> bool;
}

/// Blocks a call in `strict` mode when `require_failing_test` is set and no
/// recent failing test was observed for the tool.
pub struct TddMiddleware {
    pub order: i32,
    pub enabled: bool,
    pub mode: GateMode,
    pub require_failing_test: bool,
    pub test_runner: Arc<dyn TestRunner>,
}

#[async_trait]
impl Middleware for TddMiddleware {
    fn name(&self) -> &str {
        "tdd-enforcement"
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn enabled(&self) -> bool {
        self.enabled && self.mode != GateMode::Disabled
    }

    async fn before(&self, tool_name: &str, _params: &Value) -> Result<(), MiddlewareError> {
        if !self.require_failing_test {
            return Ok(());
        }

        if self.test_runner.has_recent_failing_test(tool_name) {
            return Ok(());
        }

        match self.mode {
            GateMode::Strict => Err(MiddlewareError::new(
                "TDD_VIOLATION",
                format!("'{tool_name}' requires a recently observed failing test before it may run"),
            )
            .with_recovery(vec!["run the failing test for this change before calling this tool again".into()])),
            GateMode::Warning => {
                log::warn!("'{tool_name}' ran without a recently observed failing test");
                Ok(())
            }
            GateMode::Disabled => Ok(()),
        }
    }
}
