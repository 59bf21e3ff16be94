//! Ordered before/after/error hooks around every tool invocation.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

mod built_in;

pub use built_in::{LoggingMiddleware, TddMiddleware, TestRunner, TokenCountingMiddleware, TypeVerificationMiddleware};
pub use verify_cache::VerificationCache;

/// Error surfaced by a middleware hook, carried through to the dispatcher
/// as a failed call.
#[derive(Debug, Clone)]
pub struct MiddlewareError {
    pub code: String,
    pub message: String,
    pub recovery_steps: Vec<String>,
}

impl MiddlewareError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into(), recovery_steps: Vec::new() }
    }

    pub fn with_recovery(mut self, steps: Vec<String>) -> Self {
        self.recovery_steps = steps;
        self
    }
}

/// Strict/warning/disabled gate shared by the two blocking built-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateMode {
    #[default]
    Disabled,
    Warning,
    Strict,
}

/// One unit in the chain. `order` and `enabled` are re-read on every
/// invocation so a unit's behavior can change at runtime (e.g. toggled by
/// configuration reload).
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    fn order(&self) -> i32;

    fn enabled(&self) -> bool {
        true
    }

    async fn before(&self, tool_name: &str, params: &Value) -> Result<(), MiddlewareError> {
        let _ = (tool_name, params);
        Ok(())
    }

    async fn after(&self, tool_name: &str, params: &Value, result: &Value, elapsed_ms: u64) {
        let _ = (tool_name, params, result, elapsed_ms);
    }

    async fn on_error(&self, tool_name: &str, params: &Value, error: &MiddlewareError, elapsed_ms: u64) {
        let _ = (tool_name, params, error, elapsed_ms);
    }
}

/// Drives `before` in ascending `order()` and `after`/`on_error` in
/// descending order, so the first middleware to see a request is the last
/// to see its outcome.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    units: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new(units: Vec<Arc<dyn Middleware>>) -> Self {
        Self { units }
    }

    fn enabled_sorted(&self) -> Vec<&Arc<dyn Middleware>> {
        let mut enabled: Vec<&Arc<dyn Middleware>> = self.units.iter().filter(|m| m.enabled()).collect();
        enabled.sort_by_key(|m| m.order());
        enabled
    }

    /// Runs `before` in ascending order, then `run_tool`, then `after`
    /// (success) or `on_error` (failure) in reverse order. If any `before`
    /// fails, `on_error` runs in reverse order on the units whose `before`
    /// already completed, and the call aborts without running `run_tool`.
    pub async fn run<T, F, Fut>(
        &self,
        tool_name: &str,
        params: &Value,
        run_tool: F,
    ) -> Result<T, MiddlewareError>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, MiddlewareError>>,
    {
        let sorted = self.enabled_sorted();
        let mut completed: Vec<&Arc<dyn Middleware>> = Vec::with_capacity(sorted.len());

        for unit in &sorted {
            match unit.before(tool_name, params).await {
                Ok(()) => completed.push(unit),
                Err(err) => {
                    for done in completed.iter().rev() {
                        done.on_error(tool_name, params, &err, 0).await;
                    }
                    return Err(err);
                }
            }
        }

        let start = Instant::now();
        let result = run_tool().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(value) => {
                let json = serde_json::to_value(value).unwrap_or(Value::Null);
                for unit in sorted.iter().rev() {
                    unit.after(tool_name, params, &json, elapsed_ms).await;
                }
            }
            Err(err) => {
                for unit in sorted.iter().rev() {
                    unit.on_error(tool_name, params, err, elapsed_ms).await;
                }
            }
        }

        result
    }
}
