//! `Dispatcher::dispatch`: the request pipeline driving the
//! `Pending → Before → Validated → Running → Shaped → Done | Failed` state
//! machine.

use std::{sync::Arc, time::Duration, time::Instant};

use context::ToolInvocationContext;
use middleware::MiddlewareError;
use regex::Regex;
use response::{ErrorInfo, ToolResult, codes};
use serde_json::Value;

use crate::{ParamField, ParamType, ToolRegistry};

/// Explicit state-machine labels for a single tool invocation's lifecycle.
/// The control flow itself is a linear `async fn`; this enum
/// exists so tests and tracing can assert which state a call reached,
/// rather than because the dispatcher is literally implemented as a state
/// machine object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Pending,
    Before,
    Validated,
    Running,
    Shaped,
    Done,
    Failed,
}

/// Routes a decoded `tools/call` to its registered tool through the
/// middleware chain, validating parameters and mapping failures to the
/// shared error-code taxonomy.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    /// How long to wait for a tool to honor cancellation before abandoning
    /// the call and emitting `CANCELLED`.
    pub cancellation_grace: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry, cancellation_grace: Duration::from_secs(5) }
    }

    pub fn with_cancellation_grace(mut self, grace: Duration) -> Self {
        self.cancellation_grace = grace;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Dispatches `name(params)`, returning a uniform `ToolResult<Value>`
    /// whether the call succeeded or failed at any step.
    pub async fn dispatch(&self, name: &str, params: Value, ctx: ToolInvocationContext) -> ToolResult<Value> {
        let (result, _trace) = self.dispatch_traced(name, params, ctx).await;
        result
    }

    /// Like `dispatch`, but also returns the sequence of states the call
    /// passed through — used by tests asserting the state machine directly.
    pub async fn dispatch_traced(
        &self,
        name: &str,
        params: Value,
        ctx: ToolInvocationContext,
    ) -> (ToolResult<Value>, Vec<DispatchState>) {
        let start = Instant::now();
        let mut trace = vec![DispatchState::Pending];

        // Step 1: look up the descriptor.
        let Some(tool) = self.registry.get(name) else {
            trace.push(DispatchState::Failed);
            return (
                ToolResult::failure(
                    Value::Null,
                    ErrorInfo::new(codes::TOOL_NOT_FOUND, format!("no tool named '{name}' is registered")),
                    elapsed_ms(start),
                    0,
                ),
                trace,
            );
        };

        // Step 2: decode params into the declared shape. Our wire
        // representation is already `serde_json::Value`; "decoding" means
        // requiring an object (or absent params, treated as empty).
        let params = match decode_params(params) {
            Ok(params) => params,
            Err(message) => {
                trace.push(DispatchState::Failed);
                return (
                    ToolResult::failure(Value::Null, ErrorInfo::new(codes::VALIDATION_ERROR, message), elapsed_ms(start), 0),
                    trace,
                );
            }
        };

        let chain = self.registry.middleware_for(name);
        let fields = tool.parameters();
        let cancellation = ctx.cancellation.clone();
        let grace = self.cancellation_grace;

        trace.push(DispatchState::Before);

        let outcome = chain
            .run(name, &params, || async {
                // Step 4: validate parameters.
                if let Err((field, requirement)) = validate_params(&fields, &params) {
                    return Err(MiddlewareError::new(
                        codes::VALIDATION_ERROR,
                        format!("parameter '{field}' {requirement}"),
                    ));
                }

                // Step 5: execute the tool body with a cancellation token
                // tied to the transport's request.
                let call = tool.call(params.clone(), ctx.clone());
                tokio::pin!(call);

                let result = tokio::select! {
                    biased;
                    result = &mut call => result,
                    _ = cancellation.cancelled() => {
                        match tokio::time::timeout(grace, &mut call).await {
                            Ok(result) => result,
                            Err(_) => Err(ErrorInfo::new(
                                codes::CANCELLED,
                                format!("'{name}' was abandoned after the cancellation grace period"),
                            )),
                        }
                    }
                };

                result.map_err(|err| {
                    MiddlewareError::new(err.code.clone(), err.message.clone())
                        .with_recovery(err.recovery.map(|r| r.steps).unwrap_or_default())
                })
            })
            .await;

        match outcome {
            Ok(tool_result) => {
                trace.push(DispatchState::Validated);
                trace.push(DispatchState::Running);
                trace.push(DispatchState::Shaped);
                trace.push(DispatchState::Done);
                (tool_result, trace)
            }
            Err(err) => {
                trace.push(DispatchState::Failed);
                (
                    ToolResult::failure(
                        Value::Null,
                        ErrorInfo::new(err.code, err.message).with_recovery_if_any(err.recovery_steps),
                        elapsed_ms(start),
                        0,
                    ),
                    trace,
                )
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn decode_params(params: Value) -> Result<Value, String> {
    match params {
        Value::Null => Ok(Value::Object(serde_json::Map::new())),
        Value::Object(_) => Ok(params),
        _ => Err("arguments must be a JSON object".to_string()),
    }
}

/// Checks required fields, numeric ranges, string length/pattern/enum, and
/// collection non-emptiness. Returns the first failing field and a
/// human-readable requirement on failure.
fn validate_params(fields: &[ParamField], params: &Value) -> Result<(), (String, String)> {
    let object = params.as_object();

    for field in fields {
        let value = object.and_then(|o| o.get(&field.name));

        let Some(value) = value else {
            if field.required {
                return Err((field.name.clone(), "is required".to_string()));
            }
            continue;
        };

        if value.is_null() {
            if field.required {
                return Err((field.name.clone(), "is required".to_string()));
            }
            continue;
        }

        match field.type_tag {
            ParamType::String => {
                let Some(s) = value.as_str() else {
                    return Err((field.name.clone(), "must be a string".to_string()));
                };

                if let Some(min) = field.min_length
                    && s.chars().count() < min
                {
                    return Err((field.name.clone(), format!("must be at least {min} characters")));
                }
                if let Some(max) = field.max_length
                    && s.chars().count() > max
                {
                    return Err((field.name.clone(), format!("must be at most {max} characters")));
                }
                if let Some(pattern) = &field.pattern {
                    let regex = Regex::new(pattern).map_err(|_| (field.name.clone(), "has an invalid pattern".to_string()))?;
                    if !regex.is_match(s) {
                        return Err((field.name.clone(), format!("must match pattern '{pattern}'")));
                    }
                }
                if let Some(values) = &field.enum_values
                    && !values.iter().any(|v| v == s)
                {
                    return Err((field.name.clone(), format!("must be one of {}", values.join(", "))));
                }
            }
            ParamType::Number => {
                let Some(n) = value.as_f64() else {
                    return Err((field.name.clone(), "must be a number".to_string()));
                };
                if let Some(min) = field.min
                    && n < min
                {
                    return Err((field.name.clone(), format!("must be ≥ {min}")));
                }
                if let Some(max) = field.max
                    && n > max
                {
                    return Err((field.name.clone(), format!("must be ≤ {max}")));
                }
            }
            ParamType::Boolean => {
                if value.as_bool().is_none() {
                    return Err((field.name.clone(), "must be a boolean".to_string()));
                }
            }
            ParamType::Array => {
                let Some(items) = value.as_array() else {
                    return Err((field.name.clone(), "must be an array".to_string()));
                };
                if field.non_empty && items.is_empty() {
                    return Err((field.name.clone(), "must not be empty".to_string()));
                }
            }
            ParamType::Object => {
                if !value.is_object() {
                    return Err((field.name.clone(), "must be an object".to_string()));
                }
            }
        }
    }

    Ok(())
}

trait ErrorInfoExt {
    fn with_recovery_if_any(self, steps: Vec<String>) -> Self;
}

impl ErrorInfoExt for ErrorInfo {
    fn with_recovery_if_any(self, steps: Vec<String>) -> Self {
        if steps.is_empty() { self } else { self.with_recovery(steps) }
    }
}
