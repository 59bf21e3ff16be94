//! Holds tool descriptors, validates parameters, and dispatches a decoded
//! JSON-RPC `tools/call` to the registered tool through its middleware
//! chain.

mod dispatcher;
mod tool;

pub use dispatcher::{DispatchState, Dispatcher};
pub use tool::{ParamField, ParamType, Tool, ToolDescriptor};

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use middleware::MiddlewareChain;

/// Error raised by registration itself (never surfaced to a caller of
/// `dispatch`, which reports an unknown name as `TOOL_NOT_FOUND` instead).
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a tool named '{0}' is already registered")]
    DuplicateName(String),
    #[error("the registry is frozen; no further tools may be registered")]
    Frozen,
}

/// Holds `ToolDescriptor`s. Tools are registered by explicit construction
/// — the framework has no reflection-based discovery; names are unique
/// and registration becomes an error after `freeze()`: the registry is
/// immutable once the server starts serving requests.
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn Tool>>,
    chains: DashMap<String, MiddlewareChain>,
    default_chain: MiddlewareChain,
    frozen: AtomicBool,
}

impl ToolRegistry {
    pub fn new(default_chain: MiddlewareChain) -> Arc<Self> {
        Arc::new(Self {
            tools: DashMap::new(),
            chains: DashMap::new(),
            default_chain,
            frozen: AtomicBool::new(false),
        })
    }

    /// Registers `tool` under the registry's default middleware chain.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        self.register_with_middleware(tool, None)
    }

    /// Registers `tool` with its own middleware chain, overriding the
    /// registry default for this tool only.
    pub fn register_with_middleware(
        &self,
        tool: Arc<dyn Tool>,
        chain: Option<MiddlewareChain>,
    ) -> Result<(), RegistryError> {
        if self.frozen.load(Ordering::Acquire) {
            return Err(RegistryError::Frozen);
        }

        let name = tool.name().to_string();

        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }

        if let Some(chain) = chain {
            self.chains.insert(name.clone(), chain);
        }

        self.tools.insert(name, tool);
        Ok(())
    }

    /// Freezes the registry: further `register` calls fail. Called once at
    /// startup, after which lookups need no locking on the hot path.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors for every registered tool, e.g. for `tools/list`.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> = self.tools.iter().map(|entry| entry.value().descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|entry| entry.key().clone()).collect()
    }

    fn middleware_for(&self, name: &str) -> MiddlewareChain {
        self.chains.get(name).map(|c| c.clone()).unwrap_or_else(|| self.default_chain.clone())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use context::ToolInvocationContext;
    use response::{Action, BuildContext, ErrorInfo, ResponseBuilder, ToolResult};
    use serde_json::Value;

    use super::*;

    struct NoopBuilder;

    #[async_trait]
    impl ResponseBuilder<Value> for NoopBuilder {
        fn insights(&self, _data: &Value, _ctx: &BuildContext) -> Vec<String> {
            Vec::new()
        }
        fn actions(&self, _data: &Value, _ctx: &BuildContext) -> Vec<Action> {
            Vec::new()
        }
    }

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
            Ok(NoopBuilder.build(params, BuildContext::new()).await)
        }
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let registry = ToolRegistry::new(MiddlewareChain::default());
        registry.register(Arc::new(Echo)).unwrap();
        let err = registry.register(Arc::new(Echo)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(name) if name == "echo"));
    }

    #[test]
    fn registration_after_freeze_is_rejected() {
        let registry = ToolRegistry::new(MiddlewareChain::default());
        registry.freeze();
        let err = registry.register(Arc::new(Echo)).unwrap_err();
        assert!(matches!(err, RegistryError::Frozen));
    }

    #[test]
    fn descriptors_are_sorted_by_name() {
        struct Other;
        #[async_trait]
        impl Tool for Other {
            fn name(&self) -> &str {
                "aardvark"
            }
            fn description(&self) -> &str {
                "goes first alphabetically"
            }
            fn parameters(&self) -> Vec<ParamField> {
                Vec::new()
            }
            async fn call(&self, params: Value, _ctx: ToolInvocationContext) -> Result<ToolResult<Value>, ErrorInfo> {
                Ok(NoopBuilder.build(params, BuildContext::new()).await)
            }
        }

        let registry = ToolRegistry::new(MiddlewareChain::default());
        registry.register(Arc::new(Echo)).unwrap();
        registry.register(Arc::new(Other)).unwrap();

        let names: Vec<String> = registry.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["aardvark".to_string(), "echo".to_string()]);
    }
}
