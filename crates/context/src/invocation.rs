use tokio_util::sync::CancellationToken;

use crate::ClientIdentity;

/// Caller-supplied hint selecting a default token budget, mirrored here so
/// `registry`/`server` don't need to depend on the `response` crate just to
/// read the request-side hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseModeHint {
    #[default]
    Summary,
    Full,
}

/// Per-call transient state: tool name, correlation id, cancellation handle,
/// and the response-shaping hints a client may supply. Created on request
/// receipt, destroyed when the response is sent or the call aborts.
#[derive(Clone)]
pub struct ToolInvocationContext {
    pub correlation_id: String,
    pub response_mode: ResponseModeHint,
    pub token_limit_override: Option<u64>,
    pub cancellation: CancellationToken,
    pub client: Option<ClientIdentity>,
}

impl ToolInvocationContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            response_mode: ResponseModeHint::default(),
            token_limit_override: None,
            cancellation: CancellationToken::new(),
            client: None,
        }
    }

    pub fn with_response_mode(mut self, mode: ResponseModeHint) -> Self {
        self.response_mode = mode;
        self
    }

    pub fn with_token_limit_override(mut self, limit: Option<u64>) -> Self {
        self.token_limit_override = limit;
        self
    }

    pub fn with_client(mut self, client: Option<ClientIdentity>) -> Self {
        self.client = client;
        self
    }

    /// A child token tied to this invocation's lifetime, for a tool that
    /// spawns sub-tasks it wants to cancel alongside the call itself.
    pub fn child_cancellation(&self) -> CancellationToken {
        self.cancellation.child_token()
    }
}
