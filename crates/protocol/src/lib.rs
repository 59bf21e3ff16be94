//! JSON-RPC 2.0 framing and the framework-level method table (`initialize`,
//! `tools/*`, `resources/*`, `prompts/*`, `notifications/cancelled`).
//!
//! Deliberately hand-rolled rather than built on a downstream-dialing
//! client SDK, since this crate implements the server side of the
//! protocol rather than consuming someone else's. `McpServer` is the one
//! object that ties a `registry::Dispatcher`, a resource store, and a
//! prompt registry together behind this wire format; the three transports
//! in the `server` crate each feed raw bytes/frames through it.

mod message;
mod prompts;
mod server;

pub use message::{Id, RpcErrorObject, parse_batch};
pub use prompts::{Prompt, PromptArgument, PromptMessage, PromptRegistry};
pub use server::{McpServer, ServerInfo};

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Method names understood at the framework layer.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";
    pub const NOTIFICATIONS_CANCELLED: &str = "notifications/cancelled";
}

/// Page size used by the cursor-paginated `*/list` methods.
pub const DEFAULT_PAGE_SIZE: usize = 50;
