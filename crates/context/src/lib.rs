//! Shared request-scoped types: the identified caller and the per-call
//! invocation context threaded through the dispatcher and middleware chain.

mod authentication;
mod client_identity;
mod invocation;

pub use authentication::{BearerToken, Claims};
pub use client_identity::ClientIdentity;
pub use invocation::{ResponseModeHint, ToolInvocationContext};
