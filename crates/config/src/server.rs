//! `[server]`: transport selection, listen address, body-size ceiling,
//! CORS, authentication, and the health endpoint.

use std::net::SocketAddr;

use secrecy::SecretString;
use serde::Deserialize;

/// Default HTTP body-size ceiling: 10 MiB.
const DEFAULT_BODY_LIMIT_BYTES: u64 = 10 * 1024 * 1024;

/// Which of the three front ends this process exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Newline-delimited JSON over stdin/stdout. No authentication.
    #[default]
    Pipe,
    /// `POST /mcp/rpc` plus the convenience `GET` endpoints.
    Http,
    /// Upgrade on `/mcp/ws`.
    Websocket,
}

/// HTTP server configuration settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Which transport this process serves.
    pub transport: TransportKind,
    /// The socket address to bind `http`/`websocket` transports to.
    /// Required when `transport` is not `pipe`.
    pub listen_address: Option<SocketAddr>,
    /// Maximum accepted request body size before a `413` is returned.
    pub body_limit_bytes: u64,
    /// CORS configuration. Disabled (no origin checks at all) when absent.
    pub cors: Option<CorsConfig>,
    /// Authentication mode enforced on `/mcp/rpc` (pipe transport has none).
    pub auth: AuthMode,
    /// Health endpoint configuration.
    pub health: HealthConfig,
    /// Per-connection inbound byte-rate limit for the `websocket` transport.
    pub websocket: WebSocketConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            listen_address: None,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            cors: None,
            auth: AuthMode::default(),
            health: HealthConfig::default(),
            websocket: WebSocketConfig::default(),
        }
    }
}

/// WebSocket transport backpressure: inbound frames
/// exceeding `bytes_per_second` close the connection with a `1008`
/// policy-violation code.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebSocketConfig {
    pub bytes_per_second: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self { bytes_per_second: 1_000_000 }
    }
}

/// CORS allow-list. Present means enabled; preflight requests from an
/// origin outside `allowed_origins` receive a `403`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Origins allowed to call `/mcp/rpc`. `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Whether to echo `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { allowed_origins: Vec::new(), allow_credentials: false }
    }
}

/// `{none, apiKey, basic, jwtHS256}`. A `custom` mode backed by an
/// external verifier is deliberately not modeled here as a variant —
/// implementors needing one fork `AuthMode` rather than being handed a
/// callback hook.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "camelCase", deny_unknown_fields)]
pub enum AuthMode {
    /// No authentication. Valid for the `pipe` transport; `http`/`websocket`
    /// serving unauthenticated traffic is allowed but logged at startup.
    #[default]
    None,
    /// A shared secret carried in a request header.
    ApiKey {
        /// Header name carrying the key. Defaults to `X-API-Key`.
        #[serde(default = "default_api_key_header")]
        header: String,
        /// The expected key value.
        key: SecretString,
    },
    /// HTTP Basic authentication.
    Basic {
        /// Expected username.
        username: String,
        /// Expected password.
        password: SecretString,
    },
    /// HMAC-SHA256-signed JWT bearer tokens.
    #[serde(rename = "jwtHS256")]
    JwtHs256 {
        /// Shared HMAC secret used to verify the signature.
        secret: SecretString,
        /// Expected `iss` claim, if any. Unchecked when absent.
        issuer: Option<String>,
        /// Expected `aud` claim, if any. Unchecked when absent.
        audience: Option<String>,
    },
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

/// Health endpoint configuration. Never authenticated.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether `GET /mcp/health` is mounted.
    pub enabled: bool,
    /// The path it is mounted at.
    pub path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { enabled: true, path: "/mcp/health".to_string() }
    }
}
