//! Configuration structures mapping the server's TOML file: transport and
//! auth (`[server]`), token budgets (`[tokens]`), the verification cache
//! (`[verification_cache]`), the auto-service supervisor (`[supervisor]`),
//! and logging (`[logging]`).

#![deny(missing_docs)]

mod loader;
mod logging;
mod server;
mod supervisor;
mod tokens;
mod verification_cache;

use std::path::Path;

use serde::Deserialize;

pub use logging::LoggingConfig;
pub use server::{AuthMode, CorsConfig, HealthConfig, ServerConfig, TransportKind, WebSocketConfig};
pub use supervisor::SupervisorConfig;
pub use tokens::{SafetyMode, SafetyPercentConfig, TokensConfig};
pub use verification_cache::{EvictionStrategy, VerificationCacheConfig};

/// Top-level configuration, deserialized from a TOML file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Transport, auth, CORS, and health settings.
    pub server: ServerConfig,
    /// Token-budget defaults for the response builder.
    pub tokens: TokensConfig,
    /// Verification-cache bounds and eviction policy.
    pub verification_cache: VerificationCacheConfig,
    /// Auto-service supervisor settings.
    pub supervisor: SupervisorConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads and validates configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Parses and validates configuration already read into memory.
    pub fn parse_str(content: &str) -> anyhow::Result<Config> {
        loader::parse_str(content)
    }

    /// Re-runs the cross-section validation this config was already loaded
    /// with; useful after programmatic mutation (e.g. in tests).
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::Config;

    #[test]
    fn defaults_round_trip() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.tokens.summary_budget, 5_000);
        assert_eq!(config.verification_cache.max_count, 10_000);
        assert!(!config.supervisor.is_enabled());
        assert_eq!(config.logging.level, "info");
    }
}
