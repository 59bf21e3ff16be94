//! `[logging]`: the global `log` filter string, with optional
//! per-component overrides (e.g. `"info"` or `"registry=debug,server=warn"`).

use serde::Deserialize;

/// Framework log level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// A `log`/`env_logger`-style filter directive string.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}
