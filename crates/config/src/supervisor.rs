//! `[supervisor]`: the optional auxiliary process that exposes the HTTP
//! transport alongside a `pipe`-mode server.

use std::collections::HashMap;

use serde::Deserialize;

/// Auto-service supervisor configuration. Disabled unless `command` is set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorConfig {
    /// The command to launch. `None` disables the supervisor entirely.
    pub command: Option<String>,
    /// Arguments passed to `command`.
    pub args: Vec<String>,
    /// Extra environment variables set on the spawned process.
    pub env: HashMap<String, String>,
    /// Port the spawned process's HTTP transport listens on.
    pub port: Option<u16>,
    /// Health-check path on the spawned process.
    pub health_path: String,
    /// How long to wait for the first successful health check.
    pub startup_timeout_secs: u64,
    /// Interval between steady-state health checks.
    pub health_interval_secs: u64,
    /// Whether two consecutive unhealthy polls trigger a restart.
    pub auto_restart: bool,
    /// Restarts allowed before the supervisor gives up and marks `Failed`.
    pub max_restart_attempts: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            port: None,
            health_path: "/mcp/health".to_string(),
            startup_timeout_secs: 30,
            health_interval_secs: 15,
            auto_restart: true,
            max_restart_attempts: 3,
        }
    }
}

impl SupervisorConfig {
    /// Whether this configuration enables the supervisor at all.
    pub fn is_enabled(&self) -> bool {
        self.command.is_some()
    }
}
