//! The supervised process's lifecycle.

/// Lifecycle states of a process owned by [`crate::ServiceSupervisor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Never spawned.
    NotStarted,
    /// Spawned, waiting for its first successful health check.
    Starting,
    /// Passing health checks.
    Running,
    /// Spawned but currently failing health checks.
    Unhealthy,
    /// Shutting down on request.
    Stopping,
    /// Exited (or was stopped) and is not scheduled to restart.
    Stopped,
    /// Exhausted its restart budget.
    Failed,
}
