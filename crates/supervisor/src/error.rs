/// Failures raised by [`crate::ServiceSupervisor`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `[supervisor]` has no `command` configured.
    #[error("supervisor is not configured: `[supervisor].command` is unset")]
    NotConfigured,

    /// The child process could not be spawned.
    #[error("failed to spawn supervised process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The child exited (or the health check never succeeded) before
    /// `startup_timeout_secs` elapsed.
    #[error("supervised process did not become healthy within {0:?}")]
    StartupTimeout(std::time::Duration),

    /// `max_restart_attempts` consecutive restarts all failed.
    #[error("supervised process failed after {0} restart attempts")]
    RestartsExhausted(u32),

    /// Waiting on the child process failed.
    #[error("failed to wait on supervised process: {0}")]
    Wait(#[source] std::io::Error),
}
