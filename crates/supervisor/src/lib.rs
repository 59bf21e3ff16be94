//! Auto-Service Supervisor: owns the lifecycle of the auxiliary process
//! named by `[supervisor]` — `ensure_running`, a periodic health-check
//! loop, and the state machine `NotStarted -> Starting -> Running <->
//! Unhealthy -> Stopping -> Stopped | Failed`. Health polling and a
//! `tokio::select!` raced against a `CancellationToken`, here supervising a
//! spawned child process instead of an in-process axum server.

#![deny(missing_docs)]

mod error;
mod state;

use std::{sync::Arc, time::Duration};

use config::SupervisorConfig;
use parking_lot::Mutex;
use tokio::{
    process::{Child, Command},
    time::{Instant, sleep},
};
use tokio_util::sync::CancellationToken;

pub use error::Error;
pub use state::ServiceState;

struct Inner {
    state: ServiceState,
    child: Option<Child>,
    restart_count: u32,
}

/// Supervises the single auxiliary process described by `[supervisor]`.
pub struct ServiceSupervisor {
    config: SupervisorConfig,
    inner: Mutex<Inner>,
}

impl ServiceSupervisor {
    /// Builds a supervisor from `[supervisor]`. Returns `None` when the
    /// section has no `command` — the supervisor is then simply unused.
    pub fn new(config: SupervisorConfig) -> Option<Arc<Self>> {
        if !config.is_enabled() {
            return None;
        }

        Some(Arc::new(Self {
            config,
            inner: Mutex::new(Inner { state: ServiceState::NotStarted, child: None, restart_count: 0 }),
        }))
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ServiceState {
        self.inner.lock().state
    }

    /// Spawns the process if it isn't already starting or running, and
    /// waits for its first successful health check, up to
    /// `startup_timeout_secs`.
    pub async fn ensure_running(self: &Arc<Self>) -> Result<(), Error> {
        if matches!(self.state(), ServiceState::Running | ServiceState::Starting) {
            return Ok(());
        }

        self.spawn().await?;
        self.await_healthy(Duration::from_secs(self.config.startup_timeout_secs)).await
    }

    /// Runs the periodic health-check loop until `shutdown` fires,
    /// restarting the process on a failed check when `auto_restart` is set.
    /// Callers should drive this from an owned `JoinHandle` so a failure
    /// (the restart budget exhausted) is observed rather than silently
    /// dropped.
    pub async fn run_health_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let interval = Duration::from_secs(self.config.health_interval_secs.max(1));

        loop {
            tokio::select! {
                _ = sleep(interval) => {}
                _ = shutdown.cancelled() => {
                    self.stop().await;
                    return;
                }
            }

            let state = self.state();
            if !matches!(state, ServiceState::Running | ServiceState::Unhealthy) {
                continue;
            }

            if self.poll_health_once().await {
                self.inner.lock().state = ServiceState::Running;
                continue;
            }

            log::warn!("supervised process failed its health check");
            self.inner.lock().state = ServiceState::Unhealthy;

            if !self.config.auto_restart {
                continue;
            }

            if let Err(err) = self.restart().await {
                log::error!("supervisor gave up restarting the process: {err}");
                return;
            }
        }
    }

    /// Stops the supervised process, if any, and marks the supervisor
    /// `Stopped`.
    pub async fn stop(&self) {
        self.inner.lock().state = ServiceState::Stopping;
        self.kill_child().await;
        self.inner.lock().state = ServiceState::Stopped;
    }

    async fn spawn(self: &Arc<Self>) -> Result<(), Error> {
        let command = self.config.command.as_deref().ok_or(Error::NotConfigured)?;

        let mut cmd = Command::new(command);
        cmd.args(&self.config.args);
        cmd.envs(&self.config.env);
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(Error::Spawn)?;
        log::info!("supervisor spawned `{command}` (pid {:?})", child.id());

        let mut inner = self.inner.lock();
        inner.child = Some(child);
        inner.state = ServiceState::Starting;
        Ok(())
    }

    async fn await_healthy(self: &Arc<Self>, timeout: Duration) -> Result<(), Error> {
        let deadline = Instant::now() + timeout;

        while Instant::now() < deadline {
            if self.poll_health_once().await {
                self.inner.lock().state = ServiceState::Running;
                return Ok(());
            }
            sleep(Duration::from_millis(200)).await;
        }

        self.inner.lock().state = ServiceState::Failed;
        Err(Error::StartupTimeout(timeout))
    }

    async fn restart(self: &Arc<Self>) -> Result<(), Error> {
        let restart_count = {
            let mut inner = self.inner.lock();
            inner.restart_count += 1;
            inner.restart_count
        };

        if restart_count > self.config.max_restart_attempts {
            self.inner.lock().state = ServiceState::Failed;
            return Err(Error::RestartsExhausted(self.config.max_restart_attempts));
        }

        log::info!("restarting supervised process (attempt {restart_count}/{})", self.config.max_restart_attempts);

        self.kill_child().await;
        self.spawn().await?;
        self.await_healthy(Duration::from_secs(self.config.startup_timeout_secs)).await
    }

    /// A process with no `port` configured is considered always healthy
    /// once spawned — `[supervisor]` doesn't require the child to expose
    /// the `http` transport.
    async fn poll_health_once(&self) -> bool {
        let Some(port) = self.config.port else { return true };

        let url = format!("http://127.0.0.1:{port}{}", self.config.health_path);
        reqwest::get(&url).await.is_ok_and(|response| response.status().is_success())
    }

    async fn kill_child(&self) {
        let child = self.inner.lock().child.take();

        if let Some(mut child) = child {
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleeper_config() -> SupervisorConfig {
        SupervisorConfig { command: Some("sleep".to_string()), args: vec!["5".to_string()], ..Default::default() }
    }

    #[test]
    fn disabled_without_a_command() {
        assert!(ServiceSupervisor::new(SupervisorConfig::default()).is_none());
    }

    #[tokio::test]
    async fn ensure_running_spawns_and_marks_running_without_a_port() {
        let supervisor = ServiceSupervisor::new(sleeper_config()).unwrap();
        supervisor.ensure_running().await.unwrap();
        assert_eq!(supervisor.state(), ServiceState::Running);
        supervisor.stop().await;
        assert_eq!(supervisor.state(), ServiceState::Stopped);
    }

    #[tokio::test]
    async fn ensure_running_is_idempotent() {
        let supervisor = ServiceSupervisor::new(sleeper_config()).unwrap();
        supervisor.ensure_running().await.unwrap();
        supervisor.ensure_running().await.unwrap();
        assert_eq!(supervisor.state(), ServiceState::Running);
        supervisor.stop().await;
    }
}
