//! The process supervisor.
//!
//! Owns the set of managed services and drives their whole lifecycle:
//! startup (launch, probe, mark ready, strictly in declaration order), the
//! monitoring loop, and shutdown (reverse start order, graceful terminate
//! with bounded grace period, escalation to force-kill).

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::{CrashPolicy, SupervisorConfig};
use crate::error::{KaminaError, Result};
use crate::shutdown::ShutdownToken;

use super::launcher::{ProcessLauncher, ServiceHandle, ServiceState};
use super::platform;
use super::probe::ReadinessProbe;
use super::service::ManagedService;

/// Where the supervisor is in its own lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// Point-in-time view of one managed service, for status reporting.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    pub name: String,
    pub state: ServiceState,
    /// PID of the spawned process, if one exists.
    pub pid: Option<u32>,
}

/// Orchestrates the community daemon's child services.
///
/// Created once per daemon run. Startup order is the declaration order of
/// the services; shutdown proceeds in exact reverse, since later services
/// typically depend on earlier ones (the API server talks to the storage
/// node).
pub struct ProcessSupervisor {
    services: Vec<ManagedService>,
    handles: Vec<ServiceHandle>,
    phase: Phase,
    shutdown: ShutdownToken,
    grace_period: Duration,
    monitor_interval: Duration,
    on_crash: CrashPolicy,
    /// Names of services in the order they were stopped, for the shutdown
    /// summary log.
    stop_order: Vec<String>,
}

impl ProcessSupervisor {
    /// Create a supervisor over the given services, in startup order.
    pub fn new(services: Vec<ManagedService>) -> Self {
        Self {
            services,
            handles: Vec::new(),
            phase: Phase::Idle,
            shutdown: ShutdownToken::new(),
            grace_period: Duration::from_secs(5),
            monitor_interval: Duration::from_millis(100),
            on_crash: CrashPolicy::Shutdown,
            stop_order: Vec::new(),
        }
    }

    /// Apply timing and crash-policy settings from the daemon config.
    pub fn with_config(mut self, config: &SupervisorConfig) -> Self {
        self.grace_period = Duration::from_millis(config.grace_period_ms);
        self.on_crash = config.on_crash;
        self
    }

    /// Set the grace period between SIGTERM and SIGKILL.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Set how often the monitoring loop polls children and the token.
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Set the crash policy.
    pub fn with_crash_policy(mut self, policy: CrashPolicy) -> Self {
        self.on_crash = policy;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The shutdown token shared with the signal bridge (and anything else
    /// that may request a stop).
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Request a graceful shutdown. Idempotent; only wakes the monitoring
    /// loop, termination happens there.
    pub fn request_shutdown(&self) {
        self.shutdown.request();
    }

    /// Current state of every declared service.
    pub fn service_status(&self) -> Vec<ServiceStatus> {
        self.services
            .iter()
            .map(|service| {
                match self.handles.iter().find(|h| h.service.name == service.name) {
                    Some(handle) => ServiceStatus {
                        name: service.name.clone(),
                        state: handle.state,
                        pid: Some(handle.pid()),
                    },
                    None => ServiceStatus {
                        name: service.name.clone(),
                        state: ServiceState::Stopped,
                        pid: None,
                    },
                }
            })
            .collect()
    }

    /// Names of stopped services in the order they were terminated.
    pub fn stop_order(&self) -> &[String] {
        &self.stop_order
    }

    /// Launch every service in declaration order, gating each on its
    /// readiness probe.
    ///
    /// Any failure (missing binary, readiness timeout, launch error, or a
    /// shutdown request arriving mid-startup) terminates everything launched
    /// so far before the error is returned: a failed `start()` leaves no
    /// process behind.
    pub fn start(&mut self) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(KaminaError::AlreadyStarted);
        }
        self.phase = Phase::Starting;

        for i in 0..self.services.len() {
            let service = self.services[i].clone();

            if self.shutdown.is_requested() {
                info!("Shutdown requested during startup, aborting");
                self.abort_startup();
                return Err(KaminaError::Cancelled);
            }

            info!("Starting service '{}'...", service.name);
            let handle = match ProcessLauncher::spawn(&service) {
                Ok(handle) => handle,
                Err(e) => {
                    error!("Failed to start service '{}': {}", service.name, e);
                    self.abort_startup();
                    return Err(e);
                }
            };
            self.handles.push(handle);

            let token = self.shutdown.clone();
            match ReadinessProbe::wait_until_ready(&service.name, &service.readiness, &token) {
                Ok(()) => {
                    if let Some(handle) = self.handles.last_mut() {
                        handle.state = ServiceState::Ready;
                    }
                }
                Err(e) => {
                    error!("Service '{}' never became ready: {}", service.name, e);
                    self.abort_startup();
                    return Err(e);
                }
            }
        }

        self.phase = Phase::Running;
        info!("Community daemon started");
        Ok(())
    }

    /// Block until shutdown is requested, then tear everything down.
    ///
    /// The loop polls the shutdown token and each child on the monitor
    /// interval. A child exiting while running is handled per the crash
    /// policy. Returns after every child has been reaped.
    pub fn run(&mut self) -> Result<()> {
        if self.phase != Phase::Running {
            return Err(KaminaError::Other(
                "supervisor is not running".to_string(),
            ));
        }

        let mut result = Ok(());
        while !self.shutdown.is_requested() {
            if let Some(crash) = self.check_children() {
                match self.on_crash {
                    CrashPolicy::Shutdown => {
                        error!("{crash}; shutting down remaining services");
                        result = Err(crash);
                        break;
                    }
                    CrashPolicy::Log => {
                        error!("{crash}; continuing per crash policy");
                    }
                }
            }
            self.shutdown.sleep_interruptible(self.monitor_interval);
        }

        self.phase = Phase::ShuttingDown;
        self.terminate_services();
        self.phase = Phase::Stopped;
        info!("Stopped community daemon");
        result
    }

    /// Cleanup path for a failed or cancelled startup.
    fn abort_startup(&mut self) {
        self.phase = Phase::ShuttingDown;
        self.terminate_services();
        self.phase = Phase::Stopped;
    }

    /// Poll every ready child for an unexpected exit. Returns the first
    /// newly-detected crash; crashed handles keep their collected status.
    fn check_children(&mut self) -> Option<KaminaError> {
        let mut crash = None;
        for handle in &mut self.handles {
            if handle.state != ServiceState::Ready {
                continue;
            }
            match handle.child.try_wait() {
                Ok(Some(status)) => {
                    warn!(
                        "Service '{}' exited unexpectedly ({})",
                        handle.service.name, status
                    );
                    handle.state = ServiceState::Crashed;
                    if crash.is_none() {
                        crash = Some(KaminaError::ProcessCrashed {
                            service: handle.service.name.clone(),
                            status: status.to_string(),
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to poll service '{}': {}", handle.service.name, e);
                }
            }
        }
        crash
    }

    /// Terminate all handles in reverse start order.
    ///
    /// Per service: SIGTERM to its process group, wait up to the grace
    /// period, escalate to SIGKILL, then reap (blocking, since kill cannot
    /// fail to take effect). Signalling errors are logged and treated as
    /// already-stopped; shutdown always completes.
    fn terminate_services(&mut self) {
        for handle in self.handles.iter_mut().rev() {
            let name = handle.service.name.clone();

            match handle.state {
                ServiceState::Stopped => continue,
                ServiceState::Crashed => {
                    // Exit status was already collected by the monitor loop
                    handle.state = ServiceState::Stopped;
                    self.stop_order.push(name);
                    continue;
                }
                _ => {}
            }

            handle.state = ServiceState::Stopping;
            info!("Stopping service '{}'...", name);

            let pgid = handle.pid();
            if let Err(e) = platform::terminate_group(pgid) {
                warn!(
                    "Failed to terminate service '{}' (treating as stopped): {}",
                    name, e
                );
            }

            let deadline = Instant::now() + self.grace_period;
            let mut reaped = false;
            while Instant::now() < deadline {
                match handle.child.try_wait() {
                    Ok(Some(status)) => {
                        debug!("Service '{}' exited ({})", name, status);
                        reaped = true;
                        break;
                    }
                    Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                    Err(e) => {
                        warn!("Failed to wait for service '{}': {}", name, e);
                        break;
                    }
                }
            }

            if !reaped {
                warn!(
                    "Service '{}' did not exit within {:?}, killing its process group",
                    name, self.grace_period
                );
                if let Err(e) = platform::kill_group(pgid) {
                    warn!("Failed to kill service '{}': {}", name, e);
                }
                match handle.child.wait() {
                    Ok(status) => debug!("Service '{}' exited ({})", name, status),
                    Err(e) => warn!("Failed to reap service '{}': {}", name, e),
                }
            }

            handle.state = ServiceState::Stopped;
            self.stop_order.push(name);
        }

        if !self.stop_order.is_empty() {
            debug!("Services stopped in order: {:?}", self.stop_order);
        }
    }
}
