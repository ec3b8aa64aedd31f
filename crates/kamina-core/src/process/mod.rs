//! Process supervision module.
//!
//! Launching, readiness-gating, monitoring, and graceful teardown of the
//! community daemon's child services.
//!
//! # Lifecycle
//!
//! Startup is strictly sequential in declaration order: each service is
//! spawned, then its readiness probe must pass before the next service is
//! touched. Shutdown is the exact reverse, terminating the last-started
//! service first.
//!
//! # Example
//!
//! ```rust,no_run
//! use kamina_core::config::DaemonConfig;
//! use kamina_core::process::{ManagedService, ProcessSupervisor};
//! use kamina_core::shutdown::SignalBridge;
//!
//! fn main() -> kamina_core::Result<()> {
//!     let config = DaemonConfig::load_or_default("conf/kamina.yaml")?;
//!     let mut supervisor = ProcessSupervisor::new(vec![
//!         ManagedService::storage_node(&config),
//!         ManagedService::api_server(&config),
//!     ])
//!     .with_config(&config.daemon);
//!
//!     SignalBridge::install(supervisor.shutdown_token())?;
//!     supervisor.start()?;
//!     supervisor.run()
//! }
//! ```

mod launcher;
mod platform;
mod probe;
mod service;
mod supervisor;

pub use launcher::{find_in_path, ProcessLauncher, ServiceHandle, ServiceState};
pub use probe::ReadinessProbe;
pub use service::{ManagedService, OutputPolicy, Probe, ReadinessCheck};
pub use supervisor::{Phase, ProcessSupervisor, ServiceStatus};
