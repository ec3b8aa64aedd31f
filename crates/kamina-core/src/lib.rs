//! Kamina Core - headless library for the Kamina community daemon.
//!
//! This crate provides the daemon orchestrator: configuration loading,
//! shutdown signalling, and supervision of the two long-running child
//! services (the IPFS storage node and the HTTP API server). The CLI in
//! `kamina-cli` is a thin wrapper around it.
//!
//! # Example
//!
//! ```rust,no_run
//! use kamina_core::config::DaemonConfig;
//! use kamina_core::process::{ManagedService, ProcessSupervisor};
//!
//! fn main() -> kamina_core::Result<()> {
//!     let config = DaemonConfig::default();
//!     let mut supervisor =
//!         ProcessSupervisor::new(vec![ManagedService::storage_node(&config)]);
//!     supervisor.start()?;
//!     supervisor.run()
//! }
//! ```

pub mod config;
pub mod error;
pub mod process;
pub mod shutdown;

// Re-export commonly used types
pub use config::{CrashPolicy, DaemonConfig};
pub use error::{KaminaError, Result};
pub use process::{ManagedService, Phase, ProcessSupervisor, ReadinessCheck, ServiceState};
pub use shutdown::{ShutdownToken, SignalBridge};
