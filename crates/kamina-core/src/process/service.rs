//! Managed service descriptions.
//!
//! A `ManagedService` is a static description of one child service: launch
//! command, environment overrides, and a readiness check. It has no behavior
//! of its own; the launcher spawns it and the probe gates on it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::DaemonConfig;

use super::launcher;

/// Whether child stdout/stderr are shown or suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputPolicy {
    /// Child inherits the supervisor's stdout/stderr.
    Inherit,
    /// Child output goes to the void.
    #[default]
    Discard,
}

/// The network check a readiness probe performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// A TCP connect to the address must succeed.
    Tcp(SocketAddr),
    /// An HTTP GET to the URL must return status 200.
    HttpOk(String),
}

/// Readiness check descriptor: what to probe and how persistently.
#[derive(Debug, Clone)]
pub struct ReadinessCheck {
    pub probe: Probe,
    /// Base interval between attempts; backoff doubles from here.
    pub poll_interval: Duration,
    /// Per-attempt network timeout.
    pub connect_timeout: Duration,
    /// Attempt budget. `None` retries forever; a service that never comes up
    /// then blocks startup until a shutdown signal arrives, so bounded
    /// budgets are the default everywhere in this crate.
    pub max_attempts: Option<u32>,
}

impl ReadinessCheck {
    /// TCP connect check with default timing.
    pub fn tcp(addr: SocketAddr) -> Self {
        Self {
            probe: Probe::Tcp(addr),
            poll_interval: Duration::from_millis(250),
            connect_timeout: Duration::from_secs(1),
            max_attempts: Some(120),
        }
    }

    /// HTTP 200 check with default timing.
    pub fn http_ok(url: impl Into<String>) -> Self {
        Self {
            probe: Probe::HttpOk(url.into()),
            poll_interval: Duration::from_millis(250),
            connect_timeout: Duration::from_secs(1),
            max_attempts: Some(120),
        }
    }

    /// Set the base poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the per-attempt network timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the attempt budget (`None` = retry until shutdown).
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Static description of one child service under supervision.
#[derive(Debug, Clone)]
pub struct ManagedService {
    /// Identifier, unique within a supervisor.
    pub name: String,
    /// Executable path or bare name resolved on `$PATH` at launch.
    pub program: String,
    /// Argument vector. Arguments are passed to the OS directly, never
    /// through a shell, so config-supplied paths cannot inject commands.
    pub args: Vec<String>,
    /// Environment overlaid on the inherited process environment.
    pub env: HashMap<String, String>,
    pub readiness: ReadinessCheck,
    pub output: OutputPolicy,
}

impl ManagedService {
    /// Create a service with default timing and discarded output.
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        readiness: ReadinessCheck,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: vec![],
            env: HashMap::new(),
            readiness,
            output: OutputPolicy::Discard,
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the argument vector.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Add an environment variable override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the output policy.
    pub fn with_output(mut self, output: OutputPolicy) -> Self {
        self.output = output;
        self
    }

    /// The storage daemon service: `ipfs daemon` with `IPFS_PATH` pointing at
    /// the configured node directory, readiness-gated on a TCP connect to the
    /// node's API port.
    ///
    /// Binary resolution prefers `ipfs` on `$PATH` and falls back to the
    /// configured local install directory.
    pub fn storage_node(config: &DaemonConfig) -> Self {
        let program = if launcher::find_in_path("ipfs").is_some() {
            "ipfs".to_string()
        } else {
            PathBuf::from(&config.ipfs.install_dir)
                .join("ipfs")
                .to_string_lossy()
                .into_owned()
        };

        let addr = SocketAddr::from(([127, 0, 0, 1], config.ipfs.api_port));
        Self::new("ipfs", program, readiness_from_config(config, Probe::Tcp(addr)))
            .with_arg("daemon")
            .with_env("IPFS_PATH", &config.general.node_dir)
            .with_output(output_from_config(config))
    }

    /// The API server service, readiness-gated on an HTTP 200 from its
    /// health path.
    pub fn api_server(config: &DaemonConfig) -> Self {
        let url = format!(
            "http://127.0.0.1:{}{}",
            config.api.port, config.api.health_path
        );
        Self::new(
            "api",
            &config.api.program,
            readiness_from_config(config, Probe::HttpOk(url)),
        )
        .with_args(config.api.args.clone())
        .with_output(output_from_config(config))
    }
}

fn readiness_from_config(config: &DaemonConfig, probe: Probe) -> ReadinessCheck {
    ReadinessCheck {
        probe,
        poll_interval: Duration::from_millis(config.daemon.poll_interval_ms),
        connect_timeout: Duration::from_millis(config.daemon.connect_timeout_ms),
        max_attempts: config.daemon.max_attempts,
    }
}

fn output_from_config(config: &DaemonConfig) -> OutputPolicy {
    if config.troubleshoot.verbose {
        OutputPolicy::Inherit
    } else {
        OutputPolicy::Discard
    }
}
