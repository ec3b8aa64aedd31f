//! Configuration for the Kamina community daemon.
//!
//! Loads `kamina.yaml` (every field optional, with defaults matching a
//! single-node install under `${HOME}/.kamina`). `${HOME}` in string values
//! is expanded to the user's home directory.

use std::path::Path;

use serde::Deserialize;

use crate::error::{KaminaError, Result};

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub general: GeneralConfig,
    pub ipfs: IpfsConfig,
    pub api: ApiConfig,
    pub daemon: SupervisorConfig,
    pub troubleshoot: TroubleshootConfig,
}

/// General node settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    /// Directory holding the storage node's repository (`IPFS_PATH`).
    pub node_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            node_dir: "${HOME}/.kamina/node".to_string(),
        }
    }
}

/// Storage daemon (IPFS) settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IpfsConfig {
    /// Local install directory used when `ipfs` is not on `$PATH`.
    pub install_dir: String,
    /// Port of the node's API, used for the readiness probe.
    pub api_port: u16,
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            install_dir: "${HOME}/.kamina/go-ipfs".to_string(),
            api_port: 5001,
        }
    }
}

/// API server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Program used to run the API server.
    pub program: String,
    /// Arguments passed to the program, as a vector (never a shell string).
    pub args: Vec<String>,
    /// Port the API server binds to.
    pub port: u16,
    /// Path probed for HTTP 200 during startup.
    pub health_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            program: "uwsgi".to_string(),
            args: vec!["-y".to_string(), "conf/uwsgi.yaml".to_string()],
            port: 1337,
            health_path: "/api/".to_string(),
        }
    }
}

/// What the supervisor does when a managed process exits while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrashPolicy {
    /// Tear the whole daemon down and exit non-zero.
    #[default]
    Shutdown,
    /// Mark the service as crashed, log it, and keep the others running.
    Log,
}

/// Supervisor timing and failure-handling knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Base interval between readiness probe attempts, in milliseconds.
    pub poll_interval_ms: u64,
    /// Per-attempt network timeout for readiness probes, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Maximum readiness attempts per service. `null` retries forever.
    pub max_attempts: Option<u32>,
    /// How long to wait after SIGTERM before escalating to SIGKILL.
    pub grace_period_ms: u64,
    pub on_crash: CrashPolicy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            connect_timeout_ms: 1000,
            max_attempts: Some(120),
            grace_period_ms: 5000,
            on_crash: CrashPolicy::Shutdown,
        }
    }
}

/// Troubleshooting settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TroubleshootConfig {
    /// Show child process output instead of discarding it.
    pub verbose: bool,
}

impl DaemonConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| KaminaError::io_with_path(e, path))?;
        let mut config: DaemonConfig =
            serde_yaml::from_str(&raw).map_err(|e| KaminaError::Config {
                message: format!("failed to parse {}: {e}", path.display()),
            })?;
        config.expand_home();
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    ///
    /// A file that exists but fails to parse is still an error; silently
    /// running with defaults would mask typos.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            let mut config = Self::default();
            config.expand_home();
            Ok(config)
        }
    }

    fn expand_home(&mut self) {
        self.general.node_dir = expand_home(&self.general.node_dir);
        self.ipfs.install_dir = expand_home(&self.ipfs.install_dir);
    }
}

/// Replace `${HOME}` with the user's home directory.
fn expand_home(value: &str) -> String {
    if !value.contains("${HOME}") {
        return value.to_string();
    }
    match dirs::home_dir() {
        Some(home) => value.replace("${HOME}", &home.to_string_lossy()),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.ipfs.api_port, 5001);
        assert_eq!(config.api.port, 1337);
        assert_eq!(config.api.health_path, "/api/");
        assert_eq!(config.daemon.max_attempts, Some(120));
        assert_eq!(config.daemon.on_crash, CrashPolicy::Shutdown);
        assert!(!config.troubleshoot.verbose);
    }

    #[test]
    fn test_load_partial_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("kamina.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            "general:\n  node_dir: /srv/kamina\napi:\n  port: 8080\ndaemon:\n  on_crash: log\n  max_attempts: null\n"
        )
        .unwrap();

        let config = DaemonConfig::load(&path).unwrap();
        assert_eq!(config.general.node_dir, "/srv/kamina");
        assert_eq!(config.api.port, 8080);
        // Untouched sections keep their defaults
        assert_eq!(config.ipfs.api_port, 5001);
        assert_eq!(config.daemon.on_crash, CrashPolicy::Log);
        assert_eq!(config.daemon.max_attempts, None);
    }

    #[test]
    fn test_load_malformed_yaml_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("kamina.yaml");
        std::fs::write(&path, "general: [not, a, mapping]").unwrap();

        let err = DaemonConfig::load(&path).unwrap_err();
        assert!(matches!(err, KaminaError::Config { .. }));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp = TempDir::new().unwrap();
        let config = DaemonConfig::load_or_default(temp.path().join("nope.yaml")).unwrap();
        assert_eq!(config.api.port, 1337);
        // Defaults are home-expanded
        assert!(!config.general.node_dir.contains("${HOME}"));
    }

    #[test]
    fn test_expand_home() {
        let expanded = expand_home("${HOME}/.kamina/node");
        assert!(!expanded.contains("${HOME}"));
        assert!(expanded.ends_with("/.kamina/node"));
        assert_eq!(expand_home("/absolute/path"), "/absolute/path");
    }
}
