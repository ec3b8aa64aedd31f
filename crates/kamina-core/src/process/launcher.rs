//! Child process launching.
//!
//! Spawns a managed service as its own process group so a signal delivered to
//! the supervisor's group never reaches children before the supervisor has
//! decided to forward it. Launching never waits for the service to become
//! useful; readiness gating is the probe's job.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::info;

use crate::error::{KaminaError, Result};

use super::service::{ManagedService, OutputPolicy};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

/// Lifecycle state of one supervised child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Ready,
    Stopping,
    Crashed,
}

/// Runtime handle to a spawned service.
///
/// Owned exclusively by the supervisor; no other component signals or waits
/// on the underlying process.
#[derive(Debug)]
pub struct ServiceHandle {
    pub service: ManagedService,
    pub state: ServiceState,
    /// The spawned child. The child is its own process-group leader, so its
    /// PID doubles as the group id for group-wide signals.
    pub child: Child,
}

impl ServiceHandle {
    /// PID of the child, which is also its process-group id.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

/// Process launcher for managed services.
pub struct ProcessLauncher;

impl ProcessLauncher {
    /// Spawn a managed service.
    ///
    /// The service's environment is overlaid on the inherited environment and
    /// arguments are passed as a vector, never through a shell. Returns a
    /// handle in state `Starting`.
    pub fn spawn(service: &ManagedService) -> Result<ServiceHandle> {
        let program = Self::resolve_binary(&service.program).ok_or_else(|| {
            KaminaError::BinaryNotFound {
                service: service.name.clone(),
                program: service.program.clone(),
            }
        })?;

        let mut cmd = Command::new(&program);
        cmd.args(&service.args);
        for (key, value) in &service.env {
            cmd.env(key, value);
        }

        match service.output {
            OutputPolicy::Inherit => {}
            OutputPolicy::Discard => {
                cmd.stdout(Stdio::null());
                cmd.stderr(Stdio::null());
            }
        }

        // Put the child in its own process group. Unlike a full setsid()
        // detach, the child stays our child so we can reap it ourselves.
        #[cfg(unix)]
        #[allow(unsafe_code)]
        {
            // SAFETY: setpgid() is async-signal-safe and only touches the
            // child's own process-group membership between fork and exec.
            unsafe {
                cmd.pre_exec(|| {
                    if libc::setpgid(0, 0) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        let child = cmd.spawn().map_err(|e| KaminaError::LaunchFailed {
            service: service.name.clone(),
            message: e.to_string(),
        })?;

        info!(
            "Launched service '{}' ({}) with PID {}",
            service.name,
            program.display(),
            child.id()
        );

        Ok(ServiceHandle {
            service: service.clone(),
            state: ServiceState::Starting,
            child,
        })
    }

    /// Resolve a program to an executable path.
    ///
    /// Explicit paths (anything containing a separator) are checked directly;
    /// bare names are searched on `$PATH`.
    pub fn resolve_binary(program: &str) -> Option<PathBuf> {
        if program.contains(std::path::MAIN_SEPARATOR) {
            let path = PathBuf::from(program);
            if is_executable(&path) {
                return Some(path);
            }
            return None;
        }
        find_in_path(program)
    }
}

/// Search `$PATH` for an executable with the given name.
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
