//! Platform-specific process-group signalling.
//!
//! Signalling only: reaping always goes through the `ServiceHandle`'s own
//! `Child`, never through a raw `waitpid`, so exit statuses are collected
//! exactly once.

use tracing::debug;

use crate::error::Result;

/// Ask a process group to terminate gracefully.
///
/// Returns `Ok(false)` if the group was already gone; an already-dead child
/// is treated as stopped, not as an error.
pub fn terminate_group(pgid: u32) -> Result<bool> {
    #[cfg(unix)]
    {
        signal_group_unix(pgid, nix::sys::signal::Signal::SIGTERM)
    }

    #[cfg(windows)]
    {
        // No graceful group signal on Windows; taskkill /T tears the tree
        // down directly.
        taskkill_tree(pgid)
    }
}

/// Forcibly kill a process group. Used after the grace period expires.
pub fn kill_group(pgid: u32) -> Result<bool> {
    #[cfg(unix)]
    {
        signal_group_unix(pgid, nix::sys::signal::Signal::SIGKILL)
    }

    #[cfg(windows)]
    {
        taskkill_tree(pgid)
    }
}

#[cfg(unix)]
fn signal_group_unix(pgid: u32, signal: nix::sys::signal::Signal) -> Result<bool> {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    debug!("Sending {} to process group {}", signal, pgid);
    match killpg(Pid::from_raw(pgid as i32), signal) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => {
            debug!("Process group {} is already gone", pgid);
            Ok(false)
        }
        Err(e) => Err(crate::error::KaminaError::Other(format!(
            "failed to signal process group {pgid}: {e}"
        ))),
    }
}

#[cfg(windows)]
fn taskkill_tree(pid: u32) -> Result<bool> {
    use std::process::Command;

    let output = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F", "/T"])
        .output()
        .map_err(|e| crate::error::KaminaError::Other(format!("failed to run taskkill: {e}")))?;

    if output.status.success() {
        Ok(true)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // "not found" means the process already exited
        if stderr.contains("not found") || stderr.contains("not running") {
            Ok(false)
        } else {
            Err(crate::error::KaminaError::Other(format!(
                "taskkill failed for {pid}: {stderr}"
            )))
        }
    }
}
