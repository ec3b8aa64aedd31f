//! Readiness probing.
//!
//! Repeatedly tests whether a freshly launched service has become reachable.
//! This is the only place in the supervisor that touches a network boundary:
//! connection refused, unreachable hosts, and per-attempt timeouts are all
//! "not yet ready", never an error that propagates.

use std::net::TcpStream;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{KaminaError, Result};
use crate::shutdown::ShutdownToken;

use super::service::{Probe, ReadinessCheck};

/// Ceiling for the exponential backoff between attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Polls a readiness check until it succeeds, the attempt budget runs out,
/// or shutdown is requested.
pub struct ReadinessProbe;

impl ReadinessProbe {
    /// Block until `check` succeeds.
    ///
    /// Three outcomes: `Ok(())` once the service answers, `ReadinessTimeout`
    /// when a finite attempt budget is exhausted, or `Cancelled` when the
    /// shutdown token is observed between attempts. Sleeps are interruptible,
    /// so cancellation is honored within one poll interval.
    pub fn wait_until_ready(
        service_name: &str,
        check: &ReadinessCheck,
        shutdown: &ShutdownToken,
    ) -> Result<()> {
        debug!("Waiting for service '{}' to become ready...", service_name);

        let mut attempts: u32 = 0;
        let mut backoff = check.poll_interval;

        loop {
            if shutdown.is_requested() {
                return Err(KaminaError::Cancelled);
            }

            if Self::attempt(&check.probe, check.connect_timeout) {
                info!(
                    "Service '{}' is ready after {} attempt(s)",
                    service_name,
                    attempts + 1
                );
                return Ok(());
            }

            attempts += 1;
            if let Some(max) = check.max_attempts {
                if attempts >= max {
                    return Err(KaminaError::ReadinessTimeout {
                        service: service_name.to_string(),
                        attempts,
                    });
                }
            }

            if shutdown.sleep_interruptible(backoff) {
                return Err(KaminaError::Cancelled);
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    /// One probe attempt. Any failure means "not yet ready".
    fn attempt(probe: &Probe, connect_timeout: Duration) -> bool {
        match probe {
            Probe::Tcp(addr) => TcpStream::connect_timeout(addr, connect_timeout).is_ok(),
            Probe::HttpOk(url) => {
                let client = match reqwest::blocking::Client::builder()
                    .timeout(connect_timeout)
                    .build()
                {
                    Ok(client) => client,
                    Err(_) => return false,
                };
                client
                    .get(url)
                    .send()
                    .map(|response| response.status() == reqwest::StatusCode::OK)
                    .unwrap_or(false)
            }
        }
    }
}
