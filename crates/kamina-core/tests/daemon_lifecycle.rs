//! End-to-end lifecycle tests for the process supervisor.
//!
//! These spawn real child processes (`sleep`) and gate them on real TCP
//! listeners owned by the test, so they are Unix-only.

#![cfg(unix)]

use std::net::{SocketAddr, TcpListener};
use std::time::{Duration, Instant};

use kamina_core::config::CrashPolicy;
use kamina_core::process::{
    ManagedService, Phase, ProcessSupervisor, ReadinessCheck, ServiceState,
};
use kamina_core::KaminaError;

/// A long-running fake service whose readiness is a TCP connect to `addr`.
fn fake_service(name: &str, addr: SocketAddr) -> ManagedService {
    let check = ReadinessCheck::tcp(addr)
        .with_poll_interval(Duration::from_millis(10))
        .with_max_attempts(Some(500));
    ManagedService::new(name, "sleep", check).with_arg("30")
}

/// Listener the supervisor can probe immediately.
fn open_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Bind an ephemeral port, then free it again.
fn unused_port_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

// kill(pid, 0) probes existence without signalling
#[allow(unsafe_code)]
fn pid_is_alive(pid: u32) -> bool {
    // SAFETY: signal 0 performs permission/existence checks only.
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[test]
fn test_full_lifecycle_reaps_all_children_in_reverse_order() {
    let (_la, addr_a) = open_listener();
    let (_lb, addr_b) = open_listener();

    let mut supervisor = ProcessSupervisor::new(vec![
        fake_service("storage", addr_a),
        fake_service("api", addr_b),
    ])
    .with_grace_period(Duration::from_secs(2))
    .with_monitor_interval(Duration::from_millis(20));

    supervisor.start().unwrap();
    assert_eq!(supervisor.phase(), Phase::Running);

    let status = supervisor.service_status();
    let pids: Vec<u32> = status.iter().map(|s| s.pid.unwrap()).collect();
    assert!(status.iter().all(|s| s.state == ServiceState::Ready));
    assert!(pids.iter().all(|&pid| pid_is_alive(pid)));

    supervisor.request_shutdown();
    supervisor.run().unwrap();

    assert_eq!(supervisor.phase(), Phase::Stopped);
    // Last-started service stops first
    assert_eq!(supervisor.stop_order(), ["api", "storage"]);
    assert!(supervisor
        .service_status()
        .iter()
        .all(|s| s.state == ServiceState::Stopped));
    // run() returned only after every child was reaped
    assert!(pids.iter().all(|&pid| !pid_is_alive(pid)));
}

#[test]
fn test_readiness_gates_sequential_startup() {
    // Service A's port opens only after ~200ms; B's is open from the start
    let addr_a = unused_port_addr();
    let (_lb, addr_b) = open_listener();

    let opener = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        TcpListener::bind(addr_a).unwrap()
    });

    let mut supervisor = ProcessSupervisor::new(vec![
        fake_service("slow", addr_a),
        fake_service("fast", addr_b),
    ])
    .with_grace_period(Duration::from_secs(2));

    let start = Instant::now();
    supervisor.start().unwrap();

    // Overall success cannot be reported before the slow service was ready,
    // and the fast service is only spawned after that.
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert_eq!(supervisor.phase(), Phase::Running);

    supervisor.request_shutdown();
    supervisor.run().unwrap();
    drop(opener.join().unwrap());
}

#[test]
fn test_missing_binary_aborts_before_second_service() {
    let (_lb, addr_b) = open_listener();

    let services = vec![
        ManagedService::new(
            "ghost",
            "kamina-test-definitely-missing",
            ReadinessCheck::tcp(addr_b),
        ),
        fake_service("api", addr_b),
    ];
    let mut supervisor = ProcessSupervisor::new(services);

    let err = supervisor.start().unwrap_err();
    assert!(matches!(
        err,
        KaminaError::BinaryNotFound { ref service, .. } if service == "ghost"
    ));
    assert_eq!(supervisor.phase(), Phase::Stopped);

    // The second service was never spawned
    let status = supervisor.service_status();
    assert_eq!(status[1].pid, None);
    assert_eq!(status[1].state, ServiceState::Stopped);
}

#[test]
fn test_readiness_timeout_cleans_up_started_services() {
    let (_la, addr_a) = open_listener();
    let dead_addr = unused_port_addr();

    let check_b = ReadinessCheck::tcp(dead_addr)
        .with_poll_interval(Duration::from_millis(10))
        .with_max_attempts(Some(3));
    let services = vec![
        fake_service("storage", addr_a),
        ManagedService::new("api", "sleep", check_b).with_arg("30"),
    ];
    let mut supervisor =
        ProcessSupervisor::new(services).with_grace_period(Duration::from_secs(2));

    let err = supervisor.start().unwrap_err();
    assert!(matches!(
        err,
        KaminaError::ReadinessTimeout { ref service, .. } if service == "api"
    ));
    assert_eq!(supervisor.phase(), Phase::Stopped);

    // Both the launched-but-never-ready service and the already-ready one
    // were torn down
    for status in supervisor.service_status() {
        assert_eq!(status.state, ServiceState::Stopped);
        if let Some(pid) = status.pid {
            assert!(!pid_is_alive(pid));
        }
    }
}

#[test]
fn test_repeated_shutdown_requests_stop_once() {
    let (_la, addr_a) = open_listener();

    let mut supervisor = ProcessSupervisor::new(vec![fake_service("storage", addr_a)])
        .with_grace_period(Duration::from_secs(2));
    supervisor.start().unwrap();

    for _ in 0..5 {
        supervisor.request_shutdown();
    }
    let token = supervisor.shutdown_token();
    token.request(); // also via the signal-bridge path

    supervisor.run().unwrap();
    // Exactly one shutdown sequence: each service stopped exactly once
    assert_eq!(supervisor.stop_order(), ["storage"]);
}

#[test]
fn test_crash_policy_shutdown_is_fatal() {
    let (_la, addr_a) = open_listener();

    let check = ReadinessCheck::tcp(addr_a).with_poll_interval(Duration::from_millis(10));
    let services = vec![ManagedService::new("flaky", "sleep", check).with_arg("0.3")];
    let mut supervisor = ProcessSupervisor::new(services)
        .with_monitor_interval(Duration::from_millis(20))
        .with_crash_policy(CrashPolicy::Shutdown);

    supervisor.start().unwrap();
    let err = supervisor.run().unwrap_err();
    assert!(matches!(
        err,
        KaminaError::ProcessCrashed { ref service, .. } if service == "flaky"
    ));
    assert_eq!(supervisor.phase(), Phase::Stopped);
}

#[test]
fn test_crash_policy_log_keeps_daemon_running() {
    let (_la, addr_a) = open_listener();
    let (_lb, addr_b) = open_listener();

    let check_a = ReadinessCheck::tcp(addr_a).with_poll_interval(Duration::from_millis(10));
    let services = vec![
        ManagedService::new("flaky", "sleep", check_a).with_arg("0.2"),
        fake_service("steady", addr_b),
    ];
    let mut supervisor = ProcessSupervisor::new(services)
        .with_monitor_interval(Duration::from_millis(20))
        .with_grace_period(Duration::from_secs(2))
        .with_crash_policy(CrashPolicy::Log);

    supervisor.start().unwrap();

    let token = supervisor.shutdown_token();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(600));
        token.request();
    });

    // The flaky service dies ~200ms in; with the log policy the supervisor
    // keeps running until the explicit shutdown request.
    supervisor.run().unwrap();
    stopper.join().unwrap();

    assert_eq!(supervisor.phase(), Phase::Stopped);
    assert_eq!(supervisor.stop_order(), ["steady", "flaky"]);
}
