//! Tests for the TCP reachability check

use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kafka_ui_workload::application::{KafkaUiWorkload, Workload};
use kafka_ui_workload::config::Settings;
use kafka_ui_workload::infrastructure::net::probe_tcp;
use kafka_ui_workload::infrastructure::InMemoryContainer;

const TIMEOUT: Duration = Duration::from_millis(500);

fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn open_fds() -> usize {
    std::fs::read_dir(Path::new("/proc/self/fd"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[test]
fn given_listening_port_when_probing_then_true() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    assert!(probe_tcp("127.0.0.1", port, TIMEOUT));
}

#[test]
fn given_closed_port_when_probing_then_false() {
    let port = closed_port();

    assert!(!probe_tcp("127.0.0.1", port, TIMEOUT));
}

#[test]
fn given_unresolvable_host_when_probing_then_false() {
    assert!(!probe_tcp("no-such-host.invalid", 80, TIMEOUT));
}

#[test]
fn given_many_probes_when_running_then_no_socket_left_open() {
    // Arrange
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let open = listener.local_addr().unwrap().port();
    let closed = closed_port();
    let before = open_fds();

    // Act
    for _ in 0..200 {
        assert!(probe_tcp("127.0.0.1", open, TIMEOUT));
        assert!(!probe_tcp("127.0.0.1", closed, TIMEOUT));
        // Drain the backlog so the listener does not fill up.
        listener.set_nonblocking(true).unwrap();
        while listener.accept().is_ok() {}
    }

    // Assert: other tests run concurrently, allow a little slack
    let after = open_fds();
    assert!(
        after <= before + 8,
        "descriptor leak: {before} before, {after} after"
    );
}

#[test]
fn given_workload_when_checking_socket_then_delegates_to_probe() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let workload = KafkaUiWorkload::new(
        Arc::new(InMemoryContainer::new()),
        Arc::new(Settings::default()),
    );

    assert!(workload.check_socket("127.0.0.1", port));
    assert!(!workload.check_socket("127.0.0.1", closed_port()));
}
