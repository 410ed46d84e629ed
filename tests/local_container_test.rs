//! Tests for LocalContainer: real processes and files under a temp root

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nix::unistd::{getegid, geteuid, Group, User};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use kafka_ui_workload::domain::{Layer, Override, Ownership, ServiceSpec, ServiceStatus, Startup, WriteMode};
use kafka_ui_workload::infrastructure::traits::{FileSystem, RealCommandRunner, RealFileSystem};
use kafka_ui_workload::infrastructure::{Container, ContainerError, ExecRequest, LocalContainer};
use kafka_ui_workload::util::testing::init_test_setup;

const STATE_DIR: &str = "/var/lib/supervisor";

struct Fixture {
    root: TempDir,
    container: LocalContainer,
}

fn container_at(root: &Path) -> LocalContainer {
    LocalContainer::with_deps(
        root,
        STATE_DIR,
        Arc::new(RealFileSystem),
        Arc::new(RealCommandRunner),
    )
    .with_stop_timeout(Duration::from_secs(2))
}

#[fixture]
fn fixture() -> Fixture {
    init_test_setup();
    let root = TempDir::new().unwrap();
    let container = container_at(root.path());
    Fixture { root, container }
}

/// Ownership of the current process, valid whether or not tests run as root.
fn current_owner() -> Ownership {
    let user = User::from_uid(geteuid()).unwrap().unwrap();
    let group = Group::from_gid(getegid()).unwrap().unwrap();
    Ownership::new(user.name, group.name)
}

fn service_layer(name: &str, command: &str) -> Layer {
    let spec = ServiceSpec {
        override_strategy: Some(Override::Replace),
        summary: Some(format!("{name} test service")),
        command: Some(command.to_string()),
        startup: Some(Startup::Enabled),
        ..Default::default()
    };
    Layer {
        summary: "test".into(),
        description: "test layer".into(),
        services: BTreeMap::from([(name.to_string(), spec)]),
    }
}

fn wait_for_status(container: &LocalContainer, name: &str, want: ServiceStatus) -> ServiceStatus {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let current = container.get_service(name).unwrap().current;
        if current == want || Instant::now() > deadline {
            return current;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn sh(script: &str) -> ExecRequest {
    ExecRequest::new(["sh", "-c", script])
}

// ============================================================
// Exec
// ============================================================

#[rstest]
fn given_echo_when_executing_then_stdout_returned(fixture: Fixture) {
    let output = fixture.container.exec(&ExecRequest::new(["echo", "hello"])).unwrap();

    assert_eq!(output, "hello\n");
}

#[rstest]
fn given_stdout_and_stderr_when_executing_combined_then_interleaved_in_order(fixture: Fixture) {
    let output = fixture
        .container
        .exec(&sh("echo out; echo err 1>&2; echo out2"))
        .unwrap();

    assert_eq!(output, "out\nerr\nout2\n");
}

#[rstest]
fn given_non_zero_exit_when_executing_combined_then_error_carries_output(fixture: Fixture) {
    let result = fixture.container.exec(&sh("echo out; echo err 1>&2; exit 3"));

    match result {
        Err(ContainerError::Exec {
            exit_code,
            stdout,
            stderr,
        }) => {
            assert_eq!(exit_code, Some(3));
            assert_eq!(stdout, "out\nerr\n");
            assert_eq!(stderr, "");
        }
        other => panic!("expected exec failure, got {other:?}"),
    }
}

#[rstest]
fn given_non_zero_exit_when_executing_separate_then_streams_kept_apart(fixture: Fixture) {
    let mut request = sh("echo out; echo err 1>&2; exit 1");
    request.combine_stderr = false;

    let result = fixture.container.exec(&request);

    match result {
        Err(ContainerError::Exec {
            exit_code,
            stdout,
            stderr,
        }) => {
            assert_eq!(exit_code, Some(1));
            assert_eq!(stdout, "out\n");
            assert_eq!(stderr, "err\n");
        }
        other => panic!("expected exec failure, got {other:?}"),
    }
}

#[rstest]
fn given_missing_program_when_executing_then_exec_error_without_code(fixture: Fixture) {
    let result = fixture
        .container
        .exec(&ExecRequest::new(["definitely-not-a-real-program-xyz"]));

    assert!(matches!(
        result,
        Err(ContainerError::Exec { exit_code: None, .. })
    ));
}

#[rstest]
fn given_env_and_working_dir_when_executing_then_applied(fixture: Fixture) {
    // Arrange
    std::fs::create_dir_all(fixture.root.path().join("work")).unwrap();
    let mut request = sh("echo $GREETING; pwd");
    request
        .environment
        .insert("GREETING".into(), "hi".into());
    request.working_dir = Some("/work".into());

    // Act
    let output = fixture.container.exec(&request).unwrap();

    // Assert
    let expected_dir = fixture.root.path().join("work").canonicalize().unwrap();
    assert_eq!(output, format!("hi\n{}\n", expected_dir.display()));
}

// ============================================================
// Files
// ============================================================

#[rstest]
fn given_container_path_when_writing_then_lands_under_root(fixture: Fixture) {
    // Arrange
    let path = Path::new("/etc/kafka-ui/application-local.yml");

    // Act
    fixture
        .container
        .write_text(path, "a: 1\n", &current_owner(), WriteMode::Overwrite)
        .unwrap();
    fixture
        .container
        .write_text(path, "b: 2\n", &current_owner(), WriteMode::Append)
        .unwrap();

    // Assert
    let host = fixture.root.path().join("etc/kafka-ui/application-local.yml");
    assert_eq!(std::fs::read_to_string(host).unwrap(), "a: 1\nb: 2\n");
    assert!(fixture.container.exists(path).unwrap());
    assert_eq!(fixture.container.read_text(path).unwrap(), "a: 1\nb: 2\n");
}

#[rstest]
fn given_missing_file_when_checking_then_not_exists(fixture: Fixture) {
    assert!(!fixture.container.exists(Path::new("/etc/nothing")).unwrap());
}

#[rstest]
fn given_escaping_path_when_writing_then_rejected(fixture: Fixture) {
    let result = fixture.container.write_text(
        Path::new("/etc/../../outside"),
        "x",
        &current_owner(),
        WriteMode::Overwrite,
    );

    assert!(matches!(result, Err(ContainerError::InvalidPath(_))));
}

#[test]
fn given_missing_root_when_connecting_then_unavailable() {
    let temp = TempDir::new().unwrap();
    let container = container_at(&temp.path().join("absent"));

    assert!(!container.can_connect());
    assert!(matches!(
        container.exec(&ExecRequest::new(["true"])),
        Err(ContainerError::ConnectionUnavailable { .. })
    ));
    assert!(matches!(
        container.exists(Path::new("/etc/environment")),
        Err(ContainerError::ConnectionUnavailable { .. })
    ));
}

// ============================================================
// Supervision
// ============================================================

#[rstest]
fn given_layer_when_restarting_then_service_runs_until_stopped(fixture: Fixture) {
    // Arrange
    fixture
        .container
        .add_layer("svc", &service_layer("sleeper", "sleep 30"), true)
        .unwrap();

    // Act
    fixture.container.restart(&["sleeper"]).unwrap();

    // Assert
    assert_eq!(
        fixture.container.get_service("sleeper").unwrap().current,
        ServiceStatus::Active
    );
    let pid_file = fixture.root.path().join("var/lib/supervisor/services/sleeper.pid");
    assert!(pid_file.exists());

    fixture.container.stop(&["sleeper"]).unwrap();
    assert_eq!(
        fixture.container.get_service("sleeper").unwrap().current,
        ServiceStatus::Inactive
    );
    assert!(!pid_file.exists());
}

#[rstest]
fn given_running_service_when_new_instance_queries_then_state_shared(fixture: Fixture) {
    // Arrange
    fixture
        .container
        .add_layer("svc", &service_layer("sleeper", "sleep 30"), true)
        .unwrap();
    fixture.container.start(&["sleeper"]).unwrap();

    // Act
    let other = container_at(fixture.root.path());

    // Assert
    assert_eq!(other.plan().unwrap().services.len(), 1);
    assert_eq!(other.get_service("sleeper").unwrap().current, ServiceStatus::Active);
    other.stop(&["sleeper"]).unwrap();
    assert_eq!(
        wait_for_status(&fixture.container, "sleeper", ServiceStatus::Error),
        ServiceStatus::Error
    );
}

#[rstest]
fn given_service_of_other_instance_when_stopped_then_returns_before_timeout(fixture: Fixture) {
    // Arrange: the fixture holds the child and never reaps it, so it lingers as a zombie
    fixture
        .container
        .add_layer("svc", &service_layer("sleeper", "sleep 30"), true)
        .unwrap();
    fixture.container.start(&["sleeper"]).unwrap();
    let other = container_at(fixture.root.path());

    // Act
    let started = Instant::now();
    other.stop(&["sleeper"]).unwrap();
    let elapsed = started.elapsed();

    // Assert
    assert!(elapsed < Duration::from_secs(1), "stop took {elapsed:?}");
    assert_eq!(other.get_service("sleeper").unwrap().current, ServiceStatus::Inactive);
}

#[rstest]
fn given_exited_unreaped_service_when_other_instance_queries_then_not_active(fixture: Fixture) {
    // Arrange
    fixture
        .container
        .add_layer("svc", &service_layer("sleeper", "sleep 30"), true)
        .unwrap();
    fixture.container.start(&["sleeper"]).unwrap();
    let pid = std::fs::read_to_string(
        fixture.root.path().join("var/lib/supervisor/services/sleeper.pid"),
    )
    .unwrap();
    let pid = nix::unistd::Pid::from_raw(pid.trim().parse().unwrap());
    nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL).unwrap();
    let other = container_at(fixture.root.path());

    // Act
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut current = other.get_service("sleeper").unwrap().current;
    while current == ServiceStatus::Active && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
        current = other.get_service("sleeper").unwrap().current;
    }

    // Assert
    assert_eq!(current, ServiceStatus::Inactive);
}

/// Real filesystem that refuses to record pid files.
struct PidWriteFails;

impl FileSystem for PidWriteFails {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        RealFileSystem.read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        if path.extension().is_some_and(|ext| ext == "pid") {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only state dir"));
        }
        RealFileSystem.write(path, content)
    }

    fn append(&self, path: &Path, content: &str) -> io::Result<()> {
        RealFileSystem.append(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        RealFileSystem.exists(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        RealFileSystem.is_file(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        RealFileSystem.is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        RealFileSystem.create_dir_all(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        RealFileSystem.remove_file(path)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        RealFileSystem.ensure_parent(path)
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        RealFileSystem.chown(path, uid, gid)
    }
}

/// Whether any process on the host runs exactly `argv`.
fn process_running(argv: &[&str]) -> bool {
    let wanted: Vec<u8> = argv.iter().flat_map(|arg| arg.bytes().chain([0])).collect();
    std::fs::read_dir("/proc")
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().parse::<u32>().is_ok())
        .filter_map(|entry| std::fs::read(entry.path().join("cmdline")).ok())
        .any(|cmdline| cmdline == wanted)
}

#[test]
fn given_unwritable_pid_file_when_starting_then_error_and_no_process_left() {
    // Arrange
    init_test_setup();
    let root = TempDir::new().unwrap();
    let container = LocalContainer::with_deps(
        root.path(),
        STATE_DIR,
        Arc::new(PidWriteFails),
        Arc::new(RealCommandRunner),
    );
    container
        .add_layer("svc", &service_layer("orphan", "sleep 317"), true)
        .unwrap();

    // Act
    let result = container.start(&["orphan"]);

    // Assert
    assert!(matches!(result, Err(ContainerError::Io { .. })));
    assert!(!process_running(&["sleep", "317"]));
}

#[rstest]
fn given_failing_command_when_started_then_reports_error(fixture: Fixture) {
    fixture
        .container
        .add_layer("svc", &service_layer("broken", "false"), true)
        .unwrap();

    fixture.container.start(&["broken"]).unwrap();

    assert_eq!(
        wait_for_status(&fixture.container, "broken", ServiceStatus::Error),
        ServiceStatus::Error
    );
}

#[rstest]
fn given_service_output_when_running_then_appended_to_log(fixture: Fixture) {
    fixture
        .container
        .add_layer("svc", &service_layer("greeter", "echo hello-from-service"), true)
        .unwrap();

    fixture.container.start(&["greeter"]).unwrap();

    assert_eq!(
        wait_for_status(&fixture.container, "greeter", ServiceStatus::Inactive),
        ServiceStatus::Inactive
    );
    let log = std::fs::read_to_string(fixture.container.service_log("greeter")).unwrap();
    assert_eq!(log, "hello-from-service\n");
}

#[rstest]
fn given_unknown_service_when_starting_then_not_found(fixture: Fixture) {
    let result = fixture.container.start(&["ghost"]);

    assert!(matches!(result, Err(ContainerError::ServiceNotFound(name)) if name == "ghost"));
}

#[rstest]
fn given_conflicting_label_when_adding_without_combine_then_rejected(fixture: Fixture) {
    let layer = service_layer("sleeper", "sleep 30");
    fixture.container.add_layer("svc", &layer, false).unwrap();

    let result = fixture.container.add_layer("svc", &layer, false);

    assert!(matches!(result, Err(ContainerError::Layer(_))));
}
