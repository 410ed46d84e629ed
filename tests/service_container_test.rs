//! Tests for settings-driven wiring of the workload over a local container

use std::fs;
use std::path::Path;

use nix::unistd::{getegid, geteuid, Group, User};
use tempfile::TempDir;

use kafka_ui_workload::application::Workload;
use kafka_ui_workload::config::Settings;
use kafka_ui_workload::infrastructure::di::ServiceContainer;
use kafka_ui_workload::util::testing::init_test_setup;

/// Settings rooted at `root`, owned by the current user so writes succeed as root or not.
fn settings_for(root: &Path) -> Settings {
    let mut settings = Settings {
        container_root: root.to_path_buf(),
        ..Default::default()
    };
    settings.service.user = User::from_uid(geteuid()).unwrap().unwrap().name;
    settings.service.group = Group::from_gid(getegid()).unwrap().unwrap().name;
    settings
}

#[test]
fn given_local_root_when_setting_environment_then_file_written_under_root() {
    // Arrange
    init_test_setup();
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("etc")).unwrap();
    fs::write(temp.path().join("etc/environment"), "PATH=/usr/bin\n").unwrap();
    let services = ServiceContainer::new(settings_for(temp.path()));
    let workload = services.workload();

    // Act
    workload
        .set_environment(&["KAFKA_UI_PORT=8080".to_string()])
        .unwrap();

    // Assert
    assert_eq!(
        fs::read_to_string(temp.path().join("etc/environment")).unwrap(),
        "PATH=/usr/bin\nKAFKA_UI_PORT=8080\n"
    );
    assert_eq!(
        workload.read(Path::new("/etc/environment")).unwrap(),
        vec!["PATH=/usr/bin", "KAFKA_UI_PORT=8080", ""]
    );
}

#[test]
fn given_local_root_when_executing_then_runs_in_root() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let services = ServiceContainer::new(settings_for(temp.path()));
    let workload = services.workload();

    let output = workload
        .exec(&["sh".into(), "-c".into(), "echo ready".into()], None, None)
        .unwrap();

    assert_eq!(output, "ready\n");
    assert!(workload.installed());
}

#[test]
fn given_missing_root_when_probing_then_not_installed_and_not_active() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let mut settings = settings_for(&temp.path().join("absent"));
    settings.probe.attempts = 2;
    settings.probe.interval_ms = 1;
    let services = ServiceContainer::new(settings);
    let workload = services.workload();

    assert!(!workload.installed());
    assert!(!workload.active().unwrap());
}

#[test]
fn given_jvm_overrides_in_config_file_when_building_layer_then_command_reflects_them() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("workload.toml");
    fs::write(
        &config,
        r#"
[paths]
config_dir = "/srv/kafka-ui"

[jvm]
heap = "2G"
"#,
    )
    .unwrap();

    // Act
    let settings = Settings::load_from(None, Some(&config)).unwrap();
    let layer = ServiceContainer::new(settings).workload().layer();

    // Assert
    let command = layer.services["kafka-ui"].command.clone().unwrap();
    assert_eq!(
        command,
        "java -Dspring.config.additional-location=/srv/kafka-ui/application-local.yml --add-opens java.rmi/javax.rmi.ssl=ALL-UNNAMED -Xms2G -Xmx2G -XX:+UseG1GC -jar /opt/kafka-ui/libs/api-1.3.0.jar"
    );
    assert_eq!(layer.summary, "Kafka UI Layer");
}
