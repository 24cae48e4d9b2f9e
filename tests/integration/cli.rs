#[path = "common/mod.rs"]
mod common;

use std::fs;

use assert_cmd::Command;
use common::{is_process_alive, kill_quietly, mark_installed, read_pid, write_sleepy_config};
use dynamite::component::Component;
use predicates::prelude::*;
use tempfile::tempdir;

fn dynamite() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("dynamite"))
}

#[test]
fn help_lists_component_groups() {
    dynamite()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("agent"))
        .stdout(predicate::str::contains("lab"))
        .stdout(predicate::str::contains("elasticsearch"));
}

#[test]
fn status_of_empty_root_is_empty_object() {
    let temp = tempdir().expect("failed to create tempdir");

    dynamite()
        .arg("--root")
        .arg(temp.path())
        .args(["agent", "status"])
        .assert()
        .success()
        .stdout(predicate::str::diff("{}\n"));
}

#[test]
fn declined_uninstall_exits_cleanly() {
    let temp = tempdir().expect("failed to create tempdir");
    let spec = mark_installed(temp.path(), Component::Lab);

    dynamite()
        .arg("--root")
        .arg(temp.path())
        .args(["lab", "uninstall"])
        .write_stdin("maybe\nno\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exiting"))
        .stderr(predicate::str::contains("Are you sure you wish to continue? ([no]|yes): ").count(2));

    assert!(spec.install_dir.exists());
}

#[test]
fn confirmed_uninstall_removes_component() {
    let temp = tempdir().expect("failed to create tempdir");
    let spec = mark_installed(temp.path(), Component::Elasticsearch);

    dynamite()
        .arg("--root")
        .arg(temp.path())
        .args(["elasticsearch", "uninstall"])
        .write_stdin("yes\n")
        .assert()
        .success();

    assert!(!spec.install_dir.exists());
    assert!(!spec.config_dir.exists());
}

#[test]
fn agent_install_without_dependencies_exits_cleanly() {
    let temp = tempdir().expect("failed to create tempdir");

    dynamite()
        .arg("--root")
        .arg(temp.path())
        .args(["agent", "install", "-i", "eth0"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Agent dependencies were not installed. Install with 'dynamite agent-dependencies install'",
        ));
}

#[test]
fn dry_run_prints_plan_without_side_effects() {
    let temp = tempdir().expect("failed to create tempdir");
    mark_installed(temp.path(), Component::Filebeat);

    let output = dynamite()
        .arg("--root")
        .arg(temp.path())
        .args(["--dry-run", "agent", "install", "-i", "eth0", "--analyzers", "suricata"])
        .output()
        .expect("failed to run dynamite");
    assert!(output.status.success());

    let plan: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("dry run should print JSON");
    assert_eq!(plan["name"], "agent_install");
    let ops: Vec<&str> = plan["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|step| step["op"].as_str().unwrap())
        .collect();
    assert_eq!(
        ops,
        vec!["check_agent_dependencies", "message", "message", "install", "message", "message"]
    );
    assert_eq!(plan["steps"][3]["component"], "suricata");
    assert_eq!(plan["steps"][3]["settings"]["interfaces"][0], "eth0");
}

#[test]
fn start_status_stop_round_trip() {
    let temp = tempdir().expect("failed to create tempdir");
    let root = temp.path();
    let config = write_sleepy_config(root);
    let spec = mark_installed(root, Component::Lab);

    dynamite()
        .arg("--config")
        .arg(&config)
        .args(["lab", "start", "--status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"running\": true"));

    let pid = read_pid(&spec.pid_file);
    assert!(is_process_alive(pid));

    dynamite()
        .arg("--config")
        .arg(&config)
        .args(["lab", "status", "--table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lab"))
        .stdout(predicate::str::contains(pid.to_string()));

    let stop = dynamite()
        .arg("--config")
        .arg(&config)
        .args(["lab", "stop"])
        .output()
        .expect("failed to run dynamite");
    if !stop.status.success() {
        kill_quietly(pid);
        panic!("stop failed: {}", String::from_utf8_lossy(&stop.stderr));
    }
    assert!(!spec.pid_file.exists());
}

#[test]
fn invalid_settings_file_fails() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = temp.path().join("dynamite.yaml");
    fs::write(&config, "timing:\n  stop_poll_interval: soon\n").unwrap();

    dynamite()
        .arg("--config")
        .arg(&config)
        .args(["agent", "status"])
        .assert()
        .failure();
}
