//! Lifecycle tests against real `sleep` processes.

#[path = "common/mod.rs"]
mod common;

use std::{fs, sync::Arc, time::Duration};

use common::{is_process_alive, kill_quietly, read_pid, sleepy_settings, wait_for_process_exit};
use dynamite::{
    component::{Component, ComponentSpec},
    process::{ProcessManager, StartOutcome, StopOutcome, SystemProcesses},
    runtime::Layout,
};
use tempfile::tempdir;

#[test]
fn start_twice_yields_one_process() {
    let temp = tempdir().expect("failed to create tempdir");
    let root = temp.path();
    let settings = sleepy_settings(root);
    let spec = ComponentSpec::new(Component::Filebeat, &Layout::rooted(root));

    let mut manager =
        ProcessManager::for_component(&spec, &settings, Arc::new(SystemProcesses)).unwrap();
    let StartOutcome::Started(pid) = manager.start().unwrap() else {
        panic!("expected a fresh start");
    };
    assert!(is_process_alive(pid));
    assert_eq!(read_pid(&spec.pid_file), pid);

    let mut second =
        ProcessManager::for_component(&spec, &settings, Arc::new(SystemProcesses)).unwrap();
    let outcome = second.start().unwrap();
    assert_eq!(outcome, StartOutcome::AlreadyRunning(pid));

    let stopped = second.stop();
    if stopped.is_err() {
        kill_quietly(pid);
    }
    assert!(matches!(stopped.unwrap(), StopOutcome::Stopped { .. }));
    wait_for_process_exit(pid);
    assert!(!spec.pid_file.exists());
}

#[test]
fn child_output_goes_to_console_log() {
    let temp = tempdir().expect("failed to create tempdir");
    let root = temp.path();
    let mut settings = sleepy_settings(root);
    settings.components.get_mut(&Component::Zeek).unwrap().command = Some("sh".into());
    settings.components.get_mut(&Component::Zeek).unwrap().args =
        Some(vec!["-c".into(), "echo capture-started; exec sleep 30".into()]);
    let spec = ComponentSpec::new(Component::Zeek, &Layout::rooted(root));

    let mut manager =
        ProcessManager::for_component(&spec, &settings, Arc::new(SystemProcesses)).unwrap();
    let StartOutcome::Started(pid) = manager.start().unwrap() else {
        panic!("expected a fresh start");
    };

    let log = spec.console_log();
    common::wait_for_path(&log);
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !fs::read_to_string(&log).unwrap_or_default().contains("capture-started") {
        assert!(std::time::Instant::now() < deadline, "console log never written");
        std::thread::sleep(Duration::from_millis(50));
    }

    let stopped = manager.stop();
    if stopped.is_err() {
        kill_quietly(pid);
    }
    stopped.unwrap();
}

#[test]
fn stop_with_stale_pid_file_does_not_signal() {
    let temp = tempdir().expect("failed to create tempdir");
    let root = temp.path();
    let settings = sleepy_settings(root);
    let spec = ComponentSpec::new(Component::Suricata, &Layout::rooted(root));

    // Spawn and reap a short-lived process so its pid is known to be dead.
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let dead_pid = child.id();
    child.wait().unwrap();

    fs::create_dir_all(&spec.run_dir).unwrap();
    fs::write(&spec.pid_file, format!("{dead_pid}\n")).unwrap();

    let mut manager =
        ProcessManager::for_component(&spec, &settings, Arc::new(SystemProcesses)).unwrap();
    assert_eq!(manager.stop().unwrap(), StopOutcome::NotRunning);
    assert!(!spec.pid_file.exists());
}

#[test]
fn missing_binary_is_a_spawn_failure() {
    let temp = tempdir().expect("failed to create tempdir");
    let root = temp.path();
    let mut settings = sleepy_settings(root);
    settings.components.remove(&Component::Elasticsearch);
    let spec = ComponentSpec::new(Component::Elasticsearch, &Layout::rooted(root));

    let mut manager =
        ProcessManager::for_component(&spec, &settings, Arc::new(SystemProcesses)).unwrap();
    let err = manager.start().unwrap_err();
    assert!(matches!(err, dynamite::error::NsmError::SpawnFailed { .. }));
    assert!(!spec.pid_file.exists());
}
