//! Integration tests covering PID file tracking across start, restart and stop.

#[path = "common/mod.rs"]
mod common;

use std::{fs, io::Cursor, sync::Arc, time::Duration};

use common::{
    is_process_alive, kill_quietly, mark_installed, read_pid, sleepy_settings,
    wait_for_process_exit,
};
use dynamite::{
    component::Component,
    executor::SystemExecutor,
    install::HttpFetcher,
    plan,
    process::{PidFile, SystemProcesses},
    profile::SystemInventory,
    prompt::LinePrompter,
    runtime::Layout,
    strategy::Strategy,
};
use tempfile::tempdir;

fn run(root: &std::path::Path, strategy: &Strategy) -> serde_json::Map<String, serde_json::Value> {
    let mut executor = SystemExecutor::new(
        Layout::rooted(root),
        sleepy_settings(root),
        Arc::new(SystemProcesses),
        Box::new(HttpFetcher::new(Duration::from_secs(1))),
        Box::new(LinePrompter::new(Cursor::new(Vec::new()), Vec::new())),
    );
    strategy.execute(&mut executor).expect("strategy failed")
}

fn inventory(root: &std::path::Path) -> SystemInventory {
    SystemInventory::new(
        Layout::rooted(root),
        sleepy_settings(root),
        Arc::new(SystemProcesses),
    )
}

#[test]
fn restart_records_a_new_pid() {
    let temp = tempdir().expect("failed to create tempdir");
    let root = temp.path();
    let filebeat = mark_installed(root, Component::Filebeat);
    let zeek = mark_installed(root, Component::Zeek);

    run(root, &plan::agent_start(&inventory(root), false));
    let first_filebeat = read_pid(&filebeat.pid_file);
    let first_zeek = read_pid(&zeek.pid_file);
    assert!(is_process_alive(first_filebeat));
    assert!(is_process_alive(first_zeek));

    let report = run(root, &plan::agent_restart(&inventory(root), true));
    let second_filebeat = read_pid(&filebeat.pid_file);
    let second_zeek = read_pid(&zeek.pid_file);

    assert_ne!(first_filebeat, second_filebeat);
    assert_ne!(first_zeek, second_zeek);
    wait_for_process_exit(first_filebeat);
    wait_for_process_exit(first_zeek);
    assert_eq!(report["zeek"]["pid"], serde_json::json!(second_zeek));
    assert!(report.get("suricata").is_none());

    run(root, &plan::agent_stop(&inventory(root), false));
    for pid in [second_filebeat, second_zeek] {
        if is_process_alive(pid) {
            kill_quietly(pid);
            panic!("PID {pid} survived agent stop");
        }
    }
    assert!(!filebeat.pid_file.exists());
    assert!(!zeek.pid_file.exists());
}

#[test]
fn garbage_pid_file_is_replaced_on_start() {
    let temp = tempdir().expect("failed to create tempdir");
    let root = temp.path();
    let lab = mark_installed(root, Component::Lab);
    fs::create_dir_all(&lab.run_dir).unwrap();
    fs::write(&lab.pid_file, "not-a-pid").unwrap();

    run(root, &plan::single_start(Component::Lab, false));
    let pid = PidFile::new(&lab.pid_file).read().expect("pid recorded");
    assert!(is_process_alive(pid));

    run(root, &plan::single_stop(Component::Lab, false));
    wait_for_process_exit(pid);
    assert_eq!(PidFile::new(&lab.pid_file).read(), None);
}

#[test]
fn stop_without_pid_file_is_a_noop() {
    let temp = tempdir().expect("failed to create tempdir");
    let root = temp.path();
    mark_installed(root, Component::Elasticsearch);

    let report = run(root, &plan::single_stop(Component::Elasticsearch, true));
    assert_eq!(report["elasticsearch"]["running"], serde_json::json!(false));
    assert_eq!(report["elasticsearch"]["pid"], serde_json::Value::Null);
}
