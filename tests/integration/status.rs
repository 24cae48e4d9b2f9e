//! Status aggregation over a scratch install tree.

#[path = "common/mod.rs"]
mod common;

use std::sync::Arc;

use common::{kill_quietly, mark_installed, sleepy_settings};
use dynamite::{
    component::{Component, ComponentSpec},
    plan::AGENT_COMPONENTS,
    process::{ProcessManager, StartOutcome, SystemProcesses},
    profile::{Inventory, SystemInventory},
    runtime::Layout,
    status::aggregate,
};
use tempfile::tempdir;

#[test]
fn only_installed_components_are_reported() {
    let temp = tempdir().expect("failed to create tempdir");
    let root = temp.path();
    mark_installed(root, Component::Filebeat);
    mark_installed(root, Component::Suricata);

    let inventory = SystemInventory::new(
        Layout::rooted(root),
        sleepy_settings(root),
        Arc::new(SystemProcesses),
    );
    let report = aggregate(&inventory, &AGENT_COMPONENTS).unwrap();

    assert_eq!(
        report.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["filebeat", "suricata"]
    );
    assert!(report.values().all(|status| !status.running));
}

#[test]
fn running_component_reports_pid_and_details() {
    let temp = tempdir().expect("failed to create tempdir");
    let root = temp.path();
    let settings = sleepy_settings(root);
    mark_installed(root, Component::Elasticsearch);
    let spec = ComponentSpec::new(Component::Elasticsearch, &Layout::rooted(root));

    let mut manager =
        ProcessManager::for_component(&spec, &settings, Arc::new(SystemProcesses)).unwrap();
    let StartOutcome::Started(pid) = manager.start().unwrap() else {
        panic!("expected a fresh start");
    };

    let inventory = SystemInventory::new(
        Layout::rooted(root),
        settings.clone(),
        Arc::new(SystemProcesses),
    );
    assert!(inventory.is_installed(Component::Elasticsearch));
    let report = aggregate(&inventory, &[Component::Elasticsearch, Component::Lab]).unwrap();

    let stopped = manager.stop();
    if stopped.is_err() {
        kill_quietly(pid);
    }
    stopped.unwrap();

    let status = &report["elasticsearch"];
    assert!(status.running);
    assert_eq!(status.pid, Some(pid));
    assert!(status.started_at.is_some());
    assert!(!report.contains_key("lab"));
}
