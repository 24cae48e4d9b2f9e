#![allow(dead_code)]

use std::{
    fs,
    path::Path,
    thread,
    time::{Duration, Instant},
};

use dynamite::{
    component::{Component, ComponentSpec},
    config::{LaunchOverride, ProcessTiming, Settings},
    runtime::Layout,
};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Settings with no start delay and a fast stop poll, launching `sleep` for every component.
pub fn sleepy_settings(root: &Path) -> Settings {
    let mut settings = Settings {
        root: Some(root.to_path_buf()),
        timing: ProcessTiming {
            start_grace_period: Duration::ZERO,
            stop_poll_interval: Duration::from_millis(100),
            ..ProcessTiming::default()
        },
        ..Settings::default()
    };

    for component in [
        Component::Filebeat,
        Component::Zeek,
        Component::Suricata,
        Component::Elasticsearch,
        Component::Lab,
    ] {
        settings.components.insert(
            component,
            LaunchOverride {
                command: Some("sleep".into()),
                args: Some(vec!["30".into()]),
            },
        );
    }
    settings
}

/// Writes the settings file used by CLI tests.
pub fn write_sleepy_config(root: &Path) -> std::path::PathBuf {
    let path = root.join("dynamite.yaml");
    fs::write(
        &path,
        format!(
            r#"root: "{}"
timing:
  start_grace_period: 0ms
  stop_poll_interval: 100ms
components:
  filebeat:
    command: sleep
    args: ["30"]
  zeek:
    command: sleep
    args: ["30"]
  suricata:
    command: sleep
    args: ["30"]
  elasticsearch:
    command: sleep
    args: ["30"]
  lab:
    command: sleep
    args: ["30"]
"#,
            root.display()
        ),
    )
    .expect("failed to write settings");
    path
}

/// Creates the install markers so the component counts as installed.
pub fn mark_installed(root: &Path, component: Component) -> ComponentSpec {
    let spec = ComponentSpec::new(component, &Layout::rooted(root));
    fs::create_dir_all(&spec.install_dir).expect("failed to create install dir");
    fs::create_dir_all(&spec.config_dir).expect("failed to create config dir");
    fs::write(spec.primary_config(), "").expect("failed to write primary config");
    spec
}

pub fn wait_for_path(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }
    panic!("Timed out waiting for {:?} to exist", path);
}

pub fn read_pid(path: &Path) -> u32 {
    fs::read_to_string(path)
        .expect("failed to read pid file")
        .trim()
        .parse()
        .expect("pid file should hold an integer")
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            let state_start = stat.rfind(')')?;
            stat[state_start + 1..].trim().chars().next()
        })
        .is_some_and(|state| state == 'Z' || state == 'X')
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: u32) -> bool {
    false
}

pub fn is_process_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system.process(Pid::from_u32(pid)).is_some() && !is_zombie(pid)
}

pub fn wait_for_process_exit(pid: u32) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if !is_process_alive(pid) {
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }
    panic!("Timed out waiting for PID {} to exit", pid);
}

/// Kills a stray test process so failures do not leak `sleep` children.
pub fn kill_quietly(pid: u32) {
    let _ = nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGKILL,
    );
}
