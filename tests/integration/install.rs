//! End-to-end installs from a local archive through the mirror list.

#[path = "common/mod.rs"]
mod common;

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};

use dynamite::{
    component::{CaptureSettings, Component, ComponentSpec},
    error::NsmError,
    executor::SystemExecutor,
    filebeat::FilebeatConfig,
    install::{BOOTSTRAP_PASSWORD_FILE_NAME, Fetcher, Installer},
    plan::{self, AgentInstallOptions},
    profile::{Inventory, SystemInventory},
    prompt::LinePrompter,
    runtime::Layout,
    test_utils::FakeProcesses,
};
use flate2::{Compression, write::GzEncoder};
use tempfile::tempdir;

const FILEBEAT_YML: &str = "\
filebeat.inputs:
- type: log
  enabled: true
  paths: []
fields_under_root: true
fields:
  \"originating_agent_tag\": \"unset\"
output.logstash:
  # hosts: [\"example:5044\"]
  hosts: [\"localhost:5044\"]
";

/// Serves `file://`-style mirrors: the URL path is copied from local disk.
struct LocalFetcher;

impl Fetcher for LocalFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), NsmError> {
        let source = url.strip_prefix("file://").ok_or_else(|| NsmError::Download {
            url: url.to_string(),
            reason: "unsupported scheme".into(),
        })?;
        fs::create_dir_all(dest.parent().unwrap())?;
        fs::copy(source, dest).map_err(|err| NsmError::Download {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        Ok(())
    }
}

fn build_archive(path: &Path, root: &str, files: &[(&str, &str)]) {
    let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, body) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{root}/{name}"), body.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

fn publish(root: &Path, component: Component, files: &[(&str, &str)]) -> PathBuf {
    let spec = ComponentSpec::new(component, &Layout::rooted(root));
    let archive = root.join("published").join(component.archive_name());
    fs::create_dir_all(archive.parent().unwrap()).unwrap();
    build_archive(&archive, component.directory_name(), files);

    fs::create_dir_all(spec.mirror_list.parent().unwrap()).unwrap();
    fs::write(
        &spec.mirror_list,
        format!(
            "# mirrors\nfile://{}/missing.tar.gz\nfile://{}\n",
            root.display(),
            archive.display()
        ),
    )
    .unwrap();
    archive
}

#[test]
fn agent_install_lays_out_filebeat_and_zeek() {
    let temp = tempdir().expect("failed to create tempdir");
    let root = temp.path();
    let layout = Layout::rooted(root);

    fs::create_dir_all(layout.config_root()).unwrap();
    fs::write(layout.config_root().join(".agent_environment_prepared"), "").unwrap();
    publish(
        root,
        Component::Filebeat,
        &[("filebeat", "#!/bin/sh\n"), ("filebeat.yml", FILEBEAT_YML)],
    );
    publish(root, Component::Zeek, &[("bin/zeek", "#!/bin/sh\n")]);

    let control = Arc::new(FakeProcesses::default());
    let inventory = SystemInventory::new(layout.clone(), Default::default(), control.clone());
    let strategy = plan::agent_install(
        &layout,
        &inventory,
        &AgentInstallOptions {
            capture_interfaces: vec!["eth1".into()],
            forward_targets: vec!["10.1.1.1:5044".into(), "10.1.1.2:5044".into()],
            analyzers: vec![Component::Zeek],
            agent_tag: Some("edge-7".into()),
        },
    );

    let mut executor = SystemExecutor::new(
        layout.clone(),
        Default::default(),
        control,
        Box::new(LocalFetcher),
        Box::new(LinePrompter::new(std::io::Cursor::new(Vec::new()), Vec::new())),
    );
    strategy.execute(&mut executor).expect("install failed");

    assert!(inventory.is_installed(Component::Filebeat));
    assert!(inventory.is_installed(Component::Zeek));
    assert!(!inventory.is_installed(Component::Suricata));

    let filebeat = ComponentSpec::new(Component::Filebeat, &layout);
    let config = FilebeatConfig::from_install_dir(&filebeat.install_dir).unwrap();
    assert_eq!(config.agent_tag(), Some("edge-7"));
    assert_eq!(
        config.forward_targets().unwrap(),
        ["10.1.1.1:5044", "10.1.1.2:5044"]
    );
    let expected_paths = [layout
        .install_root()
        .join("zeek/logs/current/*.log")
        .to_string_lossy()
        .into_owned()];
    assert_eq!(config.monitored_paths().unwrap(), expected_paths);

    let written = fs::read_to_string(filebeat.primary_config()).unwrap();
    assert!(written.contains("  # hosts: [\"example:5044\"]\n"));
    assert!(written.contains("fields_under_root: true\n"));

    let zeek = ComponentSpec::new(Component::Zeek, &layout);
    assert_eq!(
        CaptureSettings::load(&zeek.primary_config()).unwrap().interfaces,
        vec!["eth1"]
    );
}

#[test]
fn install_with_no_reachable_mirror_reports_missing_payload() {
    let temp = tempdir().expect("failed to create tempdir");
    let root = temp.path();
    let spec = ComponentSpec::new(Component::Elasticsearch, &Layout::rooted(root));
    fs::create_dir_all(spec.mirror_list.parent().unwrap()).unwrap();
    fs::write(&spec.mirror_list, "ftp://nowhere/es.tar.gz\n").unwrap();

    let err = Installer::new(&LocalFetcher)
        .install(
            &spec,
            &dynamite::install::ComponentSettings::Elasticsearch {
                heap_size_gigs: 2,
                password: "changeme".into(),
            },
            true,
        )
        .unwrap_err();
    assert!(matches!(err, NsmError::PayloadMissing { .. }));
    assert!(!spec.install_dir.exists());
}

#[test]
fn uninstall_then_reinstall_from_cache() {
    let temp = tempdir().expect("failed to create tempdir");
    let root = temp.path();
    let layout = Layout::rooted(root);
    publish(
        root,
        Component::Elasticsearch,
        &[("bin/elasticsearch", "#!/bin/sh\n"), ("config/jvm.options", "-Xms1g\n-Xmx1g\n")],
    );
    let spec = ComponentSpec::new(Component::Elasticsearch, &layout);
    let installer = Installer::new(&LocalFetcher);
    let settings = dynamite::install::ComponentSettings::Elasticsearch {
        heap_size_gigs: 6,
        password: "changeme".into(),
    };

    installer.install(&spec, &settings, true).unwrap();
    assert_eq!(
        fs::read_to_string(spec.primary_config()).unwrap(),
        "-Xms6g\n-Xmx6g\n"
    );
    assert!(spec.install_dir.join("bin/elasticsearch").is_file());
    assert_eq!(
        fs::read_to_string(spec.config_dir.join(BOOTSTRAP_PASSWORD_FILE_NAME)).unwrap(),
        "changeme\n"
    );

    installer.uninstall(&spec).unwrap();
    assert!(!spec.install_dir.exists());
    assert!(spec.archive_path.is_file());

    installer.install(&spec, &settings, false).unwrap();
    assert!(spec.install_dir.join("bin/elasticsearch").is_file());

    assert!(installer.remove_archive(&spec).unwrap());
    assert!(!spec.payload_dir.exists());
}
