//! Catalogue of the managed components and the paths derived for each of them.
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::config::LaunchOverride;
use crate::constants::{
    ELASTICSEARCH_ARCHIVE_NAME, ELASTICSEARCH_DIRECTORY_NAME, FILEBEAT_ARCHIVE_NAME,
    FILEBEAT_DIRECTORY_NAME, LAB_ARCHIVE_NAME, LAB_DIRECTORY_NAME,
    SURICATA_ARCHIVE_NAME, SURICATA_DIRECTORY_NAME, ZEEK_ARCHIVE_NAME,
    ZEEK_DIRECTORY_NAME,
};
use crate::error::NsmError;
use crate::filebeat::FILEBEAT_CONFIG_NAME;
use crate::process::LaunchSpec;
use crate::runtime::Layout;

/// Name of the file recording capture interfaces for the packet analyzers.
pub const CAPTURE_FILE_NAME: &str = "capture.yml";

/// One of the third-party components dynamite manages.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Component {
    /// Log shipper forwarding analyzer output.
    Filebeat,
    /// Packet-analysis engine.
    Zeek,
    /// Intrusion-detection engine.
    Suricata,
    /// Search and index engine.
    Elasticsearch,
    /// JupyterHub notebook environment with the DynamiteSDK.
    Lab,
}

impl Component {
    /// Human-facing name used in operator messages.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Filebeat => "Filebeat",
            Self::Zeek => "Zeek",
            Self::Suricata => "Suricata",
            Self::Elasticsearch => "Elasticsearch",
            Self::Lab => "DynamiteLab",
        }
    }

    /// File name of the release archive in the install cache.
    pub fn archive_name(&self) -> &'static str {
        match self {
            Self::Filebeat => FILEBEAT_ARCHIVE_NAME,
            Self::Zeek => ZEEK_ARCHIVE_NAME,
            Self::Suricata => SURICATA_ARCHIVE_NAME,
            Self::Elasticsearch => ELASTICSEARCH_ARCHIVE_NAME,
            Self::Lab => LAB_ARCHIVE_NAME,
        }
    }

    /// Directory the release archive extracts into.
    pub fn directory_name(&self) -> &'static str {
        match self {
            Self::Filebeat => FILEBEAT_DIRECTORY_NAME,
            Self::Zeek => ZEEK_DIRECTORY_NAME,
            Self::Suricata => SURICATA_DIRECTORY_NAME,
            Self::Elasticsearch => ELASTICSEARCH_DIRECTORY_NAME,
            Self::Lab => LAB_DIRECTORY_NAME,
        }
    }
}

/// Capture interfaces recorded for Zeek and Suricata at install time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Network interfaces to sniff.
    pub interfaces: Vec<String>,
}

impl CaptureSettings {
    /// Reads the capture file, returning empty settings when it does not exist.
    pub fn load(path: &Path) -> Result<Self, NsmError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| NsmError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Writes the capture file.
    pub fn save(&self, path: &Path) -> Result<(), NsmError> {
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }
}

/// Every path dynamite touches for one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    /// The component described.
    pub component: Component,
    /// Where the payload is installed.
    pub install_dir: PathBuf,
    /// Where configuration lives. Filebeat keeps its config inside the install dir.
    pub config_dir: PathBuf,
    /// Where the component and its console output log.
    pub log_dir: PathBuf,
    /// Directory holding the PID file.
    pub run_dir: PathBuf,
    /// File holding the process id.
    pub pid_file: PathBuf,
    /// List of download URLs.
    pub mirror_list: PathBuf,
    /// Downloaded archive location.
    pub archive_path: PathBuf,
    /// Extracted payload location.
    pub payload_dir: PathBuf,
    /// Template configuration files copied at setup.
    pub template_dir: PathBuf,
}

impl ComponentSpec {
    /// Derives the paths for `component` from `layout`.
    pub fn new(component: Component, layout: &Layout) -> Self {
        let name = component.as_ref();
        let install_dir = layout.install_root().join(name);
        let config_dir = match component {
            Component::Filebeat => install_dir.clone(),
            _ => layout.config_root().join(name),
        };
        let run_dir = layout.run_root().join(name);

        Self {
            component,
            pid_file: run_dir.join(format!("{name}.pid")),
            run_dir,
            log_dir: layout.log_root().join(name),
            mirror_list: layout.mirrors().join(name),
            archive_path: layout.install_cache().join(component.archive_name()),
            payload_dir: layout.install_cache().join(component.directory_name()),
            template_dir: layout.default_configs().join(name),
            install_dir,
            config_dir,
        }
    }

    /// The configuration file written during setup; its presence marks an install.
    pub fn primary_config(&self) -> PathBuf {
        match self.component {
            Component::Filebeat => self.install_dir.join(FILEBEAT_CONFIG_NAME),
            Component::Zeek | Component::Suricata => {
                self.config_dir.join(CAPTURE_FILE_NAME)
            }
            Component::Elasticsearch => self.config_dir.join("jvm.options"),
            Component::Lab => self.config_dir.join("dynamite_sdk.yml"),
        }
    }

    /// Paths that must all exist for the component to count as installed.
    pub fn install_markers(&self) -> [PathBuf; 2] {
        [self.install_dir.clone(), self.primary_config()]
    }

    /// File receiving the detached child's stdout and stderr.
    pub fn console_log(&self) -> PathBuf {
        self.log_dir.join("console.log")
    }

    /// Builds the command used to launch the component.
    pub fn launch(
        &self,
        launch_override: Option<&LaunchOverride>,
    ) -> Result<LaunchSpec, NsmError> {
        let mut spec = LaunchSpec {
            program: PathBuf::new(),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: self.install_dir.clone(),
            log_file: Some(self.console_log()),
        };

        match self.component {
            Component::Filebeat => {
                spec.program = self.install_dir.join("filebeat");
                spec.args = vec![
                    "-c".into(),
                    self.primary_config().to_string_lossy().into_owned(),
                ];
            }
            Component::Zeek => {
                let capture = CaptureSettings::load(&self.primary_config())?;
                spec.program = self.install_dir.join("bin/zeek");
                spec.args.push("-C".into());
                for interface in capture.interfaces {
                    spec.args.push("-i".into());
                    spec.args.push(interface);
                }
                spec.args.push("local".into());
                spec.working_dir = self.log_dir.clone();
            }
            Component::Suricata => {
                let capture = CaptureSettings::load(&self.primary_config())?;
                spec.program = self.install_dir.join("bin/suricata");
                spec.args = vec![
                    "-c".into(),
                    self.config_dir
                        .join("suricata.yaml")
                        .to_string_lossy()
                        .into_owned(),
                    "-l".into(),
                    self.log_dir.to_string_lossy().into_owned(),
                ];
                spec.args.extend(
                    capture
                        .interfaces
                        .iter()
                        .map(|interface| format!("--af-packet={interface}")),
                );
            }
            Component::Elasticsearch => {
                spec.program = self.install_dir.join("bin/elasticsearch");
                spec.env.push((
                    "ES_PATH_CONF".into(),
                    self.config_dir.to_string_lossy().into_owned(),
                ));
            }
            Component::Lab => {
                spec.program = self.install_dir.join("bin/jupyterhub");
                spec.args = vec![
                    "-f".into(),
                    self.config_dir
                        .join("jupyterhub_config.py")
                        .to_string_lossy()
                        .into_owned(),
                ];
            }
        }

        if let Some(custom) = launch_override {
            if let Some(command) = &custom.command {
                spec.program = PathBuf::from(command);
            }
            if let Some(args) = &custom.args {
                spec.args = args.clone();
            }
        }

        Ok(spec)
    }
}
