//! Filebeat configuration editor.
//!
//! `filebeat.yml` is treated as plain text rather than YAML: only three lines are
//! understood (the originating agent tag, the forward `hosts:` list and the monitored
//! `paths:` list), located by substring match. Every other line, comments included,
//! is carried through a rewrite byte for byte.
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::error::NsmError;

/// Config file name inside the Filebeat install directory.
pub const FILEBEAT_CONFIG_NAME: &str = "filebeat.yml";

const AGENT_TAG_KEY: &str = "\"originating_agent_tag\"";
const HOSTS_KEY: &str = "hosts:";
const PATHS_KEY: &str = "paths:";

/// The three line kinds the editor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigKey {
    AgentTag,
    Hosts,
    Paths,
}

impl ConfigKey {
    /// Classifies a line (without its terminator). Comments and lines without a key
    /// separator never match.
    fn classify(line: &str) -> Option<Self> {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') || !line.contains(':') {
            return None;
        }

        if trimmed.starts_with(AGENT_TAG_KEY) {
            Some(Self::AgentTag)
        } else if line.contains(HOSTS_KEY) {
            Some(Self::Hosts)
        } else if line.contains(PATHS_KEY) {
            Some(Self::Paths)
        } else {
            None
        }
    }

    fn token(&self) -> &'static str {
        match self {
            Self::AgentTag => AGENT_TAG_KEY,
            Self::Hosts => HOSTS_KEY,
            Self::Paths => PATHS_KEY,
        }
    }
}

/// Splits a line produced by `split_inclusive('\n')` into content and terminator.
fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, "\n")
    } else {
        (line, "")
    }
}

/// Formats a list the way the shipped templates spell it: `["a", "b"]`.
fn format_list(items: &[String]) -> Result<String, NsmError> {
    let quoted = items
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("[{}]", quoted.join(", ")))
}

/// In-memory view of the three editable Filebeat settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilebeatConfig {
    path: PathBuf,
    agent_tag: Option<String>,
    forward_targets: Option<Vec<String>>,
    monitored_paths: Option<Vec<String>>,
}

impl FilebeatConfig {
    /// Loads `filebeat.yml` from a Filebeat install directory.
    pub fn from_install_dir(install_dir: &Path) -> Result<Self, NsmError> {
        Self::load(install_dir.join(FILEBEAT_CONFIG_NAME))
    }

    /// Loads the settings from `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, NsmError> {
        let path = path.into();
        let content = fs::read_to_string(&path).map_err(|source| NsmError::FileRead {
            path: path.clone(),
            source,
        })?;

        let mut config = Self {
            path,
            agent_tag: None,
            forward_targets: None,
            monitored_paths: None,
        };

        for (index, raw) in content.split_inclusive('\n').enumerate() {
            let (line, _) = split_terminator(raw);
            let Some(key) = ConfigKey::classify(line) else {
                continue;
            };

            match key {
                ConfigKey::AgentTag => {
                    config.agent_tag = Some(Self::parse_tag(line));
                }
                ConfigKey::Hosts => {
                    config.forward_targets = Some(config.parse_list(line, key, index)?);
                }
                ConfigKey::Paths => {
                    config.monitored_paths = Some(config.parse_list(line, key, index)?);
                }
            }
        }

        debug!(
            "Loaded Filebeat config {} (tag: {:?}, targets: {:?}, paths: {:?})",
            config.path.display(),
            config.agent_tag,
            config.forward_targets,
            config.monitored_paths
        );

        Ok(config)
    }

    fn parse_tag(line: &str) -> String {
        let value = line
            .split_once(':')
            .map(|(_, value)| value.trim())
            .unwrap_or_default();

        if value.starts_with('"')
            && let Ok(decoded) = serde_json::from_str::<String>(value)
        {
            return decoded;
        }

        value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value)
            .to_string()
    }

    fn parse_list(
        &self,
        line: &str,
        key: ConfigKey,
        index: usize,
    ) -> Result<Vec<String>, NsmError> {
        let literal = line
            .split_once(key.token())
            .map(|(_, value)| value.trim())
            .unwrap_or_default();

        serde_json::from_str::<Vec<String>>(literal).map_err(|err| {
            NsmError::MalformedConfigLine {
                path: self.path.clone(),
                line: index + 1,
                reason: err.to_string(),
            }
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tag associating shipped events with the originating agent.
    pub fn agent_tag(&self) -> Option<&str> {
        self.agent_tag.as_deref()
    }

    /// Sets the agent tag.
    pub fn set_agent_tag(&mut self, tag: impl Into<String>) {
        self.agent_tag = Some(tag.into());
    }

    /// Destinations (`host:port`) events are shipped to.
    pub fn forward_targets(&self) -> Option<&[String]> {
        self.forward_targets.as_deref()
    }

    /// Replaces the forward targets, e.g. `["192.168.0.9:5044"]`.
    pub fn set_forward_targets(&mut self, targets: Vec<String>) {
        self.forward_targets = Some(targets);
    }

    /// Log files or glob patterns Filebeat monitors.
    pub fn monitored_paths(&self) -> Option<&[String]> {
        self.monitored_paths.as_deref()
    }

    /// Replaces the monitored paths; `*` wildcards are accepted.
    pub fn set_monitored_paths(&mut self, paths: Vec<String>) {
        self.monitored_paths = Some(paths);
    }

    /// Renders `source` with every recognised line replaced by the in-memory value.
    ///
    /// Lines whose field is unset, and all unrecognised lines, are returned verbatim.
    /// The indentation before each key and the line terminator are preserved.
    pub fn render(&self, source: &str) -> Result<String, NsmError> {
        let mut output = String::with_capacity(source.len());

        for raw in source.split_inclusive('\n') {
            let (line, terminator) = split_terminator(raw);
            let replacement = match ConfigKey::classify(line) {
                Some(key) => self.render_line(line, key)?,
                None => None,
            };

            match replacement {
                Some(rendered) => {
                    output.push_str(&rendered);
                    output.push_str(terminator);
                }
                None => output.push_str(raw),
            }
        }

        Ok(output)
    }

    fn render_line(&self, line: &str, key: ConfigKey) -> Result<Option<String>, NsmError> {
        let prefix = match line.find(key.token()) {
            Some(offset) => &line[..offset],
            None => return Ok(None),
        };

        let rendered = match key {
            ConfigKey::AgentTag => self
                .agent_tag
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?
                .map(|tag| format!("{prefix}{AGENT_TAG_KEY}: {tag}")),
            ConfigKey::Hosts => self
                .forward_targets
                .as_deref()
                .map(format_list)
                .transpose()?
                .map(|list| format!("{prefix}{HOSTS_KEY} {list}")),
            ConfigKey::Paths => self
                .monitored_paths
                .as_deref()
                .map(format_list)
                .transpose()?
                .map(|list| format!("{prefix}{PATHS_KEY} {list}")),
        };

        Ok(rendered)
    }

    /// Rewrites the backing file in place with the current values.
    ///
    /// The file is re-read first so edits made since `load` to unrelated lines survive.
    /// The write is not atomic.
    pub fn write(&self) -> Result<(), NsmError> {
        let source = fs::read_to_string(&self.path).map_err(|source| NsmError::FileRead {
            path: self.path.clone(),
            source,
        })?;
        let rendered = self.render(&source)?;
        fs::write(&self.path, rendered)?;
        debug!("Wrote Filebeat config {}", self.path.display());
        Ok(())
    }
}
