//! Settings file handling for dynamite.
use regex::Regex;
use serde::{Deserialize, Deserializer, de::Error as _};
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};

use crate::component::Component;
use crate::constants::{
    CONFIG_ROOT, DOWNLOAD_TIMEOUT, INTERRUPT_AFTER_ATTEMPTS, SETTINGS_FILE_NAME,
    START_GRACE_PERIOD, STOP_MAX_ATTEMPTS, STOP_POLL_INTERVAL,
};
use crate::error::NsmError;
use crate::runtime::Layout;

/// Represents the structure of the optional settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Prefix for every runtime directory.
    pub root: Option<PathBuf>,
    /// Process start/stop timings.
    pub timing: ProcessTiming,
    /// Mirror download behaviour.
    pub download: DownloadSettings,
    /// Per-component launch command overrides.
    pub components: BTreeMap<Component, LaunchOverride>,
}

impl Settings {
    /// Resolves the directory layout. An explicit root (from the CLI) wins over the file.
    pub fn layout(&self, root_override: Option<&Path>) -> Layout {
        match root_override.or(self.root.as_deref()) {
            Some(root) => Layout::rooted(root),
            None => Layout::system(),
        }
    }

    /// Launch override configured for `component`, if any.
    pub fn launch_override(&self, component: Component) -> Option<&LaunchOverride> {
        self.components.get(&component)
    }
}

/// Timings governing process start and stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProcessTiming {
    /// Pause before `start` probes and spawns.
    #[serde(deserialize_with = "deserialize_duration")]
    pub start_grace_period: Duration,
    /// Wait between a stop signal and the next probe.
    #[serde(deserialize_with = "deserialize_duration")]
    pub stop_poll_interval: Duration,
    /// Signals sent before reporting that the process did not terminate.
    pub stop_max_attempts: u32,
    /// SIGTERM attempts before escalating to SIGINT.
    pub interrupt_after: u32,
}

impl Default for ProcessTiming {
    fn default() -> Self {
        Self {
            start_grace_period: START_GRACE_PERIOD,
            stop_poll_interval: STOP_POLL_INTERVAL,
            stop_max_attempts: STOP_MAX_ATTEMPTS,
            interrupt_after: INTERRUPT_AFTER_ATTEMPTS,
        }
    }
}

/// Download configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// HTTP timeout applied to each mirror.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout: DOWNLOAD_TIMEOUT,
        }
    }
}

/// Replaces the built-in launch command of a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LaunchOverride {
    /// Executable to run instead of the bundled binary.
    pub command: Option<String>,
    /// Arguments replacing the built-in ones.
    pub args: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
        RawDuration::Text(raw) => parse_duration(&raw).map_err(D::Error::custom),
    }
}

/// Parses a user-facing duration string in the format `<number>[ms|s|m|h]`.
pub fn parse_duration(raw: &str) -> Result<Duration, NsmError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(NsmError::InvalidDuration(raw.to_string()));
    }

    if let Some(stripped) = value.strip_suffix("ms") {
        let millis: u64 = stripped
            .trim()
            .parse()
            .map_err(|_| NsmError::InvalidDuration(raw.to_string()))?;
        return Ok(Duration::from_millis(millis));
    }

    let (amount_str, multiplier) = if let Some(stripped) = value.strip_suffix('s') {
        (stripped.trim(), 1)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped.trim(), 60)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped.trim(), 3600)
    } else {
        (value, 1)
    };

    let amount: u64 = amount_str
        .parse()
        .map_err(|_| NsmError::InvalidDuration(raw.to_string()))?;

    Ok(Duration::from_secs(amount.saturating_mul(multiplier)))
}

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("valid env var pattern")
});

/// Expands `$VAR` and `${VAR}` references from the environment.
fn expand_env_vars(input: &str) -> Result<String, NsmError> {
    let mut missing = None;
    let result = ENV_VAR_PATTERN.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| var_name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var_name) => Err(NsmError::MissingEnvVar(var_name)),
        None => Ok(result.into_owned()),
    }
}

/// Candidate settings files, in lookup order, when `--config` is not given.
fn default_candidates(root: Option<&Path>) -> Vec<PathBuf> {
    let system = Path::new(CONFIG_ROOT).join(SETTINGS_FILE_NAME);
    let system = match root {
        Some(root) => root.join(system.strip_prefix("/").unwrap_or(&system)),
        None => system,
    };
    vec![system, PathBuf::from(SETTINGS_FILE_NAME)]
}

/// Loads the settings file, expanding environment variables.
///
/// An explicit path must exist. Without one the default locations are tried and
/// built-in defaults are used when none exists.
pub fn load_settings(
    explicit: Option<&Path>,
    root: Option<&Path>,
) -> Result<Settings, NsmError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_candidates(root).into_iter().find(|p| p.exists()) {
            Some(path) => path,
            None => return Ok(Settings::default()),
        },
    };

    let content = fs::read_to_string(&path).map_err(|source| NsmError::FileRead {
        path: path.clone(),
        source,
    })?;

    if content.trim().is_empty() {
        return Ok(Settings::default());
    }

    let expanded = expand_env_vars(&content)?;
    let settings: Settings = serde_yaml::from_str(&expanded)?;
    Ok(settings)
}
