//! Archive download, extraction and install layout.
use flate2::read::GzDecoder;
use serde::{Serialize, Serializer};
use std::{
    fs::{self, File},
    io::{self, ErrorKind, Read},
    os::unix::fs::{PermissionsExt, symlink},
    path::Path,
    time::Duration,
};
use tar::Archive;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::component::{CaptureSettings, ComponentSpec};
use crate::error::NsmError;
use crate::filebeat::FilebeatConfig;

/// File in the Elasticsearch config directory holding the bootstrap password of
/// the built-in `elastic` user.
pub const BOOTSTRAP_PASSWORD_FILE_NAME: &str = "bootstrap.password";

/// Retrieves a single URL into a local file.
pub trait Fetcher {
    /// Downloads `url` into `dest`, replacing any existing file.
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), NsmError>;
}

/// [`Fetcher`] over blocking HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher applying `timeout` to each request.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), NsmError> {
        let failed = |err: reqwest::Error| NsmError::Download {
            url: url.to_string(),
            reason: err.to_string(),
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(failed)?;
        let bytes = client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .map_err(failed)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, &bytes)?;
        debug!("Wrote {} bytes to {}", bytes.len(), dest.display());
        Ok(())
    }
}

fn redact<S: Serializer>(_secret: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("********")
}

/// Connection settings for the notebook lab and its SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabSettings {
    /// Host JupyterHub listens on.
    pub jupyterhub_host: String,
    /// JupyterHub admin password; redacted when serialized.
    #[serde(serialize_with = "redact")]
    pub jupyterhub_password: String,
    /// Elasticsearch host the SDK queries.
    pub elasticsearch_host: String,
    /// Elasticsearch HTTP port.
    pub elasticsearch_port: u16,
    /// Password of the `elastic` user; redacted when serialized.
    #[serde(serialize_with = "redact")]
    pub elasticsearch_password: String,
}

/// The file the SDK reads; unlike [`LabSettings`] it carries the real secrets.
#[derive(Serialize)]
struct SdkFile<'a> {
    jupyterhub_host: &'a str,
    jupyterhub_password: &'a str,
    elasticsearch_host: &'a str,
    elasticsearch_port: u16,
    elasticsearch_password: &'a str,
}

impl<'a> From<&'a LabSettings> for SdkFile<'a> {
    fn from(settings: &'a LabSettings) -> Self {
        Self {
            jupyterhub_host: &settings.jupyterhub_host,
            jupyterhub_password: &settings.jupyterhub_password,
            elasticsearch_host: &settings.elasticsearch_host,
            elasticsearch_port: settings.elasticsearch_port,
            elasticsearch_password: &settings.elasticsearch_password,
        }
    }
}

/// Component-specific configuration applied at the end of setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentSettings {
    /// Written into `filebeat.yml` through [`FilebeatConfig`].
    Filebeat {
        forward_targets: Vec<String>,
        monitored_paths: Vec<String>,
        agent_tag: Option<String>,
    },
    /// Capture interfaces for Zeek or Suricata.
    Capture(CaptureSettings),
    /// JVM heap and bootstrap password for Elasticsearch.
    Elasticsearch {
        heap_size_gigs: u32,
        #[serde(serialize_with = "redact")]
        password: String,
    },
    /// Lab and SDK connection details.
    Lab(LabSettings),
}

/// Downloads, unpacks and lays out component installs.
pub struct Installer<'a> {
    fetcher: &'a dyn Fetcher,
}

impl<'a> Installer<'a> {
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self { fetcher }
    }

    /// Tries each URL of `mirror_list` in order and stops at the first success.
    ///
    /// Returns the URL that worked, or `None` once every mirror has failed.
    pub fn download(&self, mirror_list: &Path, dest: &Path) -> Result<Option<String>, NsmError> {
        let mirrors = fs::read_to_string(mirror_list).map_err(|source| NsmError::FileRead {
            path: mirror_list.to_path_buf(),
            source,
        })?;

        let urls = mirrors
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));

        for url in urls {
            info!("Downloading {url}");
            match self.fetcher.fetch(url, dest) {
                Ok(()) => {
                    info!("Downloaded {} from {url}", dest.display());
                    return Ok(Some(url.to_string()));
                }
                Err(err) => warn!("Failed to download from {url}: {err}"),
            }
        }

        error!(
            "Unable to download {} from any mirror in {}",
            dest.display(),
            mirror_list.display()
        );
        Ok(None)
    }

    /// Unpacks a `.tar.gz`/`.tgz` (or plain `.tar`) archive into `dest`.
    ///
    /// Failures are logged and reported as `false`.
    pub fn extract(&self, archive: &Path, dest: &Path) -> bool {
        match unpack(archive, dest) {
            Ok(()) => {
                info!("Extracted {} into {}", archive.display(), dest.display());
                true
            }
            Err(err) => {
                error!("Failed to extract {}: {err}", archive.display());
                false
            }
        }
    }

    /// Copies the extracted payload and templates into place and applies `settings`.
    pub fn setup(&self, spec: &ComponentSpec, settings: &ComponentSettings) -> Result<(), NsmError> {
        if !spec.payload_dir.is_dir() {
            return Err(NsmError::PayloadMissing {
                component: spec.component,
                path: spec.payload_dir.clone(),
            });
        }

        for dir in [&spec.install_dir, &spec.config_dir, &spec.log_dir] {
            fs::create_dir_all(dir)?;
        }

        info!("Copying {} to {}", spec.payload_dir.display(), spec.install_dir.display());
        copy_tree(&spec.payload_dir, &spec.install_dir)?;

        if spec.template_dir.is_dir() {
            info!("Copying default configurations to {}", spec.config_dir.display());
            copy_tree(&spec.template_dir, &spec.config_dir)?;
        } else {
            warn!(
                "No default configurations found at {}; keeping the configuration shipped with {}",
                spec.template_dir.display(),
                spec.component.title()
            );
        }

        apply_settings(spec, settings)
    }

    /// Full install: optional download, extraction of the cached archive, then setup.
    pub fn install(
        &self,
        spec: &ComponentSpec,
        settings: &ComponentSettings,
        download_archive: bool,
    ) -> Result<(), NsmError> {
        let title = spec.component.title();
        info!("Installing {title}");

        if download_archive {
            self.download(&spec.mirror_list, &spec.archive_path)?;
        }

        if spec.archive_path.is_file() {
            let cache = spec
                .payload_dir
                .parent()
                .unwrap_or_else(|| Path::new("."));
            self.extract(&spec.archive_path, cache);
        }

        self.setup(spec, settings)?;
        info!("{title} installed to {}", spec.install_dir.display());
        Ok(())
    }

    /// Removes the install, config, log and runtime directories.
    pub fn uninstall(&self, spec: &ComponentSpec) -> Result<(), NsmError> {
        info!("Uninstalling {}", spec.component.title());
        for dir in [&spec.install_dir, &spec.config_dir, &spec.log_dir, &spec.run_dir] {
            match fs::remove_dir_all(dir) {
                Ok(()) => debug!("Removed {}", dir.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Deletes the cached archive and extracted payload. Returns whether the archive existed.
    pub fn remove_archive(&self, spec: &ComponentSpec) -> Result<bool, NsmError> {
        if spec.payload_dir.is_dir() {
            fs::remove_dir_all(&spec.payload_dir)?;
        }
        match fs::remove_file(&spec.archive_path) {
            Ok(()) => {
                debug!("Removed {}", spec.archive_path.display());
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

fn unpack(archive: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    let file = File::open(archive)?;
    let name = archive.to_string_lossy();
    let reader: Box<dyn Read> = if name.ends_with(".gz") || name.ends_with(".tgz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Archive::new(reader).unpack(dest)
}

/// Mirrors `src` into `dest`. Symlinks are recreated as links, never followed.
fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            match fs::symlink_metadata(&target) {
                Ok(meta) if meta.is_dir() => fs::remove_dir_all(&target)?,
                Ok(_) => fs::remove_file(&target)?,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
            symlink(fs::read_link(entry.path())?, &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn apply_settings(spec: &ComponentSpec, settings: &ComponentSettings) -> Result<(), NsmError> {
    match settings {
        ComponentSettings::Filebeat {
            forward_targets,
            monitored_paths,
            agent_tag,
        } => {
            let mut config = FilebeatConfig::from_install_dir(&spec.install_dir)?;
            config.set_forward_targets(forward_targets.clone());
            config.set_monitored_paths(monitored_paths.clone());
            if let Some(tag) = agent_tag {
                config.set_agent_tag(tag.as_str());
            }
            config.write()
        }
        ComponentSettings::Capture(capture) => capture.save(&spec.primary_config()),
        ComponentSettings::Elasticsearch {
            heap_size_gigs,
            password,
        } => {
            set_heap_size(&spec.primary_config(), *heap_size_gigs)?;
            write_bootstrap_password(&spec.config_dir, password)
        }
        ComponentSettings::Lab(lab) => {
            let yaml = serde_yaml::to_string(&SdkFile::from(lab))?;
            fs::write(spec.primary_config(), yaml)?;
            Ok(())
        }
    }
}

/// Stores the `elastic` user's bootstrap password, readable by the owner only.
fn write_bootstrap_password(config_dir: &Path, password: &str) -> Result<(), NsmError> {
    let path = config_dir.join(BOOTSTRAP_PASSWORD_FILE_NAME);
    fs::write(&path, format!("{password}\n"))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    debug!("Wrote bootstrap password to {}", path.display());
    Ok(())
}

/// Rewrites the `-Xms`/`-Xmx` lines of `jvm.options`, appending them when absent.
fn set_heap_size(path: &Path, gigs: u32) -> Result<(), NsmError> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(NsmError::FileRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let min = format!("-Xms{gigs}g");
    let max = format!("-Xmx{gigs}g");
    let (mut saw_min, mut saw_max) = (false, false);

    let mut lines: Vec<String> = existing
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("-Xms") {
                saw_min = true;
                min.clone()
            } else if trimmed.starts_with("-Xmx") {
                saw_max = true;
                max.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !saw_min {
        lines.push(min);
    }
    if !saw_max {
        lines.push(max);
    }

    let mut rendered = lines.join("\n");
    rendered.push('\n');
    fs::write(path, rendered)?;
    Ok(())
}
