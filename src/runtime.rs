//! Runtime directory layout.
use std::path::{Path, PathBuf};

use crate::constants::{
    CONFIG_ROOT, DEFAULT_CONFIGS, INSTALL_CACHE, INSTALL_ROOT, LOG_ROOT, MIRRORS,
    RUN_ROOT,
};

/// Where installs, configs, logs, PID files and caches live.
///
/// Every path hangs off a single `root` so that tests (and `--root`) can relocate the
/// whole appliance into a scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    install_root: PathBuf,
    config_root: PathBuf,
    log_root: PathBuf,
    run_root: PathBuf,
    install_cache: PathBuf,
    default_configs: PathBuf,
    mirrors: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self::system()
    }
}

impl Layout {
    /// Standard system directories (`/opt/dynamite`, `/etc/dynamite`, ...).
    pub fn system() -> Self {
        Self::rooted(Path::new("/"))
    }

    /// Same structure as [`Layout::system`] but nested under `root`.
    pub fn rooted(root: &Path) -> Self {
        let join = |absolute: &str| root.join(absolute.trim_start_matches('/'));
        Self {
            root: root.to_path_buf(),
            install_root: join(INSTALL_ROOT),
            config_root: join(CONFIG_ROOT),
            log_root: join(LOG_ROOT),
            run_root: join(RUN_ROOT),
            install_cache: join(INSTALL_CACHE),
            default_configs: join(DEFAULT_CONFIGS),
            mirrors: join(MIRRORS),
        }
    }

    /// Prefix applied to every directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parent of every component install directory.
    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Parent of every component config directory.
    pub fn config_root(&self) -> &Path {
        &self.config_root
    }

    /// Parent of every component log directory.
    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    /// Parent of every component PID directory.
    pub fn run_root(&self) -> &Path {
        &self.run_root
    }

    /// Download and extraction scratch space.
    pub fn install_cache(&self) -> &Path {
        &self.install_cache
    }

    /// Template configuration files.
    pub fn default_configs(&self) -> &Path {
        &self.default_configs
    }

    /// Mirror list directory.
    pub fn mirrors(&self) -> &Path {
        &self.mirrors
    }
}
