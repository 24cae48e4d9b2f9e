//! Constants and default values shared across dynamite.

use std::time::Duration;

// ============================================================================
// File System Layout
// ============================================================================

/// Root under which component binaries are installed.
pub const INSTALL_ROOT: &str = "/opt/dynamite";

/// Root under which component configuration directories live.
pub const CONFIG_ROOT: &str = "/etc/dynamite";

/// Root under which component log directories live.
pub const LOG_ROOT: &str = "/var/log/dynamite";

/// Root under which PID files are stored.
pub const RUN_ROOT: &str = "/var/run/dynamite";

/// Scratch directory holding downloaded archives and their extracted payloads.
pub const INSTALL_CACHE: &str = "/tmp/dynamite/install_cache";

/// Directory holding template configuration files, one sub-directory per component.
pub const DEFAULT_CONFIGS: &str = "/tmp/dynamite/default_configs";

/// Directory holding mirror lists, one file per component.
pub const MIRRORS: &str = "/tmp/dynamite/mirrors";

/// Marker written once the agent's OS-level dependencies have been prepared.
pub const AGENT_ENVIRONMENT_MARKER: &str = ".agent_environment_prepared";

/// Settings file looked up when `--config` is not given.
pub const SETTINGS_FILE_NAME: &str = "dynamite.yaml";

// ============================================================================
// Archives
// ============================================================================

/// Filebeat release archive.
pub const FILEBEAT_ARCHIVE_NAME: &str = "filebeat-7.2.0-linux-x86_64.tar.gz";

/// Directory produced by extracting the Filebeat archive.
pub const FILEBEAT_DIRECTORY_NAME: &str = "filebeat-7.2.0-linux-x86_64";

/// Zeek release archive.
pub const ZEEK_ARCHIVE_NAME: &str = "zeek-3.0.0.tar.gz";

/// Directory produced by extracting the Zeek archive.
pub const ZEEK_DIRECTORY_NAME: &str = "zeek-3.0.0";

/// Suricata release archive.
pub const SURICATA_ARCHIVE_NAME: &str = "suricata-5.0.0.tar.gz";

/// Directory produced by extracting the Suricata archive.
pub const SURICATA_DIRECTORY_NAME: &str = "suricata-5.0.0";

/// Elasticsearch release archive.
pub const ELASTICSEARCH_ARCHIVE_NAME: &str = "elasticsearch-7.2.0-linux-x86_64.tar.gz";

/// Directory produced by extracting the Elasticsearch archive.
pub const ELASTICSEARCH_DIRECTORY_NAME: &str = "elasticsearch-7.2.0";

/// Lab (JupyterHub + DynamiteSDK) archive.
pub const LAB_ARCHIVE_NAME: &str = "dynamite-lab-0.4.0.tar.gz";

/// Directory produced by extracting the lab archive.
pub const LAB_DIRECTORY_NAME: &str = "dynamite-lab-0.4.0";

// ============================================================================
// Process Management Timing
// ============================================================================

/// Pause before `start` acts, letting a preceding stop settle.
pub const START_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Time allowed between a stop signal and the next liveness probe.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Maximum number of stop signals before giving up.
pub const STOP_MAX_ATTEMPTS: u32 = 10;

/// Number of SIGTERM attempts before escalating to SIGINT.
pub const INTERRUPT_AFTER_ATTEMPTS: u32 = 3;

/// Granularity of liveness polling inside `wait`.
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Per-mirror HTTP timeout.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for the Elasticsearch reachability check.
pub const SOCKET_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

// ============================================================================
// Defaults
// ============================================================================

/// JupyterHub listen port reported in the lab next-step hint.
pub const JUPYTERHUB_PORT: u16 = 8000;

/// Default Elasticsearch port.
pub const ELASTICSEARCH_PORT: u16 = 9200;

/// Default Elasticsearch heap size in GiB.
pub const ELASTICSEARCH_HEAP_GIGS: u32 = 4;

/// Password given to the built-in `elastic` user when none is supplied.
pub const DEFAULT_ELASTICSEARCH_PASSWORD: &str = "changeme";

/// Default Logstash/Beats forward target.
pub const DEFAULT_FORWARD_TARGET: &str = "localhost:5044";
