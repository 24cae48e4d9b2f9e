//! Command-line interface for dynamite.
use std::{path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::component::Component;
use crate::constants::{
    DEFAULT_ELASTICSEARCH_PASSWORD, DEFAULT_FORWARD_TARGET, ELASTICSEARCH_HEAP_GIGS,
    ELASTICSEARCH_PORT,
};
use crate::install::LabSettings;
use crate::plan::{self, AgentInstallOptions, LabInstallOptions};
use crate::profile::Inventory;
use crate::runtime::Layout;
use crate::strategy::Strategy;

/// Wrapper around `LevelFilter` so clap can parse log levels from either
/// string names ("info", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// String representation suitable for `RUST_LOG`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };

            return Ok(LogLevelArg(level));
        }

        let lowercase = trimmed.to_ascii_lowercase();
        let level = match lowercase.as_str() {
            "off" => Some(LevelFilter::OFF),
            "error" | "err" => Some(LevelFilter::ERROR),
            "warn" | "warning" => Some(LevelFilter::WARN),
            "info" | "information" => Some(LevelFilter::INFO),
            "debug" => Some(LevelFilter::DEBUG),
            "trace" => Some(LevelFilter::TRACE),
            _ => None,
        }
        .ok_or_else(|| format!("invalid log level '{trimmed}'"))?;

        Ok(LogLevelArg(level))
    }
}

fn parse_analyzer(value: &str) -> Result<Component, String> {
    match Component::from_str(value.trim().to_ascii_lowercase().as_str()) {
        Ok(component @ (Component::Zeek | Component::Suricata)) => Ok(component),
        _ => Err(format!(
            "invalid analyzer '{value}', must be one of: zeek, suricata"
        )),
    }
}

/// Command-line interface for dynamite.
#[derive(Parser)]
#[command(name = "dynamite", version, author)]
#[command(
    about = "Installs, configures and runs network security monitoring components",
    long_about = None
)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Path to the settings file (defaults to `/etc/dynamite/dynamite.yaml`, then `./dynamite.yaml`).
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Prefix applied to every install, config, log and runtime directory.
    #[arg(long, value_name = "DIR", global = true)]
    pub root: Option<PathBuf>,

    /// Print the planned strategy as JSON instead of executing it.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Component groups.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage the monitoring agent (Filebeat with Zeek and/or Suricata).
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },

    /// Manage DynamiteLab (JupyterHub and the DynamiteSDK).
    Lab {
        #[command(subcommand)]
        action: LabAction,
    },

    /// Manage Elasticsearch.
    Elasticsearch {
        #[command(subcommand)]
        action: ElasticsearchAction,
    },
}

/// Actions shared by every group.
#[derive(Subcommand)]
pub enum LifecycleAction {
    /// Remove the installed components.
    Uninstall {
        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },

    /// Start the processes.
    Start {
        /// Report status afterwards.
        #[arg(long)]
        status: bool,
    },

    /// Stop the processes.
    Stop {
        /// Report status afterwards.
        #[arg(long)]
        status: bool,
    },

    /// Stop then start the processes.
    Restart {
        /// Report status afterwards.
        #[arg(long)]
        status: bool,
    },

    /// Show the status of installed processes.
    Status {
        /// Print a table instead of JSON.
        #[arg(long)]
        table: bool,
    },
}

#[derive(Args)]
pub struct AgentInstallArgs {
    /// Network interface to capture on (repeatable).
    #[arg(short, long = "interface", value_name = "IFACE", required = true)]
    pub interfaces: Vec<String>,

    /// Where Filebeat forwards events, as `host:port` (repeatable).
    #[arg(short, long = "target", value_name = "HOST:PORT", default_value = DEFAULT_FORWARD_TARGET)]
    pub targets: Vec<String>,

    /// Analyzers to install.
    #[arg(
        short,
        long,
        value_delimiter = ',',
        value_parser = parse_analyzer,
        default_values_t = [Component::Zeek, Component::Suricata]
    )]
    pub analyzers: Vec<Component>,

    /// Tag identifying this agent in shipped events.
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Subcommand)]
pub enum AgentAction {
    /// Install Filebeat and the selected analyzers.
    Install(AgentInstallArgs),

    #[command(flatten)]
    Lifecycle(LifecycleAction),
}

#[derive(Args)]
pub struct LabInstallArgs {
    /// Host JupyterHub is reached on.
    #[arg(long, default_value = "localhost")]
    pub jupyterhub_host: String,

    /// Password for the JupyterHub admin user.
    #[arg(long, default_value = "changeme")]
    pub jupyterhub_password: String,

    /// Elasticsearch host the SDK queries.
    #[arg(long, default_value = "localhost")]
    pub elasticsearch_host: String,

    #[arg(long, default_value_t = ELASTICSEARCH_PORT)]
    pub elasticsearch_port: u16,

    #[arg(long, default_value = "changeme")]
    pub elasticsearch_password: String,

    /// Do not probe Elasticsearch before installing.
    #[arg(long)]
    pub skip_elasticsearch_check: bool,
}

#[derive(Subcommand)]
pub enum LabAction {
    /// Install JupyterHub and the DynamiteSDK.
    Install(LabInstallArgs),

    #[command(flatten)]
    Lifecycle(LifecycleAction),
}

#[derive(Subcommand)]
pub enum ElasticsearchAction {
    /// Install Elasticsearch.
    Install {
        /// JVM heap size in GiB.
        #[arg(long, default_value_t = ELASTICSEARCH_HEAP_GIGS)]
        heap_size: u32,

        /// Bootstrap password for the `elastic` user.
        #[arg(long, default_value = DEFAULT_ELASTICSEARCH_PASSWORD)]
        password: String,
    },

    #[command(flatten)]
    Lifecycle(LifecycleAction),
}

fn single(component: Component, action: &LifecycleAction) -> Strategy {
    match *action {
        LifecycleAction::Uninstall { yes } => plan::single_uninstall(component, !yes),
        LifecycleAction::Start { status } => plan::single_start(component, status),
        LifecycleAction::Stop { status } => plan::single_stop(component, status),
        LifecycleAction::Restart { status } => plan::single_restart(component, status),
        LifecycleAction::Status { .. } => plan::single_status(component),
    }
}

impl Commands {
    /// Builds the strategy for this command against the current install state.
    pub fn plan(&self, layout: &Layout, inventory: &dyn Inventory) -> Strategy {
        match self {
            Commands::Agent { action } => match action {
                AgentAction::Install(args) => plan::agent_install(
                    layout,
                    inventory,
                    &AgentInstallOptions {
                        capture_interfaces: args.interfaces.clone(),
                        forward_targets: args.targets.clone(),
                        analyzers: args.analyzers.clone(),
                        agent_tag: args.tag.clone(),
                    },
                ),
                AgentAction::Lifecycle(action) => match *action {
                    LifecycleAction::Uninstall { yes } => plan::agent_uninstall(inventory, !yes),
                    LifecycleAction::Start { status } => plan::agent_start(inventory, status),
                    LifecycleAction::Stop { status } => plan::agent_stop(inventory, status),
                    LifecycleAction::Restart { status } => plan::agent_restart(inventory, status),
                    LifecycleAction::Status { .. } => plan::agent_status(),
                },
            },
            Commands::Lab { action } => match action {
                LabAction::Install(args) => plan::lab_install(&LabInstallOptions {
                    settings: LabSettings {
                        jupyterhub_host: args.jupyterhub_host.clone(),
                        jupyterhub_password: args.jupyterhub_password.clone(),
                        elasticsearch_host: args.elasticsearch_host.clone(),
                        elasticsearch_port: args.elasticsearch_port,
                        elasticsearch_password: args.elasticsearch_password.clone(),
                    },
                    check_elasticsearch: !args.skip_elasticsearch_check,
                }),
                LabAction::Lifecycle(action) => single(Component::Lab, action),
            },
            Commands::Elasticsearch { action } => match action {
                ElasticsearchAction::Install {
                    heap_size,
                    password,
                } => plan::elasticsearch_install(*heap_size, password),
                ElasticsearchAction::Lifecycle(action) => {
                    single(Component::Elasticsearch, action)
                }
            },
        }
    }

    fn lifecycle(&self) -> Option<&LifecycleAction> {
        match self {
            Commands::Agent {
                action: AgentAction::Lifecycle(action),
            }
            | Commands::Lab {
                action: LabAction::Lifecycle(action),
            }
            | Commands::Elasticsearch {
                action: ElasticsearchAction::Lifecycle(action),
            } => Some(action),
            _ => None,
        }
    }

    /// Whether the report should be printed as a status table.
    pub fn wants_table(&self) -> bool {
        matches!(self.lifecycle(), Some(LifecycleAction::Status { table: true }))
    }
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
