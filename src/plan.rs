//! Planning functions that decide which steps a strategy contains.
//!
//! Install state is read once, through [`Inventory`], when the plan is built. The
//! resulting [`Strategy`] is inert data until executed.
use crate::component::{CaptureSettings, Component, ComponentSpec};
use crate::constants::{ELASTICSEARCH_HEAP_GIGS, JUPYTERHUB_PORT};
use crate::install::{ComponentSettings, LabSettings};
use crate::profile::Inventory;
use crate::runtime::Layout;
use crate::strategy::{InstallPlan, Operation, ResultFormat, Strategy};

/// Components making up the agent, in start order.
pub const AGENT_COMPONENTS: [Component; 3] =
    [Component::Filebeat, Component::Zeek, Component::Suricata];

/// Options for [`agent_install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInstallOptions {
    /// Interfaces Zeek and Suricata capture on.
    pub capture_interfaces: Vec<String>,
    /// Where Filebeat ships events (`host:port`).
    pub forward_targets: Vec<String>,
    /// Which analyzers to install: a subset of Zeek and Suricata.
    pub analyzers: Vec<Component>,
    /// Tag identifying this agent in shipped events.
    pub agent_tag: Option<String>,
}

/// Options for [`lab_install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabInstallOptions {
    pub settings: LabSettings,
    /// Probe Elasticsearch before installing.
    pub check_elasticsearch: bool,
}

fn capture(interfaces: &[String]) -> ComponentSettings {
    ComponentSettings::Capture(CaptureSettings {
        interfaces: interfaces.to_vec(),
    })
}

/// Log files Filebeat should ship for the selected analyzers.
pub fn monitored_paths(layout: &Layout, analyzers: &[Component]) -> Vec<String> {
    let mut paths = Vec::new();
    if analyzers.contains(&Component::Zeek) {
        let zeek = ComponentSpec::new(Component::Zeek, layout);
        paths.push(
            zeek.install_dir
                .join("logs/current/*.log")
                .to_string_lossy()
                .into_owned(),
        );
    }
    if analyzers.contains(&Component::Suricata) {
        let suricata = ComponentSpec::new(Component::Suricata, layout);
        paths.push(
            suricata
                .log_dir
                .join("eve.json")
                .to_string_lossy()
                .into_owned(),
        );
    }
    paths
}

/// Agent components that are currently installed, Filebeat always included.
fn agent_members(inventory: &dyn Inventory) -> Vec<Component> {
    AGENT_COMPONENTS
        .into_iter()
        .filter(|&c| c == Component::Filebeat || inventory.is_installed(c))
        .collect()
}

fn push_status(strategy: &mut Strategy, components: Vec<Component>) {
    strategy.add_step(Operation::Status { components }, ResultFormat::Json);
}

pub fn agent_install(
    layout: &Layout,
    inventory: &dyn Inventory,
    options: &AgentInstallOptions,
) -> Strategy {
    let mut strategy = Strategy::new(
        "agent_install",
        "Install Zeek and/or Suricata along with Filebeat.",
    );
    strategy.then(Operation::CheckAgentDependencies);

    if inventory.is_installed(Component::Filebeat) {
        strategy.message("Skipping Filebeat installation; already installed");
    } else {
        strategy.then(Operation::Install(InstallPlan {
            component: Component::Filebeat,
            download_archive: true,
            settings: ComponentSettings::Filebeat {
                forward_targets: options.forward_targets.clone(),
                monitored_paths: monitored_paths(layout, &options.analyzers),
                agent_tag: options.agent_tag.clone(),
            },
        }));
    }

    for analyzer in [Component::Zeek, Component::Suricata] {
        if options.analyzers.contains(&analyzer) && !inventory.is_installed(analyzer) {
            strategy.then(Operation::Install(InstallPlan {
                component: analyzer,
                download_archive: true,
                settings: capture(&options.capture_interfaces),
            }));
        } else {
            strategy.message(format!("Skipping {} installation.", analyzer.title()));
        }
    }

    strategy
        .message("*** Agent installed successfully. ***")
        .message("Next, start your agent: 'dynamite agent start'.");
    strategy
}

pub fn agent_uninstall(inventory: &dyn Inventory, prompt_user: bool) -> Strategy {
    let mut strategy = Strategy::new("agent_uninstall", "Uninstall Agent.");
    let installed: Vec<Component> = AGENT_COMPONENTS
        .into_iter()
        .filter(|&c| inventory.is_installed(c))
        .collect();

    if prompt_user {
        strategy.then(Operation::ConfirmUninstall {
            components: installed,
        });
    }

    for component in agent_members(inventory) {
        strategy
            .then(Operation::Uninstall { component })
            .then(Operation::RemoveArchive { component });
    }

    strategy.message("*** Agent uninstalled successfully. ***");
    strategy
}

pub fn agent_start(inventory: &dyn Inventory, status: bool) -> Strategy {
    let mut strategy = Strategy::new("agent_start", "Start Agent processes.");
    for component in agent_members(inventory) {
        strategy.then(Operation::Start { component });
    }
    if status {
        push_status(&mut strategy, AGENT_COMPONENTS.to_vec());
    }
    strategy
}

pub fn agent_stop(inventory: &dyn Inventory, status: bool) -> Strategy {
    let mut strategy = Strategy::new("agent_stop", "Stop Agent processes.");
    for component in agent_members(inventory) {
        strategy.then(Operation::Stop { component });
    }
    if status {
        push_status(&mut strategy, AGENT_COMPONENTS.to_vec());
    }
    strategy
}

pub fn agent_restart(inventory: &dyn Inventory, status: bool) -> Strategy {
    let mut strategy = Strategy::new("agent_restart", "Restart Agent processes.");
    for component in agent_members(inventory) {
        strategy
            .then(Operation::Stop { component })
            .then(Operation::Start { component });
    }
    if status {
        push_status(&mut strategy, AGENT_COMPONENTS.to_vec());
    }
    strategy
}

pub fn agent_status() -> Strategy {
    let mut strategy = Strategy::new("agent_status", "Get the status of the Agent processes.");
    push_status(&mut strategy, AGENT_COMPONENTS.to_vec());
    strategy
}

pub fn lab_install(options: &LabInstallOptions) -> Strategy {
    let lab = &options.settings;
    let mut strategy = Strategy::new(
        "lab_install",
        "Install DynamiteLab (DynamiteSDK and JupyterHub).",
    );

    if options.check_elasticsearch {
        strategy.then(Operation::CheckElasticsearch {
            host: lab.elasticsearch_host.clone(),
            port: lab.elasticsearch_port,
        });
    }

    strategy
        .then(Operation::Install(InstallPlan {
            component: Component::Lab,
            download_archive: true,
            settings: ComponentSettings::Lab(lab.clone()),
        }))
        .then(Operation::Stop {
            component: Component::Lab,
        })
        .message("*** Lab installed successfully. ***")
        .message(format!(
            "Next, start DynamiteLab: 'dynamite lab start'. It will be available at: {}:{} once started.",
            lab.jupyterhub_host, JUPYTERHUB_PORT
        ));
    strategy
}

/// Heap size used when none is given.
pub fn default_heap_size() -> u32 {
    ELASTICSEARCH_HEAP_GIGS
}

/// Installs Elasticsearch with `heap_size_gigs` of JVM heap and `password` as the
/// bootstrap password of the `elastic` user.
pub fn elasticsearch_install(heap_size_gigs: u32, password: &str) -> Strategy {
    let mut strategy = Strategy::new(
        "elasticsearch_install",
        "Install and secure Elasticsearch.",
    );
    strategy
        .then(Operation::Install(InstallPlan {
            component: Component::Elasticsearch,
            download_archive: true,
            settings: ComponentSettings::Elasticsearch {
                heap_size_gigs,
                password: password.to_string(),
            },
        }))
        .message("*** Elasticsearch installed successfully. ***")
        .message("Next, start Elasticsearch: 'dynamite elasticsearch start'.");
    strategy
}

/// Uninstall plan for a single-process group (lab, elasticsearch).
pub fn single_uninstall(component: Component, prompt_user: bool) -> Strategy {
    let mut strategy = Strategy::new(
        format!("{component}_uninstall"),
        format!("Uninstall {}.", component.title()),
    );
    if prompt_user {
        strategy.then(Operation::ConfirmUninstall {
            components: vec![component],
        });
    }
    strategy
        .then(Operation::Uninstall { component })
        .then(Operation::RemoveArchive { component })
        .message(format!("*** {} uninstalled successfully. ***", component.title()));
    strategy
}

pub fn single_start(component: Component, status: bool) -> Strategy {
    let mut strategy = Strategy::new(
        format!("{component}_start"),
        format!("Start {} process.", component.title()),
    );
    strategy.then(Operation::Start { component });
    if status {
        push_status(&mut strategy, vec![component]);
    }
    strategy
}

pub fn single_stop(component: Component, status: bool) -> Strategy {
    let mut strategy = Strategy::new(
        format!("{component}_stop"),
        format!("Stop {} process.", component.title()),
    );
    strategy.then(Operation::Stop { component });
    if status {
        push_status(&mut strategy, vec![component]);
    }
    strategy
}

pub fn single_restart(component: Component, status: bool) -> Strategy {
    let mut strategy = Strategy::new(
        format!("{component}_restart"),
        format!("Restart {} process.", component.title()),
    );
    strategy
        .then(Operation::Stop { component })
        .then(Operation::Start { component });
    if status {
        push_status(&mut strategy, vec![component]);
    }
    strategy
}

pub fn single_status(component: Component) -> Strategy {
    let mut strategy = Strategy::new(
        format!("{component}_status"),
        format!("Get the status of the {} process.", component.title()),
    );
    push_status(&mut strategy, vec![component]);
    strategy
}
