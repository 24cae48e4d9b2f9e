//! Runs strategy operations against the real system.
use serde_json::Value;
use std::{
    net::{TcpStream, ToSocketAddrs},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, info, warn};

use crate::component::{Component, ComponentSpec};
use crate::config::Settings;
use crate::constants::{AGENT_ENVIRONMENT_MARKER, SOCKET_CHECK_TIMEOUT};
use crate::error::NsmError;
use crate::install::{Fetcher, Installer};
use crate::process::{ProcessControl, ProcessManager, StartOutcome, StopOutcome};
use crate::profile::SystemInventory;
use crate::prompt::{Prompter, confirm_continue, confirm_uninstall};
use crate::runtime::Layout;
use crate::status;
use crate::strategy::{Executor, InstallPlan, Operation};

/// Returns whether a TCP connection to `host:port` succeeds within `timeout`.
pub fn check_socket(host: &str, port: u16, timeout: Duration) -> bool {
    let addrs = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(err) => {
            debug!("Could not resolve {host}:{port}: {err}");
            return false;
        }
    };

    addrs
        .into_iter()
        .any(|addr| TcpStream::connect_timeout(&addr, timeout).is_ok())
}

/// [`Executor`] that touches the filesystem, the network and real processes.
pub struct SystemExecutor {
    layout: Layout,
    settings: Settings,
    control: Arc<dyn ProcessControl>,
    fetcher: Box<dyn Fetcher>,
    prompter: Box<dyn Prompter>,
}

impl SystemExecutor {
    pub fn new(
        layout: Layout,
        settings: Settings,
        control: Arc<dyn ProcessControl>,
        fetcher: Box<dyn Fetcher>,
        prompter: Box<dyn Prompter>,
    ) -> Self {
        Self {
            layout,
            settings,
            control,
            fetcher,
            prompter,
        }
    }

    fn spec(&self, component: Component) -> ComponentSpec {
        ComponentSpec::new(component, &self.layout)
    }

    fn manager(&self, component: Component) -> Result<ProcessManager, NsmError> {
        ProcessManager::for_component(&self.spec(component), &self.settings, self.control.clone())
    }

    fn check_agent_dependencies(&self) -> Result<(), NsmError> {
        let marker = self.layout.config_root().join(AGENT_ENVIRONMENT_MARKER);
        if marker.exists() {
            return Ok(());
        }
        Err(NsmError::MissingDependency(
            "Agent dependencies were not installed. Install with 'dynamite agent-dependencies install'"
                .to_string(),
        ))
    }

    fn check_elasticsearch(&mut self, host: &str, port: u16) -> Result<(), NsmError> {
        if check_socket(host, port, SOCKET_CHECK_TIMEOUT) {
            debug!("Elasticsearch reachable on {host}:{port}");
            return Ok(());
        }

        warn!("Elasticsearch does not appear to be started on: {host}:{port}.");
        if confirm_continue(self.prompter.as_mut())? {
            Ok(())
        } else {
            Err(NsmError::Declined)
        }
    }

    fn confirm_uninstall(&mut self, components: &[Component]) -> Result<(), NsmError> {
        let names: Vec<&str> = components.iter().map(Component::title).collect();
        warn!(
            "WARNING! This will remove the following installed components: [{}]",
            names.join(", ")
        );
        if confirm_uninstall(self.prompter.as_mut())? {
            Ok(())
        } else {
            Err(NsmError::Declined)
        }
    }

    fn install(&self, plan: &InstallPlan) -> Result<(), NsmError> {
        Installer::new(self.fetcher.as_ref()).install(
            &self.spec(plan.component),
            &plan.settings,
            plan.download_archive,
        )
    }

    fn uninstall(&self, component: Component) -> Result<(), NsmError> {
        let spec = self.spec(component);
        if spec.install_dir.exists() {
            self.manager(component)?.stop()?;
        }
        Installer::new(self.fetcher.as_ref()).uninstall(&spec)
    }

    fn start(&self, component: Component) -> Result<(), NsmError> {
        match self.manager(component)?.start()? {
            StartOutcome::Started(pid) => debug!("{component} running as {pid}"),
            StartOutcome::AlreadyRunning(pid) => debug!("{component} already running as {pid}"),
        }
        Ok(())
    }

    fn stop(&self, component: Component) -> Result<(), NsmError> {
        if let StopOutcome::Stopped { attempts } = self.manager(component)?.stop()? {
            debug!("{component} stopped after {attempts} signal(s)");
        }
        Ok(())
    }

    fn status(&self, components: &[Component]) -> Result<Value, NsmError> {
        let inventory = SystemInventory::new(
            self.layout.clone(),
            self.settings.clone(),
            self.control.clone(),
        );
        let report = status::aggregate(&inventory, components)?;
        Ok(serde_json::to_value(report)?)
    }
}

impl Executor for SystemExecutor {
    fn run(&mut self, operation: &Operation) -> Result<Option<Value>, NsmError> {
        match operation {
            Operation::CheckAgentDependencies => self.check_agent_dependencies()?,
            Operation::CheckElasticsearch { host, port } => self.check_elasticsearch(host, *port)?,
            Operation::ConfirmUninstall { components } => self.confirm_uninstall(components)?,
            Operation::Install(plan) => self.install(plan)?,
            Operation::Uninstall { component } => self.uninstall(*component)?,
            Operation::RemoveArchive { component } => {
                Installer::new(self.fetcher.as_ref()).remove_archive(&self.spec(*component))?;
            }
            Operation::Start { component } => self.start(*component)?,
            Operation::Stop { component } => self.stop(*component)?,
            Operation::Status { components } => return self.status(components).map(Some),
            Operation::Message { text } => info!("{text}"),
        }
        Ok(None)
    }
}
