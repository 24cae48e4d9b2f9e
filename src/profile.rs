//! Install-state detection.
use std::sync::Arc;

use crate::component::{Component, ComponentSpec};
use crate::config::Settings;
use crate::error::NsmError;
use crate::process::{ProcessControl, ProcessManager, ProcessStatus};
use crate::runtime::Layout;

/// Answers what is installed and how installed components are doing.
pub trait Inventory {
    /// Returns whether every install marker of `component` is present.
    fn is_installed(&self, component: Component) -> bool;

    /// Reports the process status of `component`.
    fn process_status(&self, component: Component) -> Result<ProcessStatus, NsmError>;
}

/// [`Inventory`] reading the real filesystem and process table.
pub struct SystemInventory {
    layout: Layout,
    settings: Settings,
    control: Arc<dyn ProcessControl>,
}

impl SystemInventory {
    pub fn new(layout: Layout, settings: Settings, control: Arc<dyn ProcessControl>) -> Self {
        Self {
            layout,
            settings,
            control,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }
}

impl Inventory for SystemInventory {
    fn is_installed(&self, component: Component) -> bool {
        ComponentSpec::new(component, &self.layout)
            .install_markers()
            .iter()
            .all(|marker| marker.exists())
    }

    fn process_status(&self, component: Component) -> Result<ProcessStatus, NsmError> {
        let spec = ComponentSpec::new(component, &self.layout);
        ProcessManager::for_component(&spec, &self.settings, self.control.clone())?.status()
    }
}
