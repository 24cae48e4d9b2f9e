//! Strategy sequencer.
//!
//! A strategy is plain data: a name, a description and an ordered list of steps. Each
//! step names an [`Operation`] which an [`Executor`] carries out. Planning (which
//! steps to include) happens before execution in [`crate::plan`].
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::component::Component;
use crate::error::NsmError;
use crate::install::ComponentSettings;

/// How a step's return value is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFormat {
    /// Side effect only; any value is discarded.
    #[default]
    None,
    /// The value is merged into the strategy report.
    Json,
}

/// Everything needed to install one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallPlan {
    pub component: Component,
    /// Fetch the archive from the mirror list before extracting.
    pub download_archive: bool,
    pub settings: ComponentSettings,
}

/// A single unit of work within a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Fails with a missing-dependency error unless the agent environment was prepared.
    CheckAgentDependencies,
    /// Probes Elasticsearch and asks whether to continue when it is unreachable.
    CheckElasticsearch { host: String, port: u16 },
    /// Asks the operator to confirm removal of `components`.
    ConfirmUninstall { components: Vec<Component> },
    Install(InstallPlan),
    Uninstall { component: Component },
    RemoveArchive { component: Component },
    Start { component: Component },
    Stop { component: Component },
    /// Reports the status of the installed subset of `components`.
    Status { components: Vec<Component> },
    /// Prints an operator message.
    Message { text: String },
}

impl Operation {
    /// Short identifier used in logs, errors and non-object report entries.
    pub fn label(&self) -> String {
        match self {
            Self::CheckAgentDependencies => "check_agent_dependencies".to_string(),
            Self::CheckElasticsearch { .. } => "check_elasticsearch".to_string(),
            Self::ConfirmUninstall { .. } => "confirm_uninstall".to_string(),
            Self::Install(plan) => format!("install_{}", plan.component),
            Self::Uninstall { component } => format!("uninstall_{component}"),
            Self::RemoveArchive { component } => format!("remove_archive_{component}"),
            Self::Start { component } => format!("start_{component}"),
            Self::Stop { component } => format!("stop_{component}"),
            Self::Status { .. } => "status".to_string(),
            Self::Message { .. } => "message".to_string(),
        }
    }
}

/// An operation together with how its result is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    #[serde(flatten)]
    pub operation: Operation,
    pub format: ResultFormat,
}

/// Carries out operations. The production implementation lives in
/// [`crate::executor`]; tests substitute recorders.
pub trait Executor {
    /// Performs `operation`, returning a value for `json` steps.
    fn run(&mut self, operation: &Operation) -> Result<Option<Value>, NsmError>;
}

/// Merged values of a strategy's `json` steps.
pub type StrategyReport = Map<String, Value>;

/// A named, ordered sequence of steps for one lifecycle action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Strategy {
    name: String,
    description: String,
    steps: Vec<Step>,
}

impl Strategy {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Appends a step.
    pub fn add_step(&mut self, operation: Operation, format: ResultFormat) -> &mut Self {
        self.steps.push(Step { operation, format });
        self
    }

    /// Appends a side-effect-only step.
    pub fn then(&mut self, operation: Operation) -> &mut Self {
        self.add_step(operation, ResultFormat::None)
    }

    /// Appends an operator message.
    pub fn message(&mut self, text: impl Into<String>) -> &mut Self {
        self.then(Operation::Message { text: text.into() })
    }

    /// Runs every step in order, stopping at the first failure.
    ///
    /// Object results are merged key-wise into the report; other values are stored
    /// under the operation label. Steps already run are not rolled back.
    pub fn execute(&self, executor: &mut dyn Executor) -> Result<StrategyReport, NsmError> {
        info!("Executing {}: {}", self.name, self.description);
        let total = self.steps.len();
        let mut report = StrategyReport::new();

        for (index, step) in self.steps.iter().enumerate() {
            let label = step.operation.label();
            debug!("[{}/{total}] {label}", index + 1);

            let value = executor.run(&step.operation).map_err(|source| {
                if !source.is_clean_exit() {
                    error!("{} failed at step {} ({label}): {source}", self.name, index + 1);
                }
                NsmError::StepFailed {
                    strategy: self.name.clone(),
                    step: index + 1,
                    label: label.clone(),
                    source: Box::new(source),
                }
            })?;

            if step.format == ResultFormat::Json
                && let Some(value) = value
            {
                match value {
                    Value::Object(map) => report.extend(map),
                    other => {
                        report.insert(label, other);
                    }
                }
            }
        }

        Ok(report)
    }
}
