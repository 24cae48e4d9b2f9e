//! Error handling for dynamite.
use std::path::PathBuf;

use thiserror::Error;

use crate::component::Component;

/// Defines all possible errors raised while orchestrating components.
#[derive(Debug, Error)]
pub enum NsmError {
    /// Generic filesystem or OS failure.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// A file the operation depends on is missing or unreadable.
    #[error("Failed to read {}: {source}", path.display())]
    FileRead {
        /// File that could not be read.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error parsing the YAML settings file.
    #[error("Invalid YAML format: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Error serialising or parsing JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A recognised key in a line-oriented config file carried an unparsable value.
    #[error("Malformed value on line {line} of {}: {reason}", path.display())]
    MalformedConfigLine {
        /// Config file being parsed.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// Parser message.
        reason: String,
    },

    /// A `${VAR}` reference in the settings file had no matching environment variable.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A duration string could not be parsed.
    #[error("Invalid duration value: '{0}'")]
    InvalidDuration(String),

    /// A prerequisite for the requested action is absent.
    #[error("{0}")]
    MissingDependency(String),

    /// The operator declined an interactive confirmation.
    #[error("Operation declined by operator")]
    Declined,

    /// The extracted archive payload is not where setup expects it.
    #[error("Extracted payload for '{component}' not found at {}", path.display())]
    PayloadMissing {
        /// Component being installed.
        component: Component,
        /// Expected payload directory.
        path: PathBuf,
    },

    /// Error spawning a component process.
    #[error("Failed to start '{component}': {source}")]
    SpawnFailed {
        /// Component that failed to start.
        component: Component,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Signal delivery or liveness probing failed at the OS level.
    #[error("Failed to signal '{component}' (PID {pid}): {source}")]
    Signal {
        /// Component being signalled.
        component: Component,
        /// Target process id.
        pid: u32,
        /// The underlying errno.
        #[source]
        source: nix::errno::Errno,
    },

    /// The process survived every stop attempt.
    #[error("'{component}' (PID {pid}) did not terminate after {attempts} attempts")]
    DidNotTerminate {
        /// Component being stopped.
        component: Component,
        /// Process id that stayed alive.
        pid: u32,
        /// Number of signals sent.
        attempts: u32,
    },

    /// A single mirror could not be fetched.
    #[error("Download of {url} failed: {reason}")]
    Download {
        /// Mirror URL.
        url: String,
        /// Transport or status failure.
        reason: String,
    },

    /// A strategy step failed; the remaining steps were not run.
    #[error("Strategy '{strategy}' failed at step {step} ({label}): {source}")]
    StepFailed {
        /// Strategy name.
        strategy: String,
        /// One-based index of the failing step.
        step: usize,
        /// Label of the failing operation.
        label: String,
        /// The error raised by the step.
        #[source]
        source: Box<NsmError>,
    },
}

impl NsmError {
    /// Returns the innermost error, looking through strategy step wrappers.
    pub fn root_cause(&self) -> &NsmError {
        match self {
            NsmError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether this error ends the process quietly with a success exit code.
    pub fn is_clean_exit(&self) -> bool {
        matches!(
            self.root_cause(),
            NsmError::Declined | NsmError::MissingDependency(_)
        )
    }
}
