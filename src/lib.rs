//! Dynamite is a small orchestration layer for a network security monitoring
//! appliance. It installs, configures, starts, stops and reports on a fixed set of
//! third-party components (Zeek, Suricata, Filebeat, Elasticsearch and the notebook
//! lab) by running named, ordered strategies of plain operations.

/// CLI interface.
pub mod cli;

/// Component catalogue and per-component paths.
pub mod component;

/// Settings file handling.
pub mod config;

/// Shared constants.
pub mod constants;

/// Error handling.
pub mod error;

/// Runs strategy operations against the real system.
pub mod executor;

/// Filebeat configuration editor.
pub mod filebeat;

/// Archive download, extraction and install layout.
pub mod install;

/// Planning functions that build strategies as data.
pub mod plan;

/// Process lifecycle management.
pub mod process;

/// Install-state detection.
pub mod profile;

/// Operator confirmation prompts.
pub mod prompt;

/// Runtime directory layout.
pub mod runtime;

/// Status aggregation.
pub mod status;

/// Strategy sequencer.
pub mod strategy;

#[doc(hidden)]
pub mod test_utils;
