//! Status aggregation across managed components.
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use crate::component::Component;
use crate::error::NsmError;
use crate::process::ProcessStatus;
use crate::profile::Inventory;

const GREEN_BOLD: &str = "\x1b[1;32m"; // Bright Green
const RED_BOLD: &str = "\x1b[1;31m"; // Bright Red
const RESET: &str = "\x1b[0m"; // Reset color

/// Component name to process status, in component-name order.
pub type StatusReport = BTreeMap<String, ProcessStatus>;

/// Collects the status of every installed component in `components`.
///
/// Components that are not installed are left out of the report entirely.
pub fn aggregate(
    inventory: &dyn Inventory,
    components: &[Component],
) -> Result<StatusReport, NsmError> {
    let mut report = StatusReport::new();
    for &component in components {
        if !inventory.is_installed(component) {
            debug!("Skipping status of {component}; not installed");
            continue;
        }
        report.insert(component.to_string(), inventory.process_status(component)?);
    }
    Ok(report)
}

/// Renders a report as a colored, human-readable table.
pub fn render_table(report: &StatusReport, now: DateTime<Utc>) -> String {
    if report.is_empty() {
        return "No components installed.\n".to_string();
    }

    let mut out = String::new();
    for (name, status) in report {
        let state = if status.running {
            format!("{GREEN_BOLD}running{RESET}")
        } else {
            format!("{RED_BOLD}stopped{RESET}")
        };
        let pid = status
            .pid
            .map(|pid| pid.to_string())
            .unwrap_or_else(|| "-".to_string());
        let since = status
            .started_at
            .and_then(|started| now.signed_duration_since(started).to_std().ok())
            .map(|elapsed| format_elapsed(elapsed.as_secs()))
            .unwrap_or_else(|| "-".to_string());
        let memory = status
            .memory_bytes
            .map(|bytes| format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0)))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("{name:<15} {state:<20} pid {pid:<8} {since:<14} {memory}\n"));
    }
    out
}

fn format_elapsed(total_seconds: u64) -> String {
    match total_seconds {
        0..=59 => format!("{} secs ago", total_seconds),
        60..=3_599 => format!("{} mins ago", total_seconds / 60),
        3_600..=86_399 => format!("{} hours ago", total_seconds / 3_600),
        86_400..=604_799 => format!("{} days ago", total_seconds / 86_400),
        _ => format!("{} weeks ago", total_seconds / 604_800),
    }
}
