mod cli;
mod html;
mod json;

pub use cli::print_cli_table;
pub use html::{generate_html_string, print_html};
pub use json::print_json;

use crate::model::{AuditEntry, AuditReport, DetectionReport, VersionToken};
use anyhow::Result;

/// Output format for audit results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON format for programmatic use
    Json,
    /// Self-contained HTML report
    Html,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "html" => Ok(OutputFormat::Html),
            _ => Err(format!(
                "Unknown format: {}. Use 'table', 'json', or 'html'",
                s
            )),
        }
    }
}

/// Display status of one audited plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
    /// The site hides the plugin version.
    Hidden,
    /// Observed version is behind the registry.
    Stale,
    UpToDate,
    /// The registry had no answer for this plugin.
    Unknown,
}

impl PluginStatus {
    /// Classifies an observed version against an optional registry version.
    pub fn classify(observed: &VersionToken, latest: Option<&str>, stale: bool) -> Self {
        if !observed.is_visible() {
            PluginStatus::Hidden
        } else if stale {
            PluginStatus::Stale
        } else if latest.is_none() {
            PluginStatus::Unknown
        } else {
            PluginStatus::UpToDate
        }
    }

    /// Status of an audit entry; `None` for site-level failure entries.
    pub fn of_entry(entry: &AuditEntry) -> Option<Self> {
        let verdict = entry.verdict.as_ref()?;
        Some(Self::classify(
            &verdict.observed,
            verdict.authoritative.as_deref(),
            verdict.stale,
        ))
    }

    pub fn label(&self) -> &'static str {
        match self {
            PluginStatus::Hidden => "hidden",
            PluginStatus::Stale => "stale",
            PluginStatus::UpToDate => "up to date",
            PluginStatus::Unknown => "unknown",
        }
    }
}

pub fn print_result(
    report: &AuditReport,
    detections: &DetectionReport,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => print_cli_table(report),
        OutputFormat::Json => print_json(report),
        OutputFormat::Html => print_html(detections, Some(report)),
    }
}
