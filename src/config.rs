//! Configuration file handling.
//!
//! This module provides loading and saving of wpaudit configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/wpaudit/config.toml`
//! - macOS: `~/Library/Application Support/wpaudit/config.toml`
//! - Windows: `%APPDATA%\wpaudit\config.toml`
//!
//! A different file can be passed with `--config`.
//!
//! # Example Configuration
//!
//! ```toml
//! request_timeout_secs = 10
//! rate_limit_delay_ms = 500
//! user_agent = "Mozilla/5.0"
//! wpscan_api_token = ""
//! domains_file = "domains.txt"
//! detections_file = "plugins_detected.json"
//! report_file = "audit_report.json"
//! html_file = "audit_report.html"
//! default_format = "table"
//! log_level = "info"
//!
//! [ignore]
//! vulnerabilities = ["CVE-2021-12345", "CVE-2019-*"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checker::is_placeholder_token;
use crate::model::VulnerabilityRecord;

/// Environment variable that overrides `wpscan_api_token`.
pub const TOKEN_ENV_VAR: &str = "WPSCAN_API_KEY";

/// Application configuration.
///
/// Loaded from a TOML file or created with default values. Every field
/// has a default, so a partial file is fine.
///
/// # Example
///
/// ```no_run
/// use wpaudit::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Timeout: {:?}", config.request_timeout());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timeout for every outbound request, in seconds.
    ///
    /// Default: 10
    pub request_timeout_secs: u64,

    /// Pause after each uncached registry or vulnerability lookup, in
    /// milliseconds.
    ///
    /// Default: 500
    pub rate_limit_delay_ms: u64,

    /// User-Agent header sent to sites and APIs.
    pub user_agent: String,

    /// WPScan API token. Empty disables vulnerability lookups.
    /// The `WPSCAN_API_KEY` environment variable takes precedence.
    pub wpscan_api_token: String,

    /// Domain list read by `detect`.
    pub domains_file: PathBuf,

    /// Detection artifact written by `detect`, read by `verify` and `report`.
    pub detections_file: PathBuf,

    /// Audit artifact written by `verify`, read by `report`.
    pub report_file: PathBuf,

    /// HTML report written by `report`.
    pub html_file: PathBuf,

    /// Default output format for `verify`.
    ///
    /// Valid values: "table", "json", "html"
    pub default_format: String,

    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Ignore list for suppressing accepted findings.
    #[serde(default)]
    pub ignore: IgnoreConfig,
}

/// Configuration for ignoring specific vulnerabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Vulnerability IDs or CVEs to drop from results (e.g.
    /// "CVE-2021-12345"). `*` acts as a wildcard.
    pub vulnerabilities: Vec<String>,
}

impl IgnoreConfig {
    /// Check if a vulnerability ID or CVE should be ignored.
    pub fn should_ignore_vulnerability(&self, vuln_id: &str) -> bool {
        self.vulnerabilities.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, vuln_id)
            } else {
                pattern.eq_ignore_ascii_case(vuln_id)
            }
        })
    }

    /// Check a record by its id and every CVE it lists.
    pub fn should_ignore_record(&self, record: &VulnerabilityRecord) -> bool {
        if self.vulnerabilities.is_empty() {
            return false;
        }

        let id_matches = record
            .id
            .as_deref()
            .map(|id| self.should_ignore_vulnerability(id))
            .unwrap_or(false);

        id_matches
            || record.cve.iter().any(|cve| {
                let cve = if cve.to_uppercase().starts_with("CVE-") {
                    cve.clone()
                } else {
                    format!("CVE-{}", cve)
                };
                self.should_ignore_vulnerability(&cve)
            })
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    // Check prefix (before first *)
    if !parts[0].is_empty() {
        if !remaining.starts_with(parts[0]) {
            return false;
        }
        remaining = &remaining[parts[0].len()..];
    }

    // Check suffix (after last *)
    let last_part = parts[parts.len() - 1];
    if !last_part.is_empty() {
        if !remaining.ends_with(last_part) {
            return false;
        }
        remaining = &remaining[..remaining.len() - last_part.len()];
    }

    // Check middle parts
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        if let Some(pos) = remaining.find(part) {
            remaining = &remaining[pos + part.len()..];
        } else {
            return false;
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            rate_limit_delay_ms: 500,
            user_agent: "Mozilla/5.0".to_string(),
            wpscan_api_token: String::new(),
            domains_file: PathBuf::from("domains.txt"),
            detections_file: PathBuf::from("plugins_detected.json"),
            report_file: PathBuf::from("audit_report.json"),
            html_file: PathBuf::from("audit_report.html"),
            default_format: "table".to_string(),
            log_level: "info".to_string(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration to `path`.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use wpaudit::Config;
    ///
    /// let path = Config::config_path();
    /// println!("Config file: {}", path.display());
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wpaudit")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    /// The usable WPScan token, if any. The environment wins over the file;
    /// blank and placeholder values count as unset.
    pub fn wpscan_token(&self) -> Option<String> {
        Self::resolve_token(std::env::var(TOKEN_ENV_VAR).ok(), &self.wpscan_api_token)
    }

    fn resolve_token(env: Option<String>, configured: &str) -> Option<String> {
        env.filter(|t| !is_placeholder_token(t))
            .or_else(|| Some(configured.trim().to_string()))
            .filter(|t| !is_placeholder_token(t))
    }
}
