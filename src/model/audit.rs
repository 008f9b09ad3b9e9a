use crate::error::LookupError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::VersionToken;

/// Observed version against the published one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionVerdict {
    pub observed: VersionToken,
    pub authoritative: Option<String>,
    pub stale: bool,
}

/// A vulnerability as relayed by the vulnerability source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cve: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_in: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

impl VulnerabilityRecord {
    /// First CVE, formatted as `CVE-YYYY-NNNN`.
    pub fn primary_cve(&self) -> Option<String> {
        self.cve.first().map(|c| {
            if c.to_uppercase().starts_with("CVE-") {
                c.clone()
            } else {
                format!("CVE-{}", c)
            }
        })
    }

    pub fn first_reference(&self) -> Option<&str> {
        self.references.first().map(String::as_str)
    }
}

/// One row of the audit: a plugin on a site, or a site-level failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub site: String,
    pub plugin: Option<String>,
    pub verdict: Option<VersionVerdict>,
    #[serde(default)]
    pub vulnerabilities: Vec<VulnerabilityRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_error: Option<LookupError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerability_error: Option<LookupError>,
    /// Failure marker for sites with nothing to audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEntry {
    pub fn failure(site: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            plugin: None,
            verdict: None,
            vulnerabilities: Vec::new(),
            registry_error: None,
            vulnerability_error: None,
            error: Some(reason.into()),
        }
    }

    pub fn plugin(
        site: impl Into<String>,
        plugin: impl Into<String>,
        verdict: VersionVerdict,
        vulnerabilities: Vec<VulnerabilityRecord>,
    ) -> Self {
        Self {
            site: site.into(),
            plugin: Some(plugin.into()),
            verdict: Some(verdict),
            vulnerabilities,
            registry_error: None,
            vulnerability_error: None,
            error: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.plugin.is_none()
    }

    pub fn is_stale(&self) -> bool {
        self.verdict.as_ref().map(|v| v.stale).unwrap_or(false)
    }

    pub fn is_vulnerable(&self) -> bool {
        !self.vulnerabilities.is_empty()
    }
}

/// Output of the verification stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<AuditEntry>,
}

impl AuditReport {
    pub fn new(entries: Vec<AuditEntry>) -> Self {
        Self {
            generated_at: Utc::now(),
            entries,
        }
    }

    /// Distinct sites, wherever their entries appear.
    pub fn site_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.site.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn plugin_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_failure()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_failure()).count()
    }

    pub fn stale_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_stale()).count()
    }

    pub fn vulnerable_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_vulnerable()).count()
    }

    pub fn vulnerability_count(&self) -> usize {
        self.entries.iter().map(|e| e.vulnerabilities.len()).sum()
    }
}
