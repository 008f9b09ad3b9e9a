use super::PluginStatus;
use crate::model::{AuditEntry, AuditReport};
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "Plugin")]
    plugin: String,
    #[tabled(rename = "Observed")]
    observed: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Vulns")]
    vulns: String,
}

pub fn print_cli_table(report: &AuditReport) -> Result<()> {
    println!();
    println!(
        "Audit completed at: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    if report.entries.is_empty() {
        println!("No sites audited.");
    } else {
        let rows: Vec<EntryRow> = report.entries.iter().map(entry_row).collect();
        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
    }

    let details = vulnerability_details(report);
    if !details.is_empty() {
        println!();
        println!(
            "Found {} vulnerabilities in {} plugins:",
            report.vulnerability_count(),
            report.vulnerable_count()
        );
        for line in &details {
            println!("{}", line);
        }
    }

    println!();
    for line in summary_lines(report) {
        println!("{}", line);
    }

    Ok(())
}

fn entry_row(entry: &AuditEntry) -> EntryRow {
    let site = truncate(&entry.site, 40);

    let Some(verdict) = entry.verdict.as_ref() else {
        return EntryRow {
            site,
            plugin: "-".to_string(),
            observed: "-".to_string(),
            latest: "-".to_string(),
            status: format!(
                "\x1b[90m{}\x1b[0m",
                truncate(entry.error.as_deref().unwrap_or("failed"), 30)
            ),
            vulns: "-".to_string(),
        };
    };

    let status = PluginStatus::of_entry(entry).unwrap_or(PluginStatus::Unknown);

    EntryRow {
        site,
        plugin: truncate(entry.plugin.as_deref().unwrap_or("-"), 30),
        observed: verdict
            .observed
            .as_visible()
            .map(str::to_string)
            .unwrap_or_else(|| "-".to_string()),
        latest: verdict
            .authoritative
            .clone()
            .unwrap_or_else(|| "-".to_string()),
        status: format_status(status),
        vulns: format_vuln_count(entry),
    }
}

fn format_status(status: PluginStatus) -> String {
    match status {
        PluginStatus::Stale => "\x1b[31mSTALE\x1b[0m".to_string(),
        PluginStatus::UpToDate => "\x1b[32mOK\x1b[0m".to_string(),
        PluginStatus::Hidden => "\x1b[33mHIDDEN\x1b[0m".to_string(),
        PluginStatus::Unknown => "UNKNOWN".to_string(),
    }
}

fn format_vuln_count(entry: &AuditEntry) -> String {
    if entry.vulnerability_error.is_some() {
        "?".to_string()
    } else if entry.vulnerabilities.is_empty() {
        "0".to_string()
    } else {
        format!("\x1b[31m{}\x1b[0m", entry.vulnerabilities.len())
    }
}

/// One header line per vulnerable plugin, then title, CVE and first link
/// for each of its records.
fn vulnerability_details(report: &AuditReport) -> Vec<String> {
    let mut lines = Vec::new();

    for entry in report.entries.iter().filter(|e| e.is_vulnerable()) {
        lines.push(format!(
            "  {} on {}:",
            entry.plugin.as_deref().unwrap_or("-"),
            entry.site
        ));
        for record in &entry.vulnerabilities {
            lines.push(format!(
                "    - {} ({})",
                record.title,
                record.primary_cve().unwrap_or_else(|| "no CVE".to_string())
            ));
            lines.push(format!(
                "      {}",
                record.first_reference().unwrap_or("no link")
            ));
        }
    }

    lines
}

fn summary_lines(report: &AuditReport) -> Vec<String> {
    let registry_failures = report
        .entries
        .iter()
        .filter(|e| e.registry_error.is_some())
        .count();
    let vuln_failures = report
        .entries
        .iter()
        .filter(|e| e.vulnerability_error.is_some())
        .count();

    let mut lines = vec![
        "Summary:".to_string(),
        format!("  Sites audited: {}", report.site_count()),
        format!("  Plugins checked: {}", report.plugin_count()),
    ];

    if report.failure_count() > 0 {
        lines.push(format!(
            "  Sites without results: {}",
            report.failure_count()
        ));
    }

    lines.push(format!("  Stale plugins: {}", report.stale_count()));
    lines.push(format!("  Vulnerable plugins: {}", report.vulnerable_count()));

    if registry_failures > 0 || vuln_failures > 0 {
        lines.push(format!(
            "  Lookup failures: {} registry, {} vulnerability",
            registry_failures, vuln_failures
        ));
    }

    lines
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use crate::model::{VersionToken, VersionVerdict, VulnerabilityRecord};

    fn vulnerable_entry() -> AuditEntry {
        AuditEntry::plugin(
            "https://a.example",
            "contact-form-7",
            VersionVerdict {
                observed: VersionToken::visible("5.3"),
                authoritative: Some("5.9".to_string()),
                stale: true,
            },
            vec![
                VulnerabilityRecord {
                    id: Some("abc".to_string()),
                    title: "Unrestricted file upload".to_string(),
                    cve: vec!["2020-35489".to_string()],
                    fixed_in: Some("5.3.2".to_string()),
                    references: vec!["https://example.org/advisory".to_string()],
                },
                VulnerabilityRecord {
                    id: None,
                    title: "Reflected XSS".to_string(),
                    cve: vec![],
                    fixed_in: None,
                    references: vec![],
                },
            ],
        )
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-plugin-name", 10), "a-very-...");
        assert_eq!(truncate("ñññññ", 4), "ñ...");
    }

    #[test]
    fn test_vulnerability_details_fallbacks() {
        let report = AuditReport::new(vec![vulnerable_entry()]);
        let lines = vulnerability_details(&report);

        assert_eq!(lines[0], "  contact-form-7 on https://a.example:");
        assert!(lines[1].contains("CVE-2020-35489"));
        assert!(lines[2].contains("https://example.org/advisory"));
        assert!(lines[3].contains("no CVE"));
        assert!(lines[4].contains("no link"));
    }

    #[test]
    fn test_failure_row() {
        let row = entry_row(&AuditEntry::failure("https://b.example", "no plugins detected"));
        assert_eq!(row.plugin, "-");
        assert!(row.status.contains("no plugins detected"));
    }

    #[test]
    fn test_unknown_vuln_count_on_lookup_failure() {
        let mut entry = vulnerable_entry();
        entry.vulnerabilities.clear();
        entry.vulnerability_error = Some(LookupError::Timeout);
        assert_eq!(format_vuln_count(&entry), "?");
    }

    #[test]
    fn test_summary_counts() {
        let mut failed_lookup = vulnerable_entry();
        failed_lookup.registry_error = Some(LookupError::NotFound);
        let report = AuditReport::new(vec![
            failed_lookup,
            AuditEntry::failure("https://b.example", "no plugins detected"),
        ]);

        let summary = summary_lines(&report).join("\n");
        assert!(summary.contains("Sites audited: 2"));
        assert!(summary.contains("Plugins checked: 1"));
        assert!(summary.contains("Sites without results: 1"));
        assert!(summary.contains("Lookup failures: 1 registry, 0 vulnerability"));
    }
}
