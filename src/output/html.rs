//! HTML report output format.
//!
//! Generates a self-contained HTML report with one section per site. The
//! detection artifact drives the layout; audit entries, when present, add
//! registry versions, staleness and vulnerabilities.

use super::PluginStatus;
use crate::model::{AuditEntry, AuditReport, DetectionReport, SiteFingerprint, VersionToken};
use anyhow::Result;
use std::collections::HashMap;

/// Generate and print HTML report output
pub fn print_html(detections: &DetectionReport, audit: Option<&AuditReport>) -> Result<()> {
    let html = generate_html_string(detections, audit);
    println!("{}", html);
    Ok(())
}

/// Audit entries keyed by (site, plugin).
type EntryIndex<'a> = HashMap<(&'a str, &'a str), &'a AuditEntry>;

fn index_entries(audit: Option<&AuditReport>) -> EntryIndex<'_> {
    audit
        .map(|report| {
            report
                .entries
                .iter()
                .filter_map(|e| Some(((e.site.as_str(), e.plugin.as_deref()?), e)))
                .collect()
        })
        .unwrap_or_default()
}

/// Generate HTML as a string (for file output)
pub fn generate_html_string(detections: &DetectionReport, audit: Option<&AuditReport>) -> String {
    let index = index_entries(audit);

    let plugin_count = detections.plugin_count();
    let visible_count: usize = detections
        .sites
        .iter()
        .map(|s| s.detections.visible_count())
        .sum();
    let hidden_count = plugin_count - visible_count;
    let stale_count = audit.map(|a| a.stale_count()).unwrap_or(0);
    let vulnerable_count = audit.map(|a| a.vulnerable_count()).unwrap_or(0);

    let timestamp = audit
        .map(|a| a.generated_at)
        .unwrap_or(detections.scanned_at);

    let mut html = String::new();

    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>WordPress Plugin Audit - {}</title>
    <style>
        :root {{
            --bg-color: #1a1a2e;
            --card-bg: #16213e;
            --text-color: #eee;
            --text-muted: #888;
            --border-color: #0f3460;
            --stale: #dc3545;
            --hidden: #ffc107;
            --current: #28a745;
            --accent: #0f3460;
        }}
        * {{ box-sizing: border-box; margin: 0; padding: 0; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-color);
            color: var(--text-color);
            line-height: 1.6;
            padding: 2rem;
        }}
        .container {{ max-width: 1200px; margin: 0 auto; }}
        header {{
            display: flex;
            justify-content: space-between;
            align-items: center;
            margin-bottom: 2rem;
            padding-bottom: 1rem;
            border-bottom: 1px solid var(--border-color);
        }}
        h1 {{ font-size: 1.75rem; font-weight: 600; }}
        .timestamp {{ color: var(--text-muted); font-size: 0.9rem; }}
        .stats {{
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(150px, 1fr));
            gap: 1rem;
            margin-bottom: 2rem;
        }}
        .stat-card {{
            background: var(--card-bg);
            padding: 1.25rem;
            border-radius: 8px;
            border: 1px solid var(--border-color);
        }}
        .stat-value {{ font-size: 2rem; font-weight: 700; }}
        .stat-label {{ color: var(--text-muted); font-size: 0.85rem; }}
        section {{ margin-bottom: 2rem; }}
        h2 {{
            font-size: 1.25rem;
            margin-bottom: 1rem;
            padding-bottom: 0.5rem;
            border-bottom: 1px solid var(--border-color);
            display: flex;
            justify-content: space-between;
        }}
        .count {{ color: var(--text-muted); font-size: 0.9rem; font-weight: 400; }}
        table {{
            width: 100%;
            border-collapse: collapse;
            background: var(--card-bg);
            border-radius: 8px;
            overflow: hidden;
        }}
        th, td {{
            padding: 0.75rem 1rem;
            text-align: left;
            border-bottom: 1px solid var(--border-color);
            vertical-align: top;
        }}
        th {{ background: var(--accent); font-weight: 600; }}
        tr:hover {{ background: rgba(255,255,255,0.02); }}
        .badge {{ padding: 0.25rem 0.5rem; border-radius: 4px; font-size: 0.75rem; font-weight: 600; white-space: nowrap; }}
        .badge-stale {{ background: var(--stale); color: white; }}
        .badge-hidden {{ background: var(--hidden); color: black; }}
        .badge-current {{ background: var(--current); color: white; }}
        .badge-unknown {{ background: var(--text-muted); color: white; }}
        .vulns {{ list-style: none; font-size: 0.85rem; }}
        .vulns li {{ margin-bottom: 0.25rem; }}
        .vulns a {{ color: #6ea8fe; }}
        .muted {{ color: var(--text-muted); }}
        .empty {{ text-align: center; padding: 2rem; color: var(--text-muted); background: var(--card-bg); border-radius: 8px; }}
        .error {{ color: var(--stale); }}
        footer {{ text-align: center; color: var(--text-muted); font-size: 0.8rem; margin-top: 2rem; padding-top: 1rem; border-top: 1px solid var(--border-color); }}
    </style>
</head>
<body>
    <div class="container">
        <header>
            <h1>WordPress Plugin Audit</h1>
            <span class="timestamp">{}</span>
        </header>
"#,
        timestamp.format("%Y-%m-%d"),
        timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    html.push_str(r#"        <div class="stats">
"#);
    for (value, label) in [
        (detections.sites.len(), "Sites"),
        (plugin_count, "Plugins"),
        (visible_count, "Visible versions"),
        (hidden_count, "Hidden versions"),
        (stale_count, "Stale"),
        (vulnerable_count, "Vulnerable"),
    ] {
        html.push_str(&format!(
            r#"            <div class="stat-card">
                <div class="stat-value">{}</div>
                <div class="stat-label">{}</div>
            </div>
"#,
            value, label
        ));
    }
    html.push_str("        </div>\n");

    if audit.is_none() {
        html.push_str(
            r#"        <p class="muted" style="margin-bottom: 2rem;">No audit data available; showing detections only.</p>
"#,
        );
    }

    for site in &detections.sites {
        push_site_section(&mut html, site, &index);
    }

    html.push_str(r#"        <footer>
            Generated by wpaudit
        </footer>
    </div>
</body>
</html>
"#);

    html
}

fn push_site_section(html: &mut String, site: &SiteFingerprint, index: &EntryIndex<'_>) {
    html.push_str(&format!(
        r#"        <section>
            <h2>{} <span class="count">{} plugin(s)</span></h2>
"#,
        html_escape(&site.site),
        site.detections.len()
    ));

    if site.detections.is_empty() {
        html.push_str(r#"            <div class="empty">
                <p>No plugins detected</p>
"#);
        if let Some(error) = &site.error {
            html.push_str(&format!(
                r#"                <p class="error">{}</p>
"#,
                html_escape(error)
            ));
        }
        html.push_str("            </div>\n        </section>\n");
        return;
    }

    html.push_str(r#"            <table>
                <thead>
                    <tr>
                        <th>Plugin</th>
                        <th>Version</th>
                        <th>Latest</th>
                        <th>Status</th>
                        <th>Vulnerabilities</th>
                    </tr>
                </thead>
                <tbody>
"#);

    for (plugin, version) in site.detections.iter() {
        let entry = index.get(&(site.site.as_str(), plugin)).copied();
        push_plugin_row(html, plugin, version, entry);
    }

    html.push_str(r#"                </tbody>
            </table>
        </section>
"#);
}

fn push_plugin_row(html: &mut String, plugin: &str, version: &VersionToken, entry: Option<&AuditEntry>) {
    let verdict = entry.and_then(|e| e.verdict.as_ref());
    let latest = verdict.and_then(|v| v.authoritative.as_deref());
    let stale = verdict.map(|v| v.stale).unwrap_or(false);
    let status = PluginStatus::classify(version, latest, stale);

    html.push_str(&format!(
        r#"                    <tr>
                        <td>{}</td>
                        <td>{}</td>
                        <td>{}</td>
                        <td><span class="badge {}">{}</span></td>
                        <td>{}</td>
                    </tr>
"#,
        html_escape(plugin),
        html_escape(&version.to_string()),
        latest.map(html_escape).unwrap_or_else(|| "-".to_string()),
        badge_class(status),
        status.label(),
        vulnerability_cell(entry)
    ));
}

fn badge_class(status: PluginStatus) -> &'static str {
    match status {
        PluginStatus::Stale => "badge-stale",
        PluginStatus::Hidden => "badge-hidden",
        PluginStatus::UpToDate => "badge-current",
        PluginStatus::Unknown => "badge-unknown",
    }
}

fn vulnerability_cell(entry: Option<&AuditEntry>) -> String {
    let Some(entry) = entry else {
        return r#"<span class="muted">-</span>"#.to_string();
    };

    if entry.vulnerability_error.is_some() {
        return r#"<span class="muted">lookup failed</span>"#.to_string();
    }
    if entry.vulnerabilities.is_empty() {
        return r#"<span class="muted">none known</span>"#.to_string();
    }

    let mut cell = String::from(r#"<ul class="vulns">"#);
    for record in &entry.vulnerabilities {
        let cve = record
            .primary_cve()
            .map(|c| html_escape(&c))
            .unwrap_or_else(|| "no CVE".to_string());
        let link = match record.first_reference() {
            Some(url) => format!(
                r#"<a href="{}" target="_blank" rel="noopener">advisory</a>"#,
                html_escape(url)
            ),
            None => "no link".to_string(),
        };
        cell.push_str(&format!(
            "<li>{} ({}) {}</li>",
            html_escape(&record.title),
            cve,
            link
        ));
    }
    cell.push_str("</ul>");
    cell
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
