use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parses a domain list: one site per line, `#` comments and blank lines
/// skipped, `https://` added when no scheme is given.
pub fn parse_domains(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            if line.starts_with("http://") || line.starts_with("https://") {
                line.to_string()
            } else {
                format!("https://{}", line)
            }
        })
        .collect()
}

/// Reads and parses a domain list file.
pub fn load_domains(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read domain list {}", path.display()))?;
    Ok(parse_domains(&content))
}
