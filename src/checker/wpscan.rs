use crate::error::LookupError;
use crate::model::{PluginKey, VulnerabilityRecord};
use async_trait::async_trait;
use serde::Deserialize;

const WPSCAN_API_URL: &str = "https://wpscan.com/api/v3/plugins";

/// Token value shipped in the default config. Treated the same as no token.
pub const PLACEHOLDER_TOKEN: &str = "YOUR_WPSCAN_API_KEY";

/// Returns true when `token` cannot be a real credential.
pub fn is_placeholder_token(token: &str) -> bool {
    let token = token.trim();
    token.is_empty() || token == PLACEHOLDER_TOKEN
}

/// Known vulnerabilities from the WPScan API.
///
/// Without a usable token the source reports itself disabled and answers
/// every key with an empty list.
pub struct WpScanSource {
    client: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

impl WpScanSource {
    pub fn new(client: reqwest::Client, token: Option<String>) -> Self {
        Self {
            client,
            token: token.filter(|t| !is_placeholder_token(t)),
            base_url: WPSCAN_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Deserialize)]
struct WpScanPlugin {
    vulnerabilities: Option<Vec<WpScanVuln>>,
}

#[derive(Deserialize)]
struct WpScanVuln {
    id: Option<String>,
    title: Option<String>,
    fixed_in: Option<String>,
    references: Option<WpScanReferences>,
}

#[derive(Deserialize)]
struct WpScanReferences {
    url: Option<Vec<String>>,
    cve: Option<Vec<String>>,
}

/// The v3 API nests the plugin under its slug; some mirrors return the
/// plugin object at the top level. Both are accepted.
fn parse_response(key: &PluginKey, body: &str) -> Result<Vec<VulnerabilityRecord>, LookupError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(LookupError::Malformed("expected a JSON object".to_string()));
    }

    let plugin = if value.get("vulnerabilities").is_some() {
        value
    } else {
        match value.get(key.as_str()) {
            Some(nested) if !nested.is_null() => nested.clone(),
            _ => return Ok(Vec::new()),
        }
    };

    let plugin: WpScanPlugin = serde_json::from_value(plugin)?;

    Ok(plugin
        .vulnerabilities
        .unwrap_or_default()
        .into_iter()
        .map(|v| {
            let (references, cve) = match v.references {
                Some(refs) => (refs.url.unwrap_or_default(), refs.cve.unwrap_or_default()),
                None => (Vec::new(), Vec::new()),
            };
            VulnerabilityRecord {
                id: v.id,
                title: v.title.unwrap_or_else(|| "Untitled vulnerability".to_string()),
                cve,
                fixed_in: v.fixed_in,
                references,
            }
        })
        .collect())
}

#[async_trait]
impl super::VulnerabilitySource for WpScanSource {
    fn name(&self) -> &'static str {
        "WPScan"
    }

    fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    async fn vulnerabilities(&self, key: &PluginKey) -> Result<Vec<VulnerabilityRecord>, LookupError> {
        let Some(token) = &self.token else {
            return Ok(Vec::new());
        };

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), key);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token token={}", token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LookupError::from_status(response.status()));
        }

        let body = response.text().await?;
        parse_response(key, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::VulnerabilitySource;

    const KEYED_BODY: &str = r#"{
        "contact-form-7": {
            "friendly_name": "Contact Form 7",
            "latest_version": "5.8",
            "vulnerabilities": [
                {
                    "id": "8b8e1e4e-1c45-4a34-9f1d-000000000001",
                    "title": "Contact Form 7 < 5.3.2 - Unrestricted File Upload",
                    "fixed_in": "5.3.2",
                    "references": {
                        "url": ["https://example.org/advisory"],
                        "cve": ["2020-35489"]
                    }
                },
                { "title": "Reflected XSS" }
            ]
        }
    }"#;

    #[test]
    fn test_placeholder_tokens() {
        assert!(is_placeholder_token(""));
        assert!(is_placeholder_token("   "));
        assert!(is_placeholder_token(PLACEHOLDER_TOKEN));
        assert!(!is_placeholder_token("abc123"));
    }

    #[test]
    fn test_parse_keyed_response() {
        let key = PluginKey::normalize("contact-form-7");
        let records = parse_response(&key, KEYED_BODY).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fixed_in.as_deref(), Some("5.3.2"));
        assert_eq!(records[0].primary_cve().as_deref(), Some("CVE-2020-35489"));
        assert_eq!(records[0].first_reference(), Some("https://example.org/advisory"));
        assert_eq!(records[1].id, None);
        assert!(records[1].references.is_empty());
    }

    #[test]
    fn test_parse_flat_response() {
        let key = PluginKey::normalize("akismet");
        let body = r#"{"vulnerabilities":[{"id":"x","title":"CSRF"}]}"#;
        let records = parse_response(&key, body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "CSRF");
    }

    #[test]
    fn test_parse_response_other_slug_is_empty() {
        let key = PluginKey::normalize("akismet");
        assert!(parse_response(&key, KEYED_BODY).unwrap().is_empty());
    }

    #[test]
    fn test_parse_response_malformed() {
        let key = PluginKey::normalize("akismet");
        assert!(matches!(
            parse_response(&key, "not json"),
            Err(LookupError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_disabled_source_returns_empty_without_request() {
        // Unroutable base URL: any request would fail with a transport error.
        let source = WpScanSource::new(reqwest::Client::new(), Some(PLACEHOLDER_TOKEN.to_string()))
            .with_base_url("http://127.0.0.1:9");
        assert!(!source.is_enabled());

        let key = PluginKey::normalize("akismet");
        assert_eq!(source.vulnerabilities(&key).await, Ok(Vec::new()));

        let source = WpScanSource::new(reqwest::Client::new(), None);
        assert!(!source.is_enabled());
        assert_eq!(source.name(), "WPScan");
    }
}
