use crate::error::LookupError;
use crate::model::PluginKey;
use async_trait::async_trait;
use serde::Deserialize;

const WORDPRESS_API_URL: &str = "https://api.wordpress.org/plugins/info/1.0";

/// Latest versions from the WordPress.org plugin directory.
pub struct WordPressRegistry {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PluginInfo {
    version: Option<String>,
    error: Option<String>,
}

impl WordPressRegistry {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: WORDPRESS_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn info_url(&self, key: &PluginKey) -> String {
        format!("{}/{}.json", self.base_url.trim_end_matches('/'), key)
    }
}

/// Pulls the version out of a plugin info body. The API answers unknown
/// slugs with `{"error": "Plugin not found."}` or `null`.
fn parse_plugin_info(body: &str) -> Result<String, LookupError> {
    let info: Option<PluginInfo> = serde_json::from_str(body)?;
    match info {
        Some(PluginInfo {
            version: Some(version),
            ..
        }) if !version.trim().is_empty() => Ok(version),
        Some(PluginInfo { error: Some(_), .. }) | None => Err(LookupError::NotFound),
        Some(_) => Err(LookupError::Malformed("missing version field".to_string())),
    }
}

#[async_trait]
impl super::RegistrySource for WordPressRegistry {
    fn name(&self) -> &'static str {
        "WordPress.org"
    }

    async fn latest_version(&self, key: &PluginKey) -> Result<String, LookupError> {
        let response = self
            .client
            .get(self.info_url(key))
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LookupError::from_status(response.status()));
        }

        let body = response.text().await?;
        parse_plugin_info(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::RegistrySource;

    #[test]
    fn test_parse_plugin_info_version() {
        let body = r#"{"name":"Akismet","slug":"akismet","version":"5.3.1"}"#;
        assert_eq!(parse_plugin_info(body), Ok("5.3.1".to_string()));
    }

    #[test]
    fn test_parse_plugin_info_not_found() {
        assert_eq!(
            parse_plugin_info(r#"{"error":"Plugin not found."}"#),
            Err(LookupError::NotFound)
        );
        assert_eq!(parse_plugin_info("null"), Err(LookupError::NotFound));
    }

    #[test]
    fn test_parse_plugin_info_malformed() {
        assert!(matches!(
            parse_plugin_info("<html>"),
            Err(LookupError::Malformed(_))
        ));
        assert!(matches!(
            parse_plugin_info(r#"{"name":"x"}"#),
            Err(LookupError::Malformed(_))
        ));
    }

    #[test]
    fn test_info_url() {
        let registry = WordPressRegistry::new(reqwest::Client::new());
        let key = PluginKey::normalize("Contact Form 7");
        assert_eq!(
            registry.info_url(&key),
            "https://api.wordpress.org/plugins/info/1.0/contact-form-7.json"
        );

        let registry = registry.with_base_url("http://localhost:8080/");
        assert_eq!(registry.info_url(&key), "http://localhost:8080/contact-form-7.json");
        assert_eq!(registry.name(), "WordPress.org");
    }
}
