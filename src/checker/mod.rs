mod registry;
mod version;
mod wpscan;

pub use registry::WordPressRegistry;
pub use version::{compare_versions, is_stale, parse_version, reconcile};
pub use wpscan::{is_placeholder_token, WpScanSource, PLACEHOLDER_TOKEN};

use crate::error::LookupError;
use crate::model::{PluginKey, VulnerabilityRecord};
use async_trait::async_trait;
use std::time::Duration;

/// Where the latest published version of a plugin comes from.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Latest published version for `key`.
    async fn latest_version(&self, key: &PluginKey) -> Result<String, LookupError>;
}

/// Where known vulnerabilities for a plugin come from.
#[async_trait]
pub trait VulnerabilitySource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns false when the source is switched off (e.g. no credential).
    /// Disabled sources are never called.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn vulnerabilities(&self, key: &PluginKey) -> Result<Vec<VulnerabilityRecord>, LookupError>;
}

/// Builds the HTTP client shared by the lookup sources and the page fetcher.
pub fn http_client(timeout: Duration, user_agent: &str) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
}

pub fn default_registry(client: reqwest::Client) -> WordPressRegistry {
    WordPressRegistry::new(client)
}

pub fn default_vulnerability_source(client: reqwest::Client, token: Option<String>) -> WpScanSource {
    WpScanSource::new(client, token)
}
