//! Site fetching and plugin fingerprinting.
//!
//! This module provides the [`PageFetcher`] trait, the reqwest-backed
//! [`HttpFetcher`], and the functions that turn a list of site URLs into
//! [`SiteFingerprint`]s.
//!
//! A site that cannot be fetched still yields a fingerprint: it has no
//! detections and carries the error, so it shows up in every later stage.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use wpaudit::checker::http_client;
//! use wpaudit::scanner::{scan_site, HttpFetcher};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let client = http_client(Duration::from_secs(10), "Mozilla/5.0")?;
//!     let fetcher = HttpFetcher::new(client);
//!
//!     let site = scan_site(&fetcher, "https://example.com").await;
//!     for (plugin, version) in site.detections.iter() {
//!         println!("{}: {}", plugin, version);
//!     }
//!     Ok(())
//! }
//! ```

mod domains;
mod fingerprint;

pub use domains::{load_domains, parse_domains};
pub use fingerprint::extract_plugins;

use crate::error::LookupError;
use crate::model::SiteFingerprint;
use async_trait::async_trait;
use tracing::{info, warn};

/// Fetches the markup of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Returns the body of `url`. Non-2xx responses are errors.
    async fn fetch(&self, url: &str) -> Result<String, LookupError>;
}

/// Fetches pages over HTTP(S). Timeout and user agent come from the client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, LookupError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(LookupError::from_status(response.status()));
        }

        Ok(response.text().await?)
    }
}

/// Fetches one site and extracts its plugins. Never fails: a fetch error
/// produces an empty fingerprint carrying the error text.
pub async fn scan_site<F: PageFetcher + ?Sized>(fetcher: &F, url: &str) -> SiteFingerprint {
    match fetcher.fetch(url).await {
        Ok(html) => {
            let detections = extract_plugins(&html);
            info!(site = url, plugins = detections.len(), "scanned site");
            SiteFingerprint::new(url, detections)
        }
        Err(err) => {
            warn!(site = url, error = %err, "failed to fetch site");
            SiteFingerprint::failed(url, err.to_string())
        }
    }
}

/// Scans sites one after another, in input order. `on_progress` is called
/// after each site.
pub async fn scan_sites<F, P>(fetcher: &F, urls: &[String], mut on_progress: P) -> Vec<SiteFingerprint>
where
    F: PageFetcher + ?Sized,
    P: FnMut(&SiteFingerprint),
{
    let mut sites = Vec::with_capacity(urls.len());
    for url in urls {
        let site = scan_site(fetcher, url).await;
        on_progress(&site);
        sites.push(site);
    }
    sites
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VersionToken;
    use std::collections::HashMap;

    struct FakeFetcher {
        pages: HashMap<String, Result<String, LookupError>>,
    }

    impl FakeFetcher {
        fn new(pages: Vec<(&str, Result<String, LookupError>)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(url, page)| (url.to_string(), page))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String, LookupError> {
            self.pages
                .get(url)
                .cloned()
                .unwrap_or(Err(LookupError::Transport("connection refused".to_string())))
        }
    }

    #[tokio::test]
    async fn test_scan_site_extracts_plugins() {
        let fetcher = FakeFetcher::new(vec![(
            "https://a.example",
            Ok(r#"<script src="/wp-content/plugins/akismet/a.js?ver=5.3"></script>"#.to_string()),
        )]);

        let site = scan_site(&fetcher, "https://a.example").await;
        assert_eq!(site.error, None);
        assert_eq!(site.detections.get("akismet"), Some(&VersionToken::visible("5.3")));
    }

    #[tokio::test]
    async fn test_scan_site_failure_is_recorded() {
        let fetcher = FakeFetcher::new(vec![("https://gone.example", Err(LookupError::NotFound))]);

        let site = scan_site(&fetcher, "https://gone.example").await;
        assert!(site.detections.is_empty());
        assert_eq!(site.error.as_deref(), Some("not found"));
    }

    #[tokio::test]
    async fn test_scan_sites_keeps_order_and_failures() {
        let fetcher = FakeFetcher::new(vec![
            ("https://a.example", Ok("<html></html>".to_string())),
            ("https://c.example", Err(LookupError::Timeout)),
        ]);
        let urls = vec![
            "https://c.example".to_string(),
            "https://b.example".to_string(),
            "https://a.example".to_string(),
        ];

        let mut seen = 0;
        let sites = scan_sites(&fetcher, &urls, |_| seen += 1).await;

        assert_eq!(seen, 3);
        let order: Vec<_> = sites.iter().map(|s| s.site.as_str()).collect();
        assert_eq!(order, vec!["https://c.example", "https://b.example", "https://a.example"]);
        assert_eq!(sites[0].error.as_deref(), Some("request timed out"));
        assert!(sites[1].error.is_some());
        assert!(sites[2].error.is_none());
    }
}
