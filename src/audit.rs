//! Audit aggregation.
//!
//! The [`Auditor`] walks site fingerprints in order and produces one
//! [`AuditEntry`] per detected plugin, or one failure entry for a site with
//! nothing detected. It owns the [`LookupCache`] for the run, so each
//! distinct [`PluginKey`] hits the registry and the vulnerability source at
//! most once however many sites use it.
//!
//! External failures never stop the run. A failed registry lookup leaves
//! the published version empty (and the plugin not stale); a failed
//! vulnerability lookup leaves the list empty. Either way the reason is kept
//! on the entry.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::LookupCache;
use crate::checker::{reconcile, RegistrySource, VulnerabilitySource};
use crate::config::IgnoreConfig;
use crate::error::LookupError;
use crate::model::{AuditEntry, PluginKey, SiteFingerprint, VersionToken, VulnerabilityRecord};

/// Failure marker for a reachable site with no plugin paths in its markup.
pub const NO_PLUGINS_DETECTED: &str = "no plugins detected";

/// Delay after each uncached external call.
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_millis(500);

pub struct Auditor<R, V> {
    registry: R,
    vulnerabilities: V,
    cache: LookupCache,
    delay: Duration,
    ignore: IgnoreConfig,
}

impl<R: RegistrySource, V: VulnerabilitySource> Auditor<R, V> {
    /// Creates an auditor with an empty cache.
    pub fn new(registry: R, vulnerabilities: V) -> Self {
        Self {
            registry,
            vulnerabilities,
            cache: LookupCache::new(),
            delay: DEFAULT_RATE_LIMIT_DELAY,
            ignore: IgnoreConfig::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_ignore(mut self, ignore: IgnoreConfig) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    /// Audits every site in order. The output holds at least one entry
    /// per site.
    pub async fn audit(&mut self, sites: &[SiteFingerprint]) -> Vec<AuditEntry> {
        if !self.vulnerabilities.is_enabled() {
            info!(
                source = self.vulnerabilities.name(),
                "vulnerability source disabled, skipping vulnerability lookups"
            );
        }

        let mut entries = Vec::new();
        for site in sites {
            entries.extend(self.audit_site(site).await);
        }

        info!(
            entries = entries.len(),
            plugins = self.cache.len(),
            cache_hits = self.cache.hits(),
            "audit complete"
        );
        entries
    }

    /// Entries for one site, in detection order.
    pub async fn audit_site(&mut self, site: &SiteFingerprint) -> Vec<AuditEntry> {
        if site.detections.is_empty() {
            let reason = site
                .error
                .clone()
                .unwrap_or_else(|| NO_PLUGINS_DETECTED.to_string());
            return vec![AuditEntry::failure(&site.site, reason)];
        }

        let mut entries = Vec::with_capacity(site.detections.len());
        for (plugin, observed) in site.detections.iter() {
            entries.push(self.audit_plugin(&site.site, plugin, observed).await);
        }
        entries
    }

    async fn audit_plugin(&mut self, site: &str, plugin: &str, observed: &VersionToken) -> AuditEntry {
        let key = PluginKey::normalize(plugin);

        let (authoritative, registry_error) = match self.latest_version(&key).await {
            Ok(version) => (Some(version), None),
            Err(err) => (None, Some(err)),
        };
        let verdict = reconcile(observed, authoritative);

        let (vulnerabilities, vulnerability_error) = match self.known_vulnerabilities(&key).await {
            Ok(records) => (self.filter_ignored(records), None),
            Err(err) => (Vec::new(), Some(err)),
        };

        if verdict.stale {
            debug!(site, plugin, observed = %observed, "plugin is out of date");
        }

        let mut entry = AuditEntry::plugin(site, plugin, verdict, vulnerabilities);
        entry.registry_error = registry_error;
        entry.vulnerability_error = vulnerability_error;
        entry
    }

    async fn latest_version(&mut self, key: &PluginKey) -> Result<String, LookupError> {
        if let Some(cached) = self.cache.version(key) {
            let cached = cached.clone();
            self.cache.record_hit();
            debug!(plugin = %key, "registry cache hit");
            return cached;
        }

        let outcome = self.registry.latest_version(key).await;
        if let Err(err) = &outcome {
            warn!(plugin = %key, source = self.registry.name(), error = %err, "registry lookup failed");
        }
        self.pause().await;

        self.cache.store_version(key.clone(), outcome).clone()
    }

    async fn known_vulnerabilities(
        &mut self,
        key: &PluginKey,
    ) -> Result<Vec<VulnerabilityRecord>, LookupError> {
        if let Some(cached) = self.cache.vulnerabilities(key) {
            let cached = cached.clone();
            self.cache.record_hit();
            debug!(plugin = %key, "vulnerability cache hit");
            return cached;
        }

        let outcome = if self.vulnerabilities.is_enabled() {
            let outcome = self.vulnerabilities.vulnerabilities(key).await;
            if let Err(err) = &outcome {
                warn!(
                    plugin = %key,
                    source = self.vulnerabilities.name(),
                    error = %err,
                    "vulnerability lookup failed"
                );
            }
            self.pause().await;
            outcome
        } else {
            Ok(Vec::new())
        };

        self.cache.store_vulnerabilities(key.clone(), outcome).clone()
    }

    fn filter_ignored(&self, records: Vec<VulnerabilityRecord>) -> Vec<VulnerabilityRecord> {
        records
            .into_iter()
            .filter(|r| !self.ignore.should_ignore_record(r))
            .collect()
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Detections;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeRegistry {
        versions: HashMap<String, Result<String, LookupError>>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeRegistry {
        fn with(mut self, key: &str, outcome: Result<&str, LookupError>) -> Self {
            self.versions
                .insert(key.to_string(), outcome.map(str::to_string));
            self
        }
    }

    #[async_trait]
    impl RegistrySource for FakeRegistry {
        fn name(&self) -> &'static str {
            "fake registry"
        }

        async fn latest_version(&self, key: &PluginKey) -> Result<String, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.versions
                .get(key.as_str())
                .cloned()
                .unwrap_or(Err(LookupError::NotFound))
        }
    }

    struct FakeVulns {
        enabled: bool,
        records: HashMap<String, Result<Vec<VulnerabilityRecord>, LookupError>>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeVulns {
        fn enabled() -> Self {
            Self {
                enabled: true,
                records: HashMap::new(),
                calls: Arc::default(),
            }
        }

        fn disabled() -> Self {
            Self {
                enabled: false,
                ..Self::enabled()
            }
        }

        fn with(mut self, key: &str, outcome: Result<Vec<VulnerabilityRecord>, LookupError>) -> Self {
            self.records.insert(key.to_string(), outcome);
            self
        }
    }

    #[async_trait]
    impl VulnerabilitySource for FakeVulns {
        fn name(&self) -> &'static str {
            "fake vulns"
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        async fn vulnerabilities(
            &self,
            key: &PluginKey,
        ) -> Result<Vec<VulnerabilityRecord>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.records.get(key.as_str()).cloned().unwrap_or(Ok(Vec::new()))
        }
    }

    fn record(id: &str, cve: &str) -> VulnerabilityRecord {
        VulnerabilityRecord {
            id: Some(id.to_string()),
            title: format!("Issue {}", id),
            cve: vec![cve.to_string()],
            fixed_in: None,
            references: vec![format!("https://example.org/{}", id)],
        }
    }

    fn site(url: &str, plugins: &[(&str, VersionToken)]) -> SiteFingerprint {
        let detections: Detections = plugins.iter().cloned().collect();
        SiteFingerprint::new(url, detections)
    }

    fn auditor(registry: FakeRegistry, vulns: FakeVulns) -> Auditor<FakeRegistry, FakeVulns> {
        Auditor::new(registry, vulns).with_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_shared_plugin_looked_up_once() {
        let registry = FakeRegistry::default().with("contact-form-7", Ok("5.8"));
        let registry_calls = registry.calls.clone();
        let vulns = FakeVulns::enabled();
        let vuln_calls = vulns.calls.clone();

        let sites = vec![
            site("https://a.example", &[("Contact Form 7", VersionToken::visible("5.7"))]),
            site("https://b.example", &[("contact form 7", VersionToken::visible("5.8"))]),
        ];

        let mut auditor = auditor(registry, vulns);
        let entries = auditor.audit(&sites).await;

        assert_eq!(registry_calls.load(Ordering::SeqCst), 1);
        assert_eq!(vuln_calls.load(Ordering::SeqCst), 1);
        assert_eq!(auditor.cache().hits(), 2);

        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_stale());
        assert!(!entries[1].is_stale());
        for entry in &entries {
            let verdict = entry.verdict.as_ref().unwrap();
            assert_eq!(verdict.authoritative.as_deref(), Some("5.8"));
        }
    }

    #[tokio::test]
    async fn test_empty_and_failed_sites_appear_once() {
        let sites = vec![
            SiteFingerprint::failed("https://down.example", "request timed out"),
            site("https://static.example", &[]),
            site("https://wp.example", &[("akismet", VersionToken::NotVisible)]),
        ];

        let mut auditor = auditor(FakeRegistry::default(), FakeVulns::enabled());
        let entries = auditor.audit(&sites).await;

        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_failure());
        assert_eq!(entries[0].error.as_deref(), Some("request timed out"));
        assert!(entries[0].verdict.is_none());
        assert!(entries[1].is_failure());
        assert_eq!(entries[1].error.as_deref(), Some(NO_PLUGINS_DETECTED));
        assert_eq!(entries[2].plugin.as_deref(), Some("akismet"));
    }

    #[tokio::test]
    async fn test_order_follows_sites_then_detections() {
        let sites = vec![
            site(
                "https://b.example",
                &[
                    ("zeta", VersionToken::visible("1.0")),
                    ("alpha", VersionToken::visible("1.0")),
                ],
            ),
            site("https://a.example", &[("mid", VersionToken::NotVisible)]),
        ];

        let mut auditor = auditor(FakeRegistry::default(), FakeVulns::enabled());
        let entries = auditor.audit(&sites).await;

        let order: Vec<_> = entries
            .iter()
            .map(|e| (e.site.as_str(), e.plugin.as_deref().unwrap_or("")))
            .collect();
        assert_eq!(
            order,
            vec![
                ("https://b.example", "zeta"),
                ("https://b.example", "alpha"),
                ("https://a.example", "mid"),
            ]
        );
    }

    #[tokio::test]
    async fn test_registry_failure_degrades_to_not_stale() {
        let registry = FakeRegistry::default().with("akismet", Err(LookupError::Timeout));
        let registry_calls = registry.calls.clone();
        let sites = vec![
            site("https://a.example", &[("akismet", VersionToken::visible("1.0"))]),
            site("https://b.example", &[("akismet", VersionToken::visible("1.0"))]),
        ];

        let mut auditor = auditor(registry, FakeVulns::enabled());
        let entries = auditor.audit(&sites).await;

        assert_eq!(registry_calls.load(Ordering::SeqCst), 1);
        for entry in &entries {
            assert!(!entry.is_stale());
            assert_eq!(entry.registry_error, Some(LookupError::Timeout));
            assert_eq!(entry.verdict.as_ref().unwrap().authoritative, None);
        }
    }

    #[tokio::test]
    async fn test_not_visible_is_never_stale() {
        let registry = FakeRegistry::default().with("akismet", Ok("5.3"));
        let sites = vec![site(
            "https://a.example",
            &[("akismet", VersionToken::from("versión no visible".to_string()))],
        )];

        let mut auditor = auditor(registry, FakeVulns::enabled());
        let entries = auditor.audit(&sites).await;
        assert!(!entries[0].is_stale());
    }

    #[tokio::test]
    async fn test_vulnerability_failure_is_recorded() {
        let vulns = FakeVulns::enabled().with("akismet", Err(LookupError::Status(503)));
        let sites = vec![site("https://a.example", &[("akismet", VersionToken::visible("5.3"))])];

        let mut auditor = auditor(FakeRegistry::default(), vulns);
        let entries = auditor.audit(&sites).await;

        assert!(entries[0].vulnerabilities.is_empty());
        assert_eq!(entries[0].vulnerability_error, Some(LookupError::Status(503)));
    }

    #[tokio::test]
    async fn test_disabled_source_is_never_called() {
        let vulns = FakeVulns::disabled().with("akismet", Ok(vec![record("1", "2023-0001")]));
        let vuln_calls = vulns.calls.clone();
        let sites = vec![site("https://a.example", &[("akismet", VersionToken::visible("5.3"))])];

        let mut auditor = auditor(FakeRegistry::default(), vulns);
        let entries = auditor.audit(&sites).await;

        assert_eq!(vuln_calls.load(Ordering::SeqCst), 0);
        assert!(entries[0].vulnerabilities.is_empty());
        assert_eq!(entries[0].vulnerability_error, None);
    }

    #[tokio::test]
    async fn test_vulnerabilities_attached_and_ignored() {
        let vulns = FakeVulns::enabled().with(
            "akismet",
            Ok(vec![record("a", "2023-0001"), record("b", "2023-0002")]),
        );
        let ignore = IgnoreConfig {
            vulnerabilities: vec!["CVE-2023-0002".to_string()],
        };
        let sites = vec![site("https://a.example", &[("akismet", VersionToken::visible("5.3"))])];

        let mut auditor = auditor(FakeRegistry::default(), vulns).with_ignore(ignore);
        let entries = auditor.audit(&sites).await;

        assert!(entries[0].is_vulnerable());
        assert_eq!(entries[0].vulnerabilities.len(), 1);
        assert_eq!(entries[0].vulnerabilities[0].id.as_deref(), Some("a"));
    }
}
