use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Marker written in place of a version when a plugin path was seen
/// without a `ver=` query parameter.
pub const NOT_VISIBLE: &str = "version not visible";

/// Canonical lookup key for a plugin: lowercase, spaces replaced by hyphens.
///
/// Two identifiers that normalize to the same key are treated as the same
/// registry and vulnerability subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginKey(String);

impl PluginKey {
    /// Normalizes a plugin identifier. Only case and spaces change; dots,
    /// underscores and existing hyphens are kept as they are.
    pub fn normalize(identifier: &str) -> Self {
        Self(identifier.to_lowercase().replace(' ', "-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A version as observed in page markup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VersionToken {
    Visible(String),
    NotVisible,
}

impl VersionToken {
    pub fn visible(version: impl Into<String>) -> Self {
        VersionToken::Visible(version.into())
    }

    /// Returns the version string, or `None` for the "not visible" marker.
    pub fn as_visible(&self) -> Option<&str> {
        match self {
            VersionToken::Visible(v) => Some(v),
            VersionToken::NotVisible => None,
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, VersionToken::Visible(_))
    }
}

/// Recognizes the marker in artifacts, including hand-edited or localized
/// spellings such as "versión no visible".
fn is_not_visible_marker(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    lower.is_empty() || lower.contains("not visible") || lower.contains("no visible")
}

impl From<String> for VersionToken {
    fn from(s: String) -> Self {
        if is_not_visible_marker(&s) {
            VersionToken::NotVisible
        } else {
            VersionToken::Visible(s)
        }
    }
}

impl From<VersionToken> for String {
    fn from(token: VersionToken) -> Self {
        match token {
            VersionToken::Visible(v) => v,
            VersionToken::NotVisible => NOT_VISIBLE.to_string(),
        }
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionToken::Visible(v) => f.write_str(v),
            VersionToken::NotVisible => f.write_str(NOT_VISIBLE),
        }
    }
}

/// Plugin identifier → observed version, in first-seen order.
///
/// Serialized as a JSON object whose key order matches insertion order, so
/// reports stay stable between runs over the same markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detections {
    entries: Vec<(String, VersionToken)>,
}

impl Detections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, plugin: &str) -> Option<&VersionToken> {
        self.entries
            .iter()
            .find(|(name, _)| name == plugin)
            .map(|(_, version)| version)
    }

    pub fn contains(&self, plugin: &str) -> bool {
        self.get(plugin).is_some()
    }

    /// Sets the version for `plugin`. An existing entry keeps its position
    /// and takes the new value.
    pub fn insert(&mut self, plugin: impl Into<String>, version: VersionToken) {
        let plugin = plugin.into();
        match self.entries.iter_mut().find(|(name, _)| *name == plugin) {
            Some((_, existing)) => *existing = version,
            None => self.entries.push((plugin, version)),
        }
    }

    /// Adds `plugin` only if it is not already present. Returns whether it
    /// was added.
    pub fn insert_if_absent(&mut self, plugin: impl Into<String>, version: VersionToken) -> bool {
        let plugin = plugin.into();
        if self.contains(&plugin) {
            return false;
        }
        self.entries.push((plugin, version));
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VersionToken)> {
        self.entries.iter().map(|(name, version)| (name.as_str(), version))
    }

    pub fn visible_count(&self) -> usize {
        self.entries.iter().filter(|(_, v)| v.is_visible()).count()
    }
}

impl<K: Into<String>> FromIterator<(K, VersionToken)> for Detections {
    fn from_iter<I: IntoIterator<Item = (K, VersionToken)>>(iter: I) -> Self {
        let mut detections = Detections::new();
        for (plugin, version) in iter {
            detections.insert(plugin, version);
        }
        detections
    }
}

impl Serialize for Detections {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (plugin, version) in &self.entries {
            map.serialize_entry(plugin, version)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Detections {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DetectionsVisitor;

        impl<'de> Visitor<'de> for DetectionsVisitor {
            type Value = Detections;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of plugin identifiers to versions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut detections = Detections::new();
                while let Some((plugin, version)) = access.next_entry::<String, VersionToken>()? {
                    detections.insert(plugin, version);
                }
                Ok(detections)
            }
        }

        deserializer.deserialize_map(DetectionsVisitor)
    }
}

/// Plugins detected on one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteFingerprint {
    pub site: String,
    pub detections: Detections,
    /// Set when the page could not be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SiteFingerprint {
    pub fn new(site: impl Into<String>, detections: Detections) -> Self {
        Self {
            site: site.into(),
            detections,
            error: None,
        }
    }

    /// A site whose fetch failed. It carries no detections.
    pub fn failed(site: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            detections: Detections::new(),
            error: Some(error.into()),
        }
    }
}

/// Output of the detection stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub scanned_at: DateTime<Utc>,
    pub sites: Vec<SiteFingerprint>,
}

impl DetectionReport {
    pub fn new(sites: Vec<SiteFingerprint>) -> Self {
        Self {
            scanned_at: Utc::now(),
            sites,
        }
    }

    pub fn plugin_count(&self) -> usize {
        self.sites.iter().map(|s| s.detections.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_hyphenates_spaces() {
        assert_eq!(PluginKey::normalize("Contact Form 7").as_str(), "contact-form-7");
        assert_eq!(PluginKey::normalize("My Plugin"), PluginKey::normalize("my plugin"));
    }

    #[test]
    fn test_normalize_keeps_other_characters() {
        assert_eq!(PluginKey::normalize("WP_Super.Cache").as_str(), "wp_super.cache");
        assert_eq!(PluginKey::normalize("my--plugin").as_str(), "my--plugin");
        // Spaces and hyphens converge because only spaces are rewritten.
        assert_eq!(PluginKey::normalize("My Plugin"), PluginKey::normalize("my-plugin"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["Contact Form 7", "akismet", "Yoast SEO Premium", "a b  c"] {
            let once = PluginKey::normalize(raw);
            let twice = PluginKey::normalize(once.as_str());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_version_token_marker_spellings() {
        assert_eq!(VersionToken::from(NOT_VISIBLE.to_string()), VersionToken::NotVisible);
        assert_eq!(
            VersionToken::from("versión no visible".to_string()),
            VersionToken::NotVisible
        );
        assert_eq!(VersionToken::from(String::new()), VersionToken::NotVisible);
        assert_eq!(
            VersionToken::from("5.3".to_string()),
            VersionToken::Visible("5.3".to_string())
        );
    }

    #[test]
    fn test_detections_insert_keeps_position() {
        let mut d = Detections::new();
        d.insert("akismet", VersionToken::visible("5.2"));
        d.insert("jetpack", VersionToken::visible("12.0"));
        d.insert("akismet", VersionToken::visible("5.3"));

        let order: Vec<_> = d.iter().map(|(p, v)| (p.to_string(), v.to_string())).collect();
        assert_eq!(
            order,
            vec![
                ("akismet".to_string(), "5.3".to_string()),
                ("jetpack".to_string(), "12.0".to_string()),
            ]
        );
    }

    #[test]
    fn test_detections_insert_if_absent() {
        let mut d = Detections::new();
        d.insert("akismet", VersionToken::visible("5.3"));
        assert!(!d.insert_if_absent("akismet", VersionToken::NotVisible));
        assert!(d.insert_if_absent("jetpack", VersionToken::NotVisible));
        assert_eq!(d.get("akismet"), Some(&VersionToken::visible("5.3")));
        assert_eq!(d.visible_count(), 1);
    }

    #[test]
    fn test_detections_json_preserves_order() {
        let d: Detections = [
            ("zeta", VersionToken::visible("1.0")),
            ("alpha", VersionToken::NotVisible),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"zeta":"1.0","alpha":"version not visible"}"#);

        let back: Detections = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_site_fingerprint_failed_has_no_detections() {
        let site = SiteFingerprint::failed("https://down.example", "request timed out");
        assert!(site.detections.is_empty());
        assert_eq!(site.error.as_deref(), Some("request timed out"));

        let json = serde_json::to_value(&SiteFingerprint::new("https://ok.example", Detections::new()))
            .unwrap();
        assert!(json.get("error").is_none());
    }
}
