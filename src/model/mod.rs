//! Core data types for detections, verdicts and audit results.
//!
//! This module contains the fundamental types used throughout wpaudit:
//!
//! - [`PluginKey`] - Normalized plugin identifier used for lookups
//! - [`VersionToken`] - An observed version, or the "not visible" marker
//! - [`Detections`] - Ordered plugin → version mapping for one page
//! - [`SiteFingerprint`] - Detections for one site
//! - [`VersionVerdict`] - Observed vs published version and staleness
//! - [`VulnerabilityRecord`] - A vulnerability relayed from the source
//! - [`AuditEntry`] / [`AuditReport`] - Final per-site, per-plugin results
//!
//! # Example
//!
//! ```
//! use wpaudit::model::{Detections, SiteFingerprint, VersionToken};
//!
//! let mut detections = Detections::new();
//! detections.insert("akismet", VersionToken::visible("5.3"));
//! let site = SiteFingerprint::new("https://example.com", detections);
//!
//! assert_eq!(site.detections.len(), 1);
//! ```

mod audit;
mod plugin;

pub use audit::*;
pub use plugin::*;
