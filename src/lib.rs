pub mod artifact;
pub mod audit;
pub mod cache;
pub mod checker;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod output;
pub mod scanner;

pub use audit::Auditor;
pub use cache::LookupCache;
pub use config::Config;
pub use error::{ArtifactError, LookupError};
pub use model::{
    AuditEntry, AuditReport, DetectionReport, Detections, PluginKey, SiteFingerprint,
    VersionToken, VersionVerdict, VulnerabilityRecord,
};
