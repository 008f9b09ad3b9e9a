//! Error types shared by the scanner, the lookup sources and the run
//! artifacts.
//!
//! External calls never surface these to the operator directly. The
//! pipeline degrades each one to a conservative default and keeps the
//! error on the audit entry so the report can say why enrichment is
//! missing.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Why a single external call (site fetch, registry or vulnerability
/// lookup) did not produce a usable answer.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum LookupError {
    #[error("request timed out")]
    Timeout,

    #[error("not found")]
    NotFound,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

impl LookupError {
    /// Maps a non-success HTTP status to the matching variant.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::NOT_FOUND {
            LookupError::NotFound
        } else {
            LookupError::Status(status.as_u16())
        }
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LookupError::Timeout
        } else if err.is_decode() {
            LookupError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            LookupError::from_status(status)
        } else {
            LookupError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LookupError {
    fn from(err: serde_json::Error) -> Self {
        LookupError::Malformed(err.to_string())
    }
}

/// Failures reading or writing the JSON artifacts passed between stages.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact not found at {}: {remediation}", path.display())]
    Missing { path: PathBuf, remediation: String },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
