//! JSON artifacts handed from one stage to the next.
//!
//! `detect` writes a [`DetectionReport`], `verify` reads it and writes an
//! [`AuditReport`], `report` reads both. The detection artifact is
//! required downstream; the audit artifact is optional for `report`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::ArtifactError;
use crate::model::{AuditReport, DetectionReport};

/// Hint shown when the detection artifact is missing.
pub const DETECT_FIRST: &str = "run `wpaudit detect` first";

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ArtifactError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ArtifactError::Json {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let io_err = |source: std::io::Error| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let json = serde_json::to_string_pretty(value).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(io_err)
}

pub fn save_detections(path: &Path, report: &DetectionReport) -> Result<(), ArtifactError> {
    write_json(path, report)
}

/// Loads the detection artifact. A missing file is an error carrying the
/// remediation hint.
pub fn load_detections(path: &Path) -> Result<DetectionReport, ArtifactError> {
    read_json(path)?.ok_or_else(|| ArtifactError::Missing {
        path: path.to_path_buf(),
        remediation: DETECT_FIRST.to_string(),
    })
}

pub fn save_audit(path: &Path, report: &AuditReport) -> Result<(), ArtifactError> {
    write_json(path, report)
}

/// Loads the audit artifact, or `None` when it was never produced.
pub fn load_audit_optional(path: &Path) -> Result<Option<AuditReport>, ArtifactError> {
    read_json(path)
}
