use crate::model::{Detections, VersionToken};
use regex::Regex;
use std::sync::LazyLock;

/// Plugin asset path followed, on the same line, by a `ver=` parameter.
static VERSIONED_PLUGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/wp-content/plugins/([a-zA-Z0-9_-]+)/.*?ver=([0-9.]+)")
        .expect("versioned plugin pattern is valid")
});

/// Plugin asset path with or without a version.
static BARE_PLUGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/wp-content/plugins/([a-zA-Z0-9_-]+)/").expect("bare plugin pattern is valid")
});

/// Extracts plugin identifiers and versions from page markup.
///
/// Versioned references are collected first. Identifiers that only ever
/// appear without a version are then appended as
/// [`VersionToken::NotVisible`]. A plugin seen with a version anywhere on
/// the page keeps that version.
pub fn extract_plugins(html: &str) -> Detections {
    let mut detections = Detections::new();

    for caps in VERSIONED_PLUGIN.captures_iter(html) {
        detections.insert(&caps[1], VersionToken::visible(&caps[2]));
    }

    for caps in BARE_PLUGIN.captures_iter(html) {
        detections.insert_if_absent(&caps[1], VersionToken::NotVisible);
    }

    detections
}
