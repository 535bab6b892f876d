//! Document identifiers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum DocumentSource {
    /// A local file
    Path(PathBuf),
    /// A public http(s) URL
    Url(String),
}

impl DocumentSource {
    /// Classify a document identifier.
    ///
    /// Identifiers starting with `http://` or `https://` are URLs, anything
    /// else is a local path. An empty identifier is rejected.
    pub fn parse(identifier: &str) -> Result<Self> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(Error::MissingDocument);
        }
        let lower = identifier.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(DocumentSource::Url(identifier.to_string()))
        } else {
            Ok(DocumentSource::Path(PathBuf::from(identifier)))
        }
    }

    /// Create a source from a local path.
    pub fn path(path: impl AsRef<Path>) -> Self {
        DocumentSource::Path(path.as_ref().to_path_buf())
    }

    /// Check whether the source is remote.
    pub fn is_url(&self) -> bool {
        matches!(self, DocumentSource::Url(_))
    }

    /// Key under which this document's artifacts are stored.
    ///
    /// For paths this is the file name up to its first `.`. For URLs it is
    /// the last path segment with characters outside `[A-Za-z0-9_.-]`
    /// replaced by `_`, cut the same way.
    pub fn artifact_key(&self) -> String {
        match self {
            DocumentSource::Path(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let stem = name.split('.').next().unwrap_or_default();
                if stem.is_empty() {
                    "document".to_string()
                } else {
                    stem.to_string()
                }
            }
            DocumentSource::Url(url) => url_key(url),
        }
    }
}

fn url_key(url: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars = UNSAFE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_.-]").unwrap());

    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let path = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let path = path.split_once('/').map(|(_, p)| p).unwrap_or("");
    let segment = path.rsplit('/').next().unwrap_or_default();
    let segment = if segment.is_empty() { "url_doc" } else { segment };

    let sanitized = unsafe_chars.replace_all(segment, "_");
    let stem = sanitized.split('.').next().unwrap_or_default();
    if stem.is_empty() {
        "url_document".to_string()
    } else {
        stem.to_string()
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Path(path) => write!(f, "{}", path.display()),
            DocumentSource::Url(url) => f.write_str(url),
        }
    }
}
