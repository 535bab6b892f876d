//! Artifacts as JSON files in an output directory.

use std::fs;
use std::path::{Path, PathBuf};

use super::{merge_fields, Artifact, ArtifactStore};
use crate::error::{Error, Result};
use crate::render::{to_json, JsonFormat};

/// Stores each artifact as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
    format: JsonFormat,
}

impl LocalStore {
    /// Create a store; the directory is created on first write.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            format: JsonFormat::Pretty,
        }
    }

    /// Set the JSON format of written files.
    pub fn with_format(mut self, format: JsonFormat) -> Self {
        self.format = format;
        self
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path of an artifact.
    pub fn path_of(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl ArtifactStore for LocalStore {
    fn load(&self, key: &str) -> Result<Option<Artifact>> {
        let path = self.path_of(key);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| Error::Checkpoint(format!("'{}': {}", path.display(), e)))
    }

    fn merge(&self, key: &str, fields: Artifact) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_of(key);

        let mut artifact = match self.load(key) {
            Ok(existing) => existing.unwrap_or_default(),
            Err(Error::Checkpoint(message)) => {
                log::warn!("Replacing unreadable artifact {}", message);
                Artifact::new()
            }
            Err(e) => return Err(e),
        };
        merge_fields(&mut artifact, fields);

        let json = to_json(&artifact, self.format)?;
        fs::write(&path, json)?;
        log::debug!("Wrote '{}'", path.display());
        Ok(())
    }
}
