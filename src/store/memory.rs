//! In-memory artifacts.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{merge_fields, Artifact, ArtifactStore};
use crate::error::{Error, Result};

/// Keeps artifacts in a map; used when nothing should touch the disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: Mutex<HashMap<String, Artifact>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .artifacts
            .lock()
            .map(|a| a.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl ArtifactStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Artifact>> {
        let artifacts = self
            .artifacts
            .lock()
            .map_err(|_| Error::Checkpoint("artifact map poisoned".into()))?;
        Ok(artifacts.get(key).cloned())
    }

    fn merge(&self, key: &str, fields: Artifact) -> Result<()> {
        let mut artifacts = self
            .artifacts
            .lock()
            .map_err(|_| Error::Checkpoint("artifact map poisoned".into()))?;
        merge_fields(artifacts.entry(key.to_string()).or_default(), fields);
        Ok(())
    }
}
