//! Persisted per-document artifacts.
//!
//! An artifact is a flat JSON object. Writers merge by shallow key
//! overwrite: keys present in a write replace the stored value, every other
//! stored key survives. Stages therefore only write the keys they own.

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// JSON object stored under one key.
pub type Artifact = Map<String, Value>;

/// Suffix of the terminal normalized artifact key.
pub const NORMALIZED_SUFFIX: &str = "_normalized";

/// Key-value store of JSON artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Load an artifact; `Ok(None)` when nothing is stored under `key`.
    fn load(&self, key: &str) -> Result<Option<Artifact>>;

    /// Merge `fields` into the artifact stored under `key`.
    fn merge(&self, key: &str, fields: Artifact) -> Result<()>;
}

/// Shallow key overwrite of `fields` into `target`.
pub fn merge_fields(target: &mut Artifact, fields: Artifact) {
    for (key, value) in fields {
        target.insert(key, value);
    }
}

/// Builder for the fields of one write.
#[derive(Debug, Default)]
pub struct Fields(Artifact);

impl Fields {
    /// Create an empty field set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a serializable field.
    pub fn with<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Result<Self> {
        self.0.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Finish the field set.
    pub fn build(self) -> Artifact {
        self.0
    }
}

/// Read a typed field from an artifact.
///
/// A missing key is `Ok(None)`; a value of the wrong shape is a checkpoint
/// error.
pub fn field<T: DeserializeOwned>(artifact: &Artifact, key: &str) -> Result<Option<T>> {
    match artifact.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| Error::Checkpoint(format!("field '{}': {}", key, e))),
    }
}
