use anyhow::Result;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::{ModelArtifact, ModelKey, ModelStore};
use crate::ml::training::Manifest;

/// Process-local model store, used by tests and dry runs
#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    artifacts: Mutex<BTreeMap<String, ModelArtifact>>,
    manifest: Mutex<Option<Manifest>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.lock().is_empty()
    }

    pub fn remove(&self, key: &ModelKey) -> Option<ModelArtifact> {
        self.artifacts.lock().remove(&key.file_name())
    }

    pub fn keys(&self) -> Vec<String> {
        self.artifacts.lock().keys().cloned().collect()
    }
}

impl ModelStore for InMemoryModelStore {
    fn save(&self, key: &ModelKey, artifact: &ModelArtifact) -> Result<()> {
        self.artifacts.lock().insert(key.file_name(), artifact.clone());
        Ok(())
    }

    fn load(&self, key: &ModelKey) -> Result<Option<ModelArtifact>> {
        Ok(self.artifacts.lock().get(&key.file_name()).cloned())
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        *self.manifest.lock() = Some(manifest.clone());
        Ok(())
    }

    fn read_manifest(&self) -> Result<Option<Manifest>> {
        Ok(self.manifest.lock().clone())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
