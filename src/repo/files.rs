//! Model store backed by a directory of bincode files

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{ModelArtifact, ModelKey, ModelStore};
use crate::ml::training::Manifest;

pub const MANIFEST_FILE: &str = "groups_trained.json";

/// One `.bin` file per model plus a JSON manifest
#[derive(Debug, Clone)]
pub struct FileModelStore {
    dir: PathBuf,
}

impl FileModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create model dir {}", self.dir.display()))
    }
}

impl ModelStore for FileModelStore {
    fn save(&self, key: &ModelKey, artifact: &ModelArtifact) -> Result<()> {
        self.ensure_dir()?;
        let path = self.dir.join(key.file_name());
        let bytes = bincode::serialize(artifact).context("failed to encode model artifact")?;
        fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        debug!(path = %path.display(), "saved model artifact");
        Ok(())
    }

    fn load(&self, key: &ModelKey) -> Result<Option<ModelArtifact>> {
        let path = self.dir.join(key.file_name());
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let artifact = bincode::deserialize(&bytes)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        Ok(Some(artifact))
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        self.ensure_dir()?;
        let path = self.dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(manifest)?;
        fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    fn read_manifest(&self) -> Result<Option<Manifest>> {
        let path = self.dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}
