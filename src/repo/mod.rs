//! Persistence: model artifacts, history input, region registry and output files

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::{GroupKey, Source};
use crate::ml::models::{PointModel, QuantileModel};
use crate::ml::training::Manifest;
use crate::ml::ModelKind;

pub mod files;
pub mod history;
pub mod memory;
pub mod output;
pub mod registry;

pub use files::FileModelStore;
pub use history::{export_history, load_history, read_history};
pub use memory::InMemoryModelStore;

/// Identity of one persisted model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelKey {
    pub region: String,
    pub source: Source,
    pub kind: ModelKind,
}

impl ModelKey {
    pub fn new(group: &GroupKey, kind: ModelKind) -> Self {
        Self {
            region: group.region.clone(),
            source: group.source,
            kind,
        }
    }

    /// e.g. `model_point_north_Solar.bin`, `model_q95_north_Wind.bin`
    pub fn file_name(&self) -> String {
        format!("model_{}_{}_{}.bin", self.kind.tag(), self.region, self.source)
    }
}

/// A persisted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelArtifact {
    Point(PointModel),
    Quantile(QuantileModel),
}

/// Keyed storage for trained models and the training manifest
pub trait ModelStore: Send + Sync {
    fn save(&self, key: &ModelKey, artifact: &ModelArtifact) -> Result<()>;

    /// `Ok(None)` when no artifact exists for the key
    fn load(&self, key: &ModelKey) -> Result<Option<ModelArtifact>>;

    fn write_manifest(&self, manifest: &Manifest) -> Result<()>;

    fn read_manifest(&self) -> Result<Option<Manifest>>;

    /// Human-readable location (directory path or `memory`)
    fn location(&self) -> String;

    fn load_point(&self, group: &GroupKey) -> Result<Option<PointModel>> {
        match self.load(&ModelKey::new(group, ModelKind::Point))? {
            None => Ok(None),
            Some(ModelArtifact::Point(model)) => Ok(Some(model)),
            Some(ModelArtifact::Quantile(_)) => {
                anyhow::bail!("artifact for {group} point model holds a quantile model")
            }
        }
    }

    fn load_quantile(&self, group: &GroupKey, quantile: f64) -> Result<Option<QuantileModel>> {
        match self.load(&ModelKey::new(group, ModelKind::Quantile(quantile)))? {
            None => Ok(None),
            Some(ModelArtifact::Quantile(model)) => Ok(Some(model)),
            Some(ModelArtifact::Point(_)) => {
                anyhow::bail!("artifact for {group} quantile {quantile} holds a point model")
            }
        }
    }
}
