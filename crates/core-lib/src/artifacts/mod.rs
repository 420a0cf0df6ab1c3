//! Trained artifacts consumed by the engine
//!
//! Models are opaque capabilities: a fixed-shape numeric input goes in, a
//! fixed-shape numeric output comes out. Nothing outside this module knows
//! which framework produced them.

mod memory;
mod onnx;
mod scaler;
mod store;

pub use memory::MemoryArtifactStore;
pub use onnx::{InferenceStats, OnnxPolicyModel, OnnxSequenceModel, POLICY_FEATURES};
pub use scaler::MinMaxScaler;
pub use store::FsArtifactStore;

use crate::models::EntityId;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Sequence model predicting the next scaled reading from a window of scaled readings
pub trait SequenceModel: Send + Sync {
    fn predict_next(&self, window: &[f32]) -> Result<f32>;
}

/// Maps readings to and from model input space
pub trait FeatureScaler: Send + Sync {
    fn transform(&self, values: &[f64]) -> Result<Vec<f32>>;

    fn inverse_transform(&self, scaled: f32) -> Result<f64>;
}

/// Decision policy choosing a discrete action from an observation
pub trait PolicyModel: Send + Sync {
    fn select_action(&self, observation: &[f32; POLICY_FEATURES]) -> Result<i64>;
}

/// Source of trained artifacts, addressed by path
pub trait ArtifactStore: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn load_model(&self, path: &Path) -> Result<Arc<dyn SequenceModel>>;

    fn load_scaler(&self, path: &Path) -> Result<Arc<dyn FeatureScaler>>;

    fn load_policy(&self, path: &Path) -> Result<Arc<dyn PolicyModel>>;
}

/// Derive an entity-specific artifact path from a shared one
///
/// `glucose_predictor.onnx` becomes `glucose_predictor_user_7.onnx`.
pub fn personalized_path(base: &Path, entity_id: EntityId) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match base.extension() {
        Some(ext) => format!("{}_user_{}.{}", stem, entity_id, ext.to_string_lossy()),
        None => format!("{}_user_{}", stem, entity_id),
    };
    base.with_file_name(file_name)
}
