//! Filesystem artifact store

use super::{
    ArtifactStore, FeatureScaler, MinMaxScaler, OnnxPolicyModel, OnnxSequenceModel, PolicyModel,
    SequenceModel,
};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Artifact store rooted at a directory
///
/// Relative paths are resolved against the root; absolute paths are used as is.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
    window: usize,
}

impl FsArtifactStore {
    /// `window` fixes the input shape of loaded sequence models
    pub fn new(root: impl Into<PathBuf>, window: usize) -> Self {
        Self {
            root: root.into(),
            window,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn read(&self, path: &Path, kind: &str) -> Result<Vec<u8>> {
        let full = self.full_path(path);
        let bytes =
            fs::read(&full).with_context(|| format!("Failed to read {} file {:?}", kind, full))?;
        info!(
            kind = kind,
            path = %full.display(),
            size = bytes.len(),
            checksum = %compute_checksum(&bytes),
            "Read artifact from disk"
        );
        Ok(bytes)
    }
}

impl ArtifactStore for FsArtifactStore {
    fn exists(&self, path: &Path) -> bool {
        self.full_path(path).is_file()
    }

    fn load_model(&self, path: &Path) -> Result<Arc<dyn SequenceModel>> {
        let bytes = self.read(path, "model")?;
        let model = OnnxSequenceModel::from_bytes(&bytes, self.window)
            .with_context(|| format!("Invalid forecasting model {:?}", path))?;
        Ok(Arc::new(model))
    }

    fn load_scaler(&self, path: &Path) -> Result<Arc<dyn FeatureScaler>> {
        let bytes = self.read(path, "scaler")?;
        let scaler = MinMaxScaler::from_json(&bytes)
            .with_context(|| format!("Invalid scaler {:?}", path))?;
        Ok(Arc::new(scaler))
    }

    fn load_policy(&self, path: &Path) -> Result<Arc<dyn PolicyModel>> {
        let bytes = self.read(path, "policy")?;
        let policy = OnnxPolicyModel::from_bytes(&bytes)
            .with_context(|| format!("Invalid policy model {:?}", path))?;
        Ok(Arc::new(policy))
    }
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
