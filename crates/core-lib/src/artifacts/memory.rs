//! In-process artifact store

use super::{ArtifactStore, FeatureScaler, PolicyModel, SequenceModel};
use anyhow::Result;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
enum Entry {
    Model(Arc<dyn SequenceModel>),
    Scaler(Arc<dyn FeatureScaler>),
    Policy(Arc<dyn PolicyModel>),
    /// Present on the store but unloadable
    Corrupt,
}

/// Artifact store backed by already-constructed artifacts
///
/// Useful when the host process builds its models itself. Every load is
/// counted per path.
#[derive(Default)]
pub struct MemoryArtifactStore {
    entries: DashMap<PathBuf, Entry>,
    loads: DashMap<PathBuf, usize>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_model(&self, path: impl Into<PathBuf>, model: Arc<dyn SequenceModel>) {
        self.entries.insert(path.into(), Entry::Model(model));
    }

    pub fn insert_scaler(&self, path: impl Into<PathBuf>, scaler: Arc<dyn FeatureScaler>) {
        self.entries.insert(path.into(), Entry::Scaler(scaler));
    }

    pub fn insert_policy(&self, path: impl Into<PathBuf>, policy: Arc<dyn PolicyModel>) {
        self.entries.insert(path.into(), Entry::Policy(policy));
    }

    /// Register a path that exists but fails every load
    pub fn insert_corrupt(&self, path: impl Into<PathBuf>) {
        self.entries.insert(path.into(), Entry::Corrupt);
    }

    /// Number of load attempts made for `path`
    pub fn load_count(&self, path: impl AsRef<Path>) -> usize {
        self.loads.get(path.as_ref()).map(|n| *n).unwrap_or(0)
    }

    fn fetch(&self, path: &Path) -> Result<Entry> {
        *self.loads.entry(path.to_path_buf()).or_insert(0) += 1;
        match self.entries.get(path) {
            Some(entry) => match entry.value() {
                Entry::Corrupt => anyhow::bail!("Artifact {:?} is corrupted", path),
                other => Ok(other.clone()),
            },
            None => anyhow::bail!("Artifact {:?} not found", path),
        }
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn exists(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    fn load_model(&self, path: &Path) -> Result<Arc<dyn SequenceModel>> {
        match self.fetch(path)? {
            Entry::Model(model) => Ok(model),
            _ => anyhow::bail!("Artifact {:?} is not a forecasting model", path),
        }
    }

    fn load_scaler(&self, path: &Path) -> Result<Arc<dyn FeatureScaler>> {
        match self.fetch(path)? {
            Entry::Scaler(scaler) => Ok(scaler),
            _ => anyhow::bail!("Artifact {:?} is not a scaler", path),
        }
    }

    fn load_policy(&self, path: &Path) -> Result<Arc<dyn PolicyModel>> {
        match self.fetch(path)? {
            Entry::Policy(policy) => Ok(policy),
            _ => anyhow::bail!("Artifact {:?} is not a policy", path),
        }
    }
}
