//! Forecasting artifact resolution
//!
//! An entity uses its personalized model/scaler pair when both files are on
//! the store, and the shared default pair otherwise. Loaded pairs are cached
//! by model path for the life of the process.

use crate::artifacts::{personalized_path, ArtifactStore, FeatureScaler, SequenceModel};
use crate::cache::ArtifactCache;
use crate::config::{ArtifactConfig, FallbackPolicy};
use crate::error::{EngineError, Result};
use crate::models::{BindingSource, EntityId, GENERIC_ENTITY_ID};
use crate::observability::{EngineMetrics, StructuredLogger};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A loaded model and the scaler it was trained with
pub struct ModelBinding {
    pub model: Arc<dyn SequenceModel>,
    pub scaler: Arc<dyn FeatureScaler>,
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
    pub loaded_at: i64,
}

impl std::fmt::Debug for ModelBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBinding")
            .field("model_path", &self.model_path)
            .field("scaler_path", &self.scaler_path)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// Binding chosen for a request and the path that led to it
#[derive(Debug, Clone)]
pub struct Resolution {
    pub binding: Arc<ModelBinding>,
    pub source: BindingSource,
}

pub struct ModelResolver {
    store: Arc<dyn ArtifactStore>,
    cache: ArtifactCache<ModelBinding>,
    default_model: PathBuf,
    default_scaler: PathBuf,
    fallback: FallbackPolicy,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl ModelResolver {
    pub fn new(store: Arc<dyn ArtifactStore>, config: &ArtifactConfig) -> Self {
        Self {
            store,
            cache: ArtifactCache::new(),
            default_model: config.default_model.clone(),
            default_scaler: config.default_scaler.clone(),
            fallback: config.fallback,
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::default(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Resolve the model/scaler pair for an entity
    pub fn resolve(&self, entity_id: EntityId) -> Result<Resolution> {
        match self.try_personalized(entity_id) {
            None => Ok(Resolution {
                binding: self.resolve_default()?,
                source: BindingSource::Default,
            }),
            Some(Ok(binding)) => Ok(Resolution {
                binding,
                source: BindingSource::Personalized,
            }),
            Some(Err(err)) => self.handle_personalized_failure(entity_id, err),
        }
    }

    /// Resolve the shared default pair; failure here is fatal
    pub fn resolve_default(&self) -> Result<Arc<ModelBinding>> {
        self.load_binding(&self.default_model, &self.default_scaler)
            .map_err(|err| {
                EngineError::ArtifactUnavailable(format!(
                    "Default model {:?} is missing or corrupted: {:#}",
                    self.default_model, err
                ))
            })
    }

    /// Number of distinct bindings currently cached
    pub fn cached_bindings(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, model_path: &Path) -> bool {
        self.cache.contains(model_path)
    }

    /// `None` when the entity has no complete personalized pair on the store
    fn try_personalized(
        &self,
        entity_id: EntityId,
    ) -> Option<anyhow::Result<Arc<ModelBinding>>> {
        let model_path = personalized_path(&self.default_model, entity_id);
        let scaler_path = personalized_path(&self.default_scaler, entity_id);
        if !(self.store.exists(&model_path) && self.store.exists(&scaler_path)) {
            return None;
        }
        debug!(entity_id = entity_id, path = %model_path.display(), "Found personalized model");
        Some(self.load_binding(&model_path, &scaler_path))
    }

    fn handle_personalized_failure(
        &self,
        entity_id: EntityId,
        err: anyhow::Error,
    ) -> Result<Resolution> {
        let model_path = personalized_path(&self.default_model, entity_id);
        match self.fallback {
            FallbackPolicy::Propagate => Err(EngineError::ArtifactUnavailable(format!(
                "Personalized model {:?} could not be loaded: {:#}",
                model_path, err
            ))),
            FallbackPolicy::GenericEntity => {
                self.logger.log_fallback(
                    entity_id,
                    &model_path.display().to_string(),
                    &format!("{:#}", err),
                );
                self.metrics.inc_resolver_fallbacks();

                // The generic entity may carry its own pair; any failure there
                // drops straight to the default pair.
                let generic = if entity_id == GENERIC_ENTITY_ID {
                    None
                } else {
                    self.try_personalized(GENERIC_ENTITY_ID)
                        .and_then(|loaded| loaded.ok())
                };
                let binding = match generic {
                    Some(binding) => binding,
                    None => self.resolve_default()?,
                };
                Ok(Resolution {
                    binding,
                    source: BindingSource::Fallback,
                })
            }
        }
    }

    fn load_binding(&self, model_path: &Path, scaler_path: &Path) -> anyhow::Result<Arc<ModelBinding>> {
        let binding = self.cache.get_or_load(model_path, || {
            let model = self.store.load_model(model_path)?;
            let scaler = self.store.load_scaler(scaler_path)?;
            self.metrics.inc_artifact_loads("binding");
            self.logger
                .log_artifact_loaded("binding", &model_path.display().to_string());
            Ok(Arc::new(ModelBinding {
                model,
                scaler,
                model_path: model_path.to_path_buf(),
                scaler_path: scaler_path.to_path_buf(),
                loaded_at: chrono::Utc::now().timestamp(),
            }))
        })?;
        self.metrics
            .set_cached_artifacts("binding", self.cache.len() as i64);
        Ok(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{MemoryArtifactStore, MinMaxScaler};

    struct ConstantModel(f32);

    impl SequenceModel for ConstantModel {
        fn predict_next(&self, _window: &[f32]) -> anyhow::Result<f32> {
            Ok(self.0)
        }
    }

    fn store_with_default() -> Arc<MemoryArtifactStore> {
        let store = Arc::new(MemoryArtifactStore::new());
        store.insert_model("glucose_predictor.onnx", Arc::new(ConstantModel(0.5)));
        store.insert_scaler("scaler.json", Arc::new(MinMaxScaler::new(40.0, 400.0)));
        store
    }

    fn resolver(store: Arc<MemoryArtifactStore>, fallback: FallbackPolicy) -> ModelResolver {
        let config = ArtifactConfig {
            fallback,
            ..Default::default()
        };
        ModelResolver::new(store, &config)
    }

    #[test]
    fn test_default_pair_used_without_personalized_artifacts() {
        let store = store_with_default();
        let resolver = resolver(store.clone(), FallbackPolicy::GenericEntity);

        let resolution = resolver.resolve(7).unwrap();
        assert_eq!(resolution.source, BindingSource::Default);
        assert_eq!(
            resolution.binding.model_path,
            PathBuf::from("glucose_predictor.onnx")
        );
    }

    #[test]
    fn test_personalized_pair_preferred_when_complete() {
        let store = store_with_default();
        store.insert_model("glucose_predictor_user_7.onnx", Arc::new(ConstantModel(0.1)));
        store.insert_scaler("scaler_user_7.json", Arc::new(MinMaxScaler::new(50.0, 300.0)));
        let resolver = resolver(store.clone(), FallbackPolicy::GenericEntity);

        let resolution = resolver.resolve(7).unwrap();
        assert_eq!(resolution.source, BindingSource::Personalized);
        assert_eq!(
            resolution.binding.scaler_path,
            PathBuf::from("scaler_user_7.json")
        );
    }

    #[test]
    fn test_incomplete_personalized_pair_uses_default() {
        let store = store_with_default();
        store.insert_model("glucose_predictor_user_7.onnx", Arc::new(ConstantModel(0.1)));
        let resolver = resolver(store.clone(), FallbackPolicy::GenericEntity);

        let resolution = resolver.resolve(7).unwrap();
        assert_eq!(resolution.source, BindingSource::Default);
        assert_eq!(store.load_count("glucose_predictor_user_7.onnx"), 0);
    }

    #[test]
    fn test_corrupt_personalized_pair_falls_back_to_generic() {
        let store = store_with_default();
        store.insert_corrupt("glucose_predictor_user_9.onnx");
        store.insert_scaler("scaler_user_9.json", Arc::new(MinMaxScaler::new(40.0, 400.0)));
        let resolver = resolver(store.clone(), FallbackPolicy::GenericEntity);

        let resolution = resolver.resolve(9).unwrap();
        assert_eq!(resolution.source, BindingSource::Fallback);
        assert_eq!(
            resolution.binding.model_path,
            PathBuf::from("glucose_predictor.onnx")
        );
    }

    #[test]
    fn test_fallback_prefers_generic_entity_pair() {
        let store = store_with_default();
        store.insert_corrupt("glucose_predictor_user_9.onnx");
        store.insert_scaler("scaler_user_9.json", Arc::new(MinMaxScaler::new(40.0, 400.0)));
        store.insert_model("glucose_predictor_user_0.onnx", Arc::new(ConstantModel(0.2)));
        store.insert_scaler("scaler_user_0.json", Arc::new(MinMaxScaler::new(40.0, 400.0)));
        let resolver = resolver(store.clone(), FallbackPolicy::GenericEntity);

        let resolution = resolver.resolve(9).unwrap();
        assert_eq!(resolution.source, BindingSource::Fallback);
        assert_eq!(
            resolution.binding.model_path,
            PathBuf::from("glucose_predictor_user_0.onnx")
        );
    }

    #[test]
    fn test_propagate_policy_reports_personalized_failure() {
        let store = store_with_default();
        store.insert_corrupt("glucose_predictor_user_9.onnx");
        store.insert_scaler("scaler_user_9.json", Arc::new(MinMaxScaler::new(40.0, 400.0)));
        let resolver = resolver(store, FallbackPolicy::Propagate);

        let err = resolver.resolve(9).unwrap_err();
        assert!(matches!(err, EngineError::ArtifactUnavailable(_)));
    }

    #[test]
    fn test_missing_default_is_fatal() {
        let store = Arc::new(MemoryArtifactStore::new());
        let resolver = resolver(store, FallbackPolicy::GenericEntity);

        let err = resolver.resolve(1).unwrap_err();
        assert!(matches!(err, EngineError::ArtifactUnavailable(_)));
        assert!(err.to_string().contains("missing or corrupted"));
    }

    #[test]
    fn test_binding_loaded_once_per_path() {
        let store = store_with_default();
        let resolver = resolver(store.clone(), FallbackPolicy::GenericEntity);

        for entity in 1..=5 {
            resolver.resolve(entity).unwrap();
        }
        assert_eq!(store.load_count("glucose_predictor.onnx"), 1);
        assert_eq!(store.load_count("scaler.json"), 1);
        assert_eq!(resolver.cached_bindings(), 1);
        assert!(resolver.is_cached(Path::new("glucose_predictor.onnx")));
    }
}
