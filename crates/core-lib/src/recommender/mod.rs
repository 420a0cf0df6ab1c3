//! Dose recommendation: learned policy plus safety-clamped heuristic
//!
//! The policy artifact is optional. When it cannot be found or loaded the
//! recommender answers with an explicit "unavailable" outcome instead of
//! failing the call.

mod heuristic;

pub use heuristic::{DoseHeuristic, POLICY_TREND_ESTIMATE};

use crate::artifacts::{ArtifactStore, PolicyModel};
use crate::cache::ArtifactCache;
use crate::config::{ArtifactConfig, DoseConfig};
use crate::error::{guard_inference, EngineError, Result};
use crate::models::{DoseOutcome, DoseRecommendation, DoseRequest};
use crate::observability::{EngineMetrics, StructuredLogger};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Locates and caches the decision policy
pub struct PolicyResolver {
    store: Arc<dyn ArtifactStore>,
    cache: ArtifactCache<dyn PolicyModel>,
    candidates: Vec<PathBuf>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl PolicyResolver {
    pub fn new(store: Arc<dyn ArtifactStore>, config: &ArtifactConfig) -> Self {
        Self {
            store,
            cache: ArtifactCache::new(),
            candidates: policy_candidates(&config.policy),
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::default(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Paths searched for the policy, in order
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    pub fn is_loaded(&self) -> bool {
        !self.cache.is_empty()
    }

    pub fn resolve(&self) -> Result<Arc<dyn PolicyModel>> {
        let path = self
            .candidates
            .iter()
            .find(|path| self.store.exists(path))
            .ok_or_else(|| {
                EngineError::ArtifactUnavailable(format!(
                    "Policy model not found at {:?}",
                    self.candidates[0]
                ))
            })?;

        let policy = self
            .cache
            .get_or_load(path, || {
                let policy = self.store.load_policy(path)?;
                self.metrics.inc_artifact_loads("policy");
                self.logger
                    .log_artifact_loaded("policy", &path.display().to_string());
                Ok(policy)
            })
            .map_err(|err| {
                EngineError::ArtifactUnavailable(format!(
                    "Could not load policy model {:?}: {:#}",
                    path, err
                ))
            })?;
        self.metrics
            .set_cached_artifacts("policy", self.cache.len() as i64);
        Ok(policy)
    }
}

/// The configured path, then the same path with `.onnx` appended
fn policy_candidates(configured: &std::path::Path) -> Vec<PathBuf> {
    let mut candidates = vec![configured.to_path_buf()];
    if configured.extension().map_or(true, |ext| ext != "onnx") {
        let mut with_ext = OsString::from(configured.as_os_str());
        with_ext.push(".onnx");
        candidates.push(PathBuf::from(with_ext));
    }
    candidates
}

pub struct DoseRecommender {
    policy: PolicyResolver,
    heuristic: DoseHeuristic,
    config: DoseConfig,
    logger: StructuredLogger,
}

impl DoseRecommender {
    pub fn new(policy: PolicyResolver, config: DoseConfig) -> Self {
        Self {
            policy,
            heuristic: DoseHeuristic::new(config.clone()),
            config,
            logger: StructuredLogger::default(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn policy(&self) -> &PolicyResolver {
        &self.policy
    }

    pub fn recommend(&self, request: &DoseRequest) -> DoseOutcome {
        match self.try_recommend(request) {
            Ok(recommendation) => DoseOutcome::Recommended(recommendation),
            Err(err) => {
                if let EngineError::ArtifactUnavailable(reason) = &err {
                    self.logger.log_policy_unavailable(reason);
                }
                DoseOutcome::unavailable(&err)
            }
        }
    }

    pub fn try_recommend(&self, request: &DoseRequest) -> Result<DoseRecommendation> {
        let policy = self.policy.resolve()?;

        let observation = self.heuristic.observation(request);
        let action = guard_inference(|| policy.select_action(&observation))?;
        let policy_dose = action as f64 * self.config.action_scale;
        debug!(action = action, policy_dose = policy_dose, "Policy action selected");

        // The policy dose is reported but not blended into the final number
        let dose = self.heuristic.dose(request);
        let recommended_dose = (dose * 10.0).round() / 10.0;

        self.logger
            .log_dose(request.current_value, request.nutrients, recommended_dose, policy_dose);

        Ok(DoseRecommendation {
            recommended_dose,
            confidence: self.config.confidence,
            reasoning: self.heuristic.rationale(request),
            policy_dose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{MemoryArtifactStore, POLICY_FEATURES};
    use crate::error::ErrorKind;
    use std::path::Path;
    use std::sync::Mutex;

    struct FixedAction {
        action: i64,
        seen: Mutex<Vec<[f32; POLICY_FEATURES]>>,
    }

    impl FixedAction {
        fn new(action: i64) -> Self {
            Self {
                action,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl PolicyModel for FixedAction {
        fn select_action(&self, observation: &[f32; POLICY_FEATURES]) -> anyhow::Result<i64> {
            self.seen.lock().unwrap().push(*observation);
            Ok(self.action)
        }
    }

    struct BrokenPolicy;

    impl PolicyModel for BrokenPolicy {
        fn select_action(&self, _observation: &[f32; POLICY_FEATURES]) -> anyhow::Result<i64> {
            anyhow::bail!("q-network output has wrong rank")
        }
    }

    fn recommender(store: Arc<MemoryArtifactStore>) -> DoseRecommender {
        let config = ArtifactConfig::default();
        DoseRecommender::new(PolicyResolver::new(store, &config), DoseConfig::default())
    }

    fn store_with_policy(policy: Arc<dyn PolicyModel>) -> Arc<MemoryArtifactStore> {
        let store = Arc::new(MemoryArtifactStore::new());
        store.insert_policy("aura_dqn_agent", policy);
        store
    }

    #[test]
    fn test_policy_candidates() {
        assert_eq!(
            policy_candidates(Path::new("aura_dqn_agent")),
            vec![PathBuf::from("aura_dqn_agent"), PathBuf::from("aura_dqn_agent.onnx")]
        );
        assert_eq!(
            policy_candidates(Path::new("agent.v2")),
            vec![PathBuf::from("agent.v2"), PathBuf::from("agent.v2.onnx")]
        );
        assert_eq!(
            policy_candidates(Path::new("policy.onnx")),
            vec![PathBuf::from("policy.onnx")]
        );
    }

    #[test]
    fn test_missing_policy_is_unavailable_not_fatal() {
        let recommender = recommender(Arc::new(MemoryArtifactStore::new()));
        let outcome = recommender.recommend(&DoseRequest::new(180.0).nutrients(45.0));

        match outcome {
            DoseOutcome::Unavailable { kind, error } => {
                assert_eq!(kind, ErrorKind::ArtifactUnavailable);
                assert!(error.contains("Policy model not found"));
            }
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_policy_found_with_onnx_extension() {
        let store = Arc::new(MemoryArtifactStore::new());
        store.insert_policy("aura_dqn_agent.onnx", Arc::new(FixedAction::new(2)));
        let recommender = recommender(store);

        let outcome = recommender.recommend(&DoseRequest::new(110.0));
        assert!(outcome.recommendation().is_some());
    }

    #[test]
    fn test_corrupt_policy_is_unavailable() {
        let store = Arc::new(MemoryArtifactStore::new());
        store.insert_corrupt("aura_dqn_agent");
        let recommender = recommender(store);

        let outcome = recommender.recommend(&DoseRequest::new(180.0));
        assert!(matches!(
            outcome,
            DoseOutcome::Unavailable {
                kind: ErrorKind::ArtifactUnavailable,
                ..
            }
        ));
    }

    #[test]
    fn test_policy_failure_is_internal_error() {
        let recommender = recommender(store_with_policy(Arc::new(BrokenPolicy)));
        let outcome = recommender.recommend(&DoseRequest::new(180.0));
        assert!(matches!(
            outcome,
            DoseOutcome::Unavailable {
                kind: ErrorKind::InternalPredictionFailure,
                ..
            }
        ));
    }

    #[test]
    fn test_target_reading_recommends_zero() {
        let recommender = recommender(store_with_policy(Arc::new(FixedAction::new(4))));
        let outcome = recommender.recommend(&DoseRequest::new(110.0));
        let rec = outcome.recommendation().unwrap();

        assert_eq!(rec.recommended_dose, 0.0);
        assert_eq!(rec.confidence, 0.9);
        assert_eq!(rec.policy_dose, 2.0);
    }

    #[test]
    fn test_policy_dose_is_not_blended() {
        let low = recommender(store_with_policy(Arc::new(FixedAction::new(0))));
        let high = recommender(store_with_policy(Arc::new(FixedAction::new(10))));
        let request = DoseRequest::new(210.0).nutrients(60.0);

        let low = low.recommend(&request);
        let high = high.recommend(&request);
        assert_eq!(
            low.recommendation().unwrap().recommended_dose,
            high.recommendation().unwrap().recommended_dose
        );
        assert_eq!(high.recommendation().unwrap().policy_dose, 5.0);
    }

    #[test]
    fn test_dose_rounded_to_one_decimal() {
        let recommender = recommender(store_with_policy(Arc::new(FixedAction::new(1))));
        // 50/12 = 4.1666..
        let outcome = recommender.recommend(&DoseRequest::new(100.0).nutrients(50.0));
        assert_eq!(outcome.recommendation().unwrap().recommended_dose, 4.2);
    }

    #[test]
    fn test_dose_never_leaves_safe_range() {
        let recommender = recommender(store_with_policy(Arc::new(FixedAction::new(3))));
        for &current in &[0.0, 40.0, 110.0, 250.0, 400.0, 1000.0] {
            for &nutrients in &[0.0, 15.0, 120.0, 1000.0] {
                for &activity in &[false, true] {
                    for stress in [0u8, 5, 6, 10] {
                        let request = DoseRequest::new(current)
                            .nutrients(nutrients)
                            .recent_activity(activity)
                            .stress_level(stress);
                        let dose = recommender
                            .recommend(&request)
                            .recommendation()
                            .unwrap()
                            .recommended_dose;
                        assert!((0.0..=20.0).contains(&dose), "dose {} for {:?}", dose, request);
                    }
                }
            }
        }
    }

    #[test]
    fn test_policy_receives_observation_and_loads_once() {
        let policy = Arc::new(FixedAction::new(1));
        let store = store_with_policy(policy.clone());
        let recommender = recommender(store.clone());

        let request = DoseRequest::new(160.0).time_of_day(7).hours_since_last_action(1.0);
        recommender.recommend(&request);
        recommender.recommend(&request);

        assert_eq!(store.load_count("aura_dqn_agent"), 1);
        assert!(recommender.policy().is_loaded());
        let seen = policy.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], [160.0, 0.0, 7.0, 2.0, 1.0]);
    }
}
