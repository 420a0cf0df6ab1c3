//! Engine façade wiring resolution, forecasting, adjustment and dosing

use crate::artifacts::{ArtifactStore, FsArtifactStore};
use crate::config::EngineConfig;
use crate::models::{
    Assessment, DoseOutcome, DoseRequest, EntityId, FutureEventContext, HybridForecast,
    IntentContext,
};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::predictor::{AutoregressiveForecaster, EventAdjuster};
use crate::recommender::{DoseRecommender, PolicyResolver};
use crate::resolver::ModelResolver;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Reading assumed for an intent that arrives without any history
const DEFAULT_CURRENT_VALUE: f64 = 120.0;

/// Artifact availability found by [`Engine::preflight`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightReport {
    pub forecaster_ready: bool,
    pub policy_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecaster_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_error: Option<String>,
}

pub struct Engine {
    config: EngineConfig,
    resolver: Arc<ModelResolver>,
    forecaster: AutoregressiveForecaster,
    adjuster: EventAdjuster,
    recommender: DoseRecommender,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl Engine {
    /// Build an engine over `store`; an invalid configuration is rejected
    pub fn new(store: Arc<dyn ArtifactStore>, config: EngineConfig) -> anyhow::Result<Self> {
        config.validate().context("Invalid engine configuration")?;
        let resolver = Arc::new(ModelResolver::new(store.clone(), &config.artifacts));
        let policy = PolicyResolver::new(store, &config.artifacts);
        Ok(Self {
            forecaster: AutoregressiveForecaster::new(resolver.clone(), &config),
            adjuster: EventAdjuster::new(&config),
            recommender: DoseRecommender::new(policy, config.dose.clone()),
            resolver,
            config,
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::default(),
        })
    }

    /// Engine reading ONNX and JSON artifacts from the configured root
    pub fn from_config(config: EngineConfig) -> anyhow::Result<Self> {
        let store = FsArtifactStore::new(config.artifacts.root.clone(), config.forecast.window);
        Self::new(Arc::new(store), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    /// Forecast the next readings, optionally perturbed by future events
    pub fn forecast(
        &self,
        entity_id: EntityId,
        history: &[f64],
        future_events: Option<&FutureEventContext>,
        include_analysis: bool,
    ) -> HybridForecast {
        let start = Instant::now();
        let baseline = self.forecaster.forecast(entity_id, history, true);
        let mut forecast = self.adjuster.adjust(baseline, future_events);
        if !include_analysis {
            forecast.analysis = None;
        }
        self.metrics
            .observe_forecast_latency(start.elapsed().as_secs_f64());

        match (forecast.error_kind, forecast.last_known_value, forecast.model_source) {
            (None, Some(last_known), Some(source)) => {
                self.metrics.inc_forecasts("success");
                self.logger.log_forecast(
                    entity_id,
                    forecast.adjusted_prediction.len(),
                    last_known,
                    source,
                    future_events.is_some(),
                );
            }
            (kind, _, _) => {
                let kind = kind.map(|k| k.as_str()).unwrap_or("unknown");
                self.metrics.inc_forecasts(kind);
                self.logger.log_forecast_error(
                    entity_id,
                    kind,
                    forecast.error_message.as_deref().unwrap_or_default(),
                );
            }
        }
        forecast
    }

    pub fn recommend_dose(&self, request: &DoseRequest) -> DoseOutcome {
        let start = Instant::now();
        let outcome = self.recommender.recommend(request);
        self.metrics.observe_dose_latency(start.elapsed().as_secs_f64());
        let label = match &outcome {
            DoseOutcome::Recommended(_) => "recommended",
            DoseOutcome::Unavailable { kind, .. } => kind.as_str(),
        };
        self.metrics.inc_dose_outcomes(label);
        outcome
    }

    /// Dose and forecast for entities already extracted from an intent
    pub fn assess(
        &self,
        entity_id: EntityId,
        history: &[f64],
        intent: &IntentContext,
    ) -> Assessment {
        let current_value = history.last().copied().unwrap_or(DEFAULT_CURRENT_VALUE);
        let events = FutureEventContext {
            nutrients: intent.nutrients,
            activity: intent.activity.clone(),
            activity_duration: intent.activity_duration,
        };

        let request = DoseRequest::new(current_value)
            .nutrients(intent.nutrients)
            .recent_activity(events.activity_label().is_some())
            .stress_level(intent.stress_level);

        Assessment {
            dose_recommendation: self.recommend_dose(&request),
            prediction: self.forecast(entity_id, history, Some(&events), true),
        }
    }

    /// Load the default forecasting pair and the policy once
    pub fn preflight(&self) -> PreflightReport {
        let forecaster_error = self.resolver.resolve_default().err().map(|e| e.to_string());
        let policy_error = self
            .recommender
            .policy()
            .resolve()
            .err()
            .map(|e| e.to_string());

        let report = PreflightReport {
            forecaster_ready: forecaster_error.is_none(),
            policy_ready: policy_error.is_none(),
            forecaster_error,
            policy_error,
        };
        self.logger
            .log_preflight(report.forecaster_ready, report.policy_ready);
        report
    }
}
