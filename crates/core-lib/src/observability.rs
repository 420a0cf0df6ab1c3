//! Observability infrastructure for the engine
//!
//! Provides:
//! - Prometheus metrics (latency, outcomes, artifact loads, fallbacks, slow inferences)
//! - Structured logging with tracing

use crate::models::{BindingSource, EntityId};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge_vec,
    Histogram, IntCounter, IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    forecast_latency_seconds: Histogram,
    dose_latency_seconds: Histogram,
    forecasts_total: IntCounterVec,
    dose_outcomes_total: IntCounterVec,
    artifact_loads_total: IntCounterVec,
    cached_artifacts: IntGaugeVec,
    resolver_fallbacks_total: IntCounter,
    slow_inferences_total: IntCounterVec,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            forecast_latency_seconds: register_histogram!(
                "aura_engine_forecast_latency_seconds",
                "Time spent producing a hybrid forecast",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register forecast_latency_seconds"),

            dose_latency_seconds: register_histogram!(
                "aura_engine_dose_latency_seconds",
                "Time spent producing a dose recommendation",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register dose_latency_seconds"),

            forecasts_total: register_int_counter_vec!(
                "aura_engine_forecasts_total",
                "Forecasts produced, by outcome",
                &["outcome"]
            )
            .expect("Failed to register forecasts_total"),

            dose_outcomes_total: register_int_counter_vec!(
                "aura_engine_dose_recommendations_total",
                "Dose recommendation calls, by outcome",
                &["outcome"]
            )
            .expect("Failed to register dose_recommendations_total"),

            artifact_loads_total: register_int_counter_vec!(
                "aura_engine_artifact_loads_total",
                "Artifacts loaded from the store, by kind",
                &["kind"]
            )
            .expect("Failed to register artifact_loads_total"),

            cached_artifacts: register_int_gauge_vec!(
                "aura_engine_cached_artifacts",
                "Artifacts currently held in the process cache, by kind",
                &["kind"]
            )
            .expect("Failed to register cached_artifacts"),

            resolver_fallbacks_total: register_int_counter!(
                "aura_engine_resolver_fallbacks_total",
                "Personalized artifact pairs replaced by the generic pair after a load failure"
            )
            .expect("Failed to register resolver_fallbacks_total"),

            slow_inferences_total: register_int_counter_vec!(
                "aura_engine_slow_inferences_total",
                "Model invocations exceeding the latency target, by artifact",
                &["artifact"]
            )
            .expect("Failed to register slow_inferences_total"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineMetrics").finish()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_forecast_latency(&self, duration_secs: f64) {
        self.inner().forecast_latency_seconds.observe(duration_secs);
    }

    pub fn observe_dose_latency(&self, duration_secs: f64) {
        self.inner().dose_latency_seconds.observe(duration_secs);
    }

    /// `outcome` is `success` or an error kind
    pub fn inc_forecasts(&self, outcome: &str) {
        self.inner().forecasts_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_dose_outcomes(&self, outcome: &str) {
        self.inner().dose_outcomes_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_artifact_loads(&self, kind: &str) {
        self.inner().artifact_loads_total.with_label_values(&[kind]).inc();
    }

    pub fn set_cached_artifacts(&self, kind: &str, count: i64) {
        self.inner().cached_artifacts.with_label_values(&[kind]).set(count);
    }

    pub fn inc_resolver_fallbacks(&self) {
        self.inner().resolver_fallbacks_total.inc();
    }

    pub fn inc_slow_inferences(&self, artifact: &str) {
        self.inner()
            .slow_inferences_total
            .with_label_values(&[artifact])
            .inc();
    }
}

/// Structured logger for engine events
///
/// Provides consistent logging for forecasts, recommendations, artifact
/// lifecycle and process lifecycle.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    service: String,
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new("aura-engine")
    }
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Log a completed forecast
    pub fn log_forecast(
        &self,
        entity_id: EntityId,
        horizon: usize,
        last_known_value: f64,
        source: BindingSource,
        adjusted: bool,
    ) {
        info!(
            event = "forecast_generated",
            service = %self.service,
            entity_id = entity_id,
            horizon = horizon,
            last_known_value = last_known_value,
            model_source = ?source,
            adjusted = adjusted,
            "Generated hybrid forecast"
        );
    }

    /// Log a failed forecast
    pub fn log_forecast_error(&self, entity_id: EntityId, kind: &str, message: &str) {
        warn!(
            event = "forecast_failed",
            service = %self.service,
            entity_id = entity_id,
            error_kind = %kind,
            error = %message,
            "Forecast failed"
        );
    }

    /// Log an artifact entering the process cache
    pub fn log_artifact_loaded(&self, kind: &str, path: &str) {
        info!(
            event = "artifact_loaded",
            service = %self.service,
            kind = %kind,
            path = %path,
            "Loaded artifact into cache for the first time"
        );
    }

    /// Log a personalized pair replaced by the generic pair
    pub fn log_fallback(&self, entity_id: EntityId, path: &str, error: &str) {
        warn!(
            event = "artifact_fallback",
            service = %self.service,
            entity_id = entity_id,
            path = %path,
            error = %error,
            "Personalized model failed to load, substituting generic model"
        );
    }

    /// Log a dose recommendation
    pub fn log_dose(&self, current_value: f64, nutrients: f64, dose: f64, policy_dose: f64) {
        info!(
            event = "dose_recommended",
            service = %self.service,
            current_value = current_value,
            nutrients = nutrients,
            recommended_dose = dose,
            policy_dose = policy_dose,
            "Generated dose recommendation"
        );
    }

    /// Log the policy being unavailable for a recommendation
    pub fn log_policy_unavailable(&self, reason: &str) {
        warn!(
            event = "policy_unavailable",
            service = %self.service,
            reason = %reason,
            "No policy artifact available, AI recommendation skipped"
        );
    }

    pub fn log_startup(&self, version: &str, artifact_root: &str) {
        info!(
            event = "engine_started",
            service = %self.service,
            version = %version,
            artifact_root = %artifact_root,
            "Forecasting engine started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            service = %self.service,
            reason = %reason,
            "Forecasting engine shutting down"
        );
    }

    /// Log the availability of artifacts found at startup
    pub fn log_preflight(&self, forecaster_ready: bool, policy_ready: bool) {
        if forecaster_ready && policy_ready {
            info!(
                event = "preflight",
                service = %self.service,
                forecaster_ready = true,
                policy_ready = true,
                "All artifacts available"
            );
        } else {
            warn!(
                event = "preflight",
                service = %self.service,
                forecaster_ready = forecaster_ready,
                policy_ready = policy_ready,
                "Some artifacts are unavailable"
            );
        }
        debug!(service = %self.service, "Preflight complete");
    }
}
