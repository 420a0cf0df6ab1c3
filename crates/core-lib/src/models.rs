//! Core data models for the forecasting and dosing engine

use crate::error::{EngineError, ErrorKind};
use serde::{Deserialize, Serialize};

/// Identifier of the entity whose readings are being forecast
pub type EntityId = u64;

/// Entity whose artifacts stand in when a personalized pair fails to load
pub const GENERIC_ENTITY_ID: EntityId = 0;

/// Outcome status of a forecasting call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastStatus {
    Success,
    Error,
}

/// Direction of the short-window trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

/// Trend annotation attached to a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    #[serde(rename = "trend")]
    pub direction: TrendDirection,
    /// Least-squares slope per reading, rounded to two decimals
    pub slope: f64,
}

/// Where the forecasting artifacts of a call came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingSource {
    /// Entity-specific model and scaler
    Personalized,
    /// Shared default pair, no personalized pair on the store
    Default,
    /// Personalized pair present but failed to load; generic artifacts substituted
    Fallback,
}

/// Baseline autoregressive forecast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub prediction: Vec<i64>,
    pub status: ForecastStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<TrendAnalysis>,
    /// Last true reading, used as the autoregressive and constraint seed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_known_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_source: Option<BindingSource>,
    pub generated_at: i64,
}

impl ForecastResult {
    pub fn success(
        prediction: Vec<i64>,
        last_known_value: f64,
        analysis: Option<TrendAnalysis>,
        model_source: BindingSource,
    ) -> Self {
        Self {
            prediction,
            status: ForecastStatus::Success,
            error_kind: None,
            error_message: None,
            analysis,
            last_known_value: Some(last_known_value),
            model_source: Some(model_source),
            generated_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Error result; the forecast is always empty
    pub fn error(err: &EngineError) -> Self {
        Self {
            prediction: Vec::new(),
            status: ForecastStatus::Error,
            error_kind: Some(err.kind()),
            error_message: Some(err.to_string()),
            analysis: None,
            last_known_value: None,
            model_source: None,
            generated_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ForecastStatus::Success
    }
}

/// Hypothetical future events used to perturb a baseline forecast
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FutureEventContext {
    /// Nutrient quantity in grams
    #[serde(default)]
    pub nutrients: f64,
    #[serde(default)]
    pub activity: Option<String>,
    /// Activity duration in minutes
    #[serde(default)]
    pub activity_duration: f64,
}

impl FutureEventContext {
    pub fn with_nutrients(nutrients: f64) -> Self {
        Self {
            nutrients,
            ..Default::default()
        }
    }

    pub fn with_activity(mut self, label: impl Into<String>, duration_minutes: f64) -> Self {
        self.activity = Some(label.into());
        self.activity_duration = duration_minutes;
        self
    }

    /// An empty label counts as no activity
    pub fn activity_label(&self) -> Option<&str> {
        self.activity.as_deref().filter(|label| !label.is_empty())
    }
}

/// Per-step uncertainty band around the adjusted forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionBounds {
    pub upper: Vec<i64>,
    pub lower: Vec<i64>,
}

/// Baseline forecast blended with event-driven adjustments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridForecast {
    pub status: ForecastStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Unadjusted baseline forecast
    pub original_prediction: Vec<i64>,
    pub adjusted_prediction: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_bounds: Option<PredictionBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<TrendAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_known_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_source: Option<BindingSource>,
    pub generated_at: i64,
}

impl HybridForecast {
    /// Carry a failed baseline through unchanged
    pub fn from_failed(baseline: ForecastResult) -> Self {
        Self {
            status: baseline.status,
            error_kind: baseline.error_kind,
            error_message: baseline.error_message,
            original_prediction: baseline.prediction,
            adjusted_prediction: Vec::new(),
            prediction_bounds: None,
            analysis: None,
            last_known_value: None,
            model_source: None,
            generated_at: baseline.generated_at,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ForecastStatus::Success
    }
}

/// Inputs for a corrective dose recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseRequest {
    pub current_value: f64,
    /// Nutrient quantity in grams
    #[serde(default)]
    pub nutrients: f64,
    /// Hour of day, 0-23
    #[serde(default)]
    pub time_of_day: Option<u8>,
    #[serde(default)]
    pub hours_since_last_action: Option<f64>,
    #[serde(default)]
    pub recent_activity: bool,
    /// Self-reported stress, 0-10
    #[serde(default)]
    pub stress_level: u8,
}

impl DoseRequest {
    pub fn new(current_value: f64) -> Self {
        Self {
            current_value,
            nutrients: 0.0,
            time_of_day: None,
            hours_since_last_action: None,
            recent_activity: false,
            stress_level: 0,
        }
    }

    pub fn nutrients(mut self, grams: f64) -> Self {
        self.nutrients = grams;
        self
    }

    pub fn time_of_day(mut self, hour: u8) -> Self {
        self.time_of_day = Some(hour);
        self
    }

    pub fn hours_since_last_action(mut self, hours: f64) -> Self {
        self.hours_since_last_action = Some(hours);
        self
    }

    pub fn recent_activity(mut self, active: bool) -> Self {
        self.recent_activity = active;
        self
    }

    pub fn stress_level(mut self, level: u8) -> Self {
        self.stress_level = level;
        self
    }
}

/// A recommended corrective dose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseRecommendation {
    /// Final dose, rounded to one decimal and always within the safe range
    pub recommended_dose: f64,
    pub confidence: f64,
    pub reasoning: String,
    /// Base correction derived from the policy action; reported, not blended
    pub policy_dose: f64,
}

/// Outcome of a dose recommendation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DoseOutcome {
    Recommended(DoseRecommendation),
    Unavailable { kind: ErrorKind, error: String },
}

impl DoseOutcome {
    pub fn unavailable(err: &EngineError) -> Self {
        DoseOutcome::Unavailable {
            kind: err.kind(),
            error: err.to_string(),
        }
    }

    pub fn recommendation(&self) -> Option<&DoseRecommendation> {
        match self {
            DoseOutcome::Recommended(rec) => Some(rec),
            DoseOutcome::Unavailable { .. } => None,
        }
    }
}

/// Entities already extracted from a user's message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentContext {
    #[serde(default)]
    pub nutrients: f64,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub activity_duration: f64,
    #[serde(default)]
    pub stress_level: u8,
}

/// Combined dose and forecast answer for one intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub dose_recommendation: DoseOutcome,
    pub prediction: HybridForecast,
}
