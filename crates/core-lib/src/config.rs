//! Engine configuration
//!
//! Every field has a default, so an empty source deserializes to the
//! standard physiological and dosing constants.

use anyhow::{ensure, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Readings consumed as model input context
pub const DEFAULT_WINDOW: usize = 12;

/// Future steps forecast per call
pub const DEFAULT_HORIZON: usize = 12;

/// What the resolver does when a personalized artifact pair fails to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Substitute the generic entity's artifacts and log the substitution
    #[default]
    GenericEntity,
    /// Report the load failure to the caller
    Propagate,
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub artifacts: ArtifactConfig,
    pub forecast: ForecastConfig,
    pub constraints: ConstraintConfig,
    pub trend: TrendConfig,
    pub adjustment: AdjustmentConfig,
    pub dose: DoseConfig,
}

impl EngineConfig {
    /// Reject settings that would make forecasting or dosing ill-defined
    pub fn validate(&self) -> Result<()> {
        let forecast = &self.forecast;
        ensure!(forecast.window >= 1, "forecast.window must be at least 1");
        ensure!(forecast.horizon >= 1, "forecast.horizon must be at least 1");

        let c = &self.constraints;
        ensure!(
            c.min_value.is_finite() && c.max_value.is_finite(),
            "constraints.min_value and constraints.max_value must be finite"
        );
        ensure!(
            c.min_value <= c.max_value,
            "constraints.min_value ({}) exceeds constraints.max_value ({})",
            c.min_value,
            c.max_value
        );
        ensure!(
            c.max_change_rate.is_finite() && c.max_change_rate >= 0.0,
            "constraints.max_change_rate must be a non-negative number, got {}",
            c.max_change_rate
        );

        ensure!(
            self.trend.slope_threshold.is_finite() && self.trend.slope_threshold >= 0.0,
            "trend.slope_threshold must be a non-negative number"
        );

        let a = &self.adjustment;
        ensure!(
            a.nutrient_divisor.is_finite() && a.nutrient_divisor > 0.0,
            "adjustment.nutrient_divisor must be positive"
        );
        for (name, value) in [
            ("adjustment.nutrient_rise", a.nutrient_rise),
            ("adjustment.activity_drop", a.activity_drop),
            ("adjustment.default_variability", a.default_variability),
            ("adjustment.band_widening", a.band_widening),
        ] {
            ensure!(value.is_finite() && value >= 0.0, "{} must be a non-negative number", name);
        }

        let d = &self.dose;
        ensure!(
            d.nutrient_ratio.is_finite() && d.nutrient_ratio > 0.0,
            "dose.nutrient_ratio must be positive"
        );
        ensure!(
            d.sensitivity_factor.is_finite() && d.sensitivity_factor > 0.0,
            "dose.sensitivity_factor must be positive"
        );
        ensure!(
            d.max_dose.is_finite() && d.max_dose >= 0.0,
            "dose.max_dose must be a non-negative number, got {}",
            d.max_dose
        );
        for (name, value) in [
            ("dose.target_value", d.target_value),
            ("dose.activity_multiplier", d.activity_multiplier),
            ("dose.stress_coefficient", d.stress_coefficient),
            ("dose.action_scale", d.action_scale),
            ("dose.confidence", d.confidence),
            ("dose.default_hours_since_last_action", d.default_hours_since_last_action),
        ] {
            ensure!(value.is_finite(), "{} must be finite", name);
        }
        ensure!(
            d.default_time_of_day < 24,
            "dose.default_time_of_day must be an hour between 0 and 23"
        );
        Ok(())
    }
}

/// Artifact store layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Directory holding model, scaler and policy files
    pub root: PathBuf,
    pub default_model: PathBuf,
    pub default_scaler: PathBuf,
    pub policy: PathBuf,
    pub fallback: FallbackPolicy,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            default_model: PathBuf::from("glucose_predictor.onnx"),
            default_scaler: PathBuf::from("scaler.json"),
            policy: PathBuf::from("aura_dqn_agent"),
            fallback: FallbackPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub window: usize,
    pub horizon: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            horizon: DEFAULT_HORIZON,
        }
    }
}

/// Physiological plausibility bounds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConstraintConfig {
    pub min_value: f64,
    pub max_value: f64,
    /// Largest change allowed between consecutive steps
    pub max_change_rate: f64,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            min_value: 40.0,
            max_value: 400.0,
            max_change_rate: 4.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Slope magnitude above which a trend is rising or falling
    pub slope_threshold: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            slope_threshold: 0.5,
        }
    }
}

/// Coefficients of the event-adjustment rules
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdjustmentConfig {
    pub nutrient_divisor: f64,
    /// Rise per `nutrient_divisor` grams, spread over the horizon
    pub nutrient_rise: f64,
    /// First step affected by nutrient intake
    pub nutrient_onset_step: usize,
    /// Total drop from an activity, spread over the horizon
    pub activity_drop: f64,
    /// First step affected by activity
    pub activity_onset_step: usize,
    /// Half-width of the uncertainty band at step 0
    pub default_variability: f64,
    /// Relative band widening per step
    pub band_widening: f64,
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            nutrient_divisor: 10.0,
            nutrient_rise: 3.5,
            nutrient_onset_step: 3,
            activity_drop: 25.0,
            activity_onset_step: 2,
            default_variability: 5.0,
            band_widening: 0.1,
        }
    }
}

/// Coefficients of the heuristic dose formula
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DoseConfig {
    /// Grams covered by one unit
    pub nutrient_ratio: f64,
    /// Reading drop per unit
    pub sensitivity_factor: f64,
    pub target_value: f64,
    pub activity_multiplier: f64,
    pub stress_threshold: u8,
    pub stress_coefficient: f64,
    pub max_dose: f64,
    /// Units per discrete policy action
    pub action_scale: f64,
    pub confidence: f64,
    pub default_time_of_day: u8,
    pub default_hours_since_last_action: f64,
}

impl Default for DoseConfig {
    fn default() -> Self {
        Self {
            nutrient_ratio: 12.0,
            sensitivity_factor: 50.0,
            target_value: 110.0,
            activity_multiplier: 0.7,
            stress_threshold: 5,
            stress_coefficient: 0.05,
            max_dose: 20.0,
            action_scale: 0.5,
            confidence: 0.9,
            default_time_of_day: 12,
            default_hours_since_last_action: 4.0,
        }
    }
}
