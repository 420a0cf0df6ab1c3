//! Rule-based adjustment of a baseline forecast for hypothetical events
//!
//! Nutrient intake raises the forecast on a delayed, growing curve; activity
//! lowers it by a flat amount from an earlier step. The adjusted forecast is
//! re-bounded with the same constraints as the baseline, and an uncertainty
//! band widening along the horizon is derived from it.

use super::ConstraintEnforcer;
use crate::config::{AdjustmentConfig, EngineConfig};
use crate::error::EngineError;
use crate::models::{
    ForecastResult, ForecastStatus, FutureEventContext, HybridForecast, PredictionBounds,
};
use tracing::debug;

pub struct EventAdjuster {
    enforcer: ConstraintEnforcer,
    config: AdjustmentConfig,
    horizon: usize,
}

impl EventAdjuster {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            enforcer: ConstraintEnforcer::with_config(config.constraints.clone()),
            config: config.adjustment.clone(),
            horizon: config.forecast.horizon,
        }
    }

    /// Blend `baseline` with the effects of `events`
    ///
    /// A failed baseline is carried through unchanged.
    pub fn adjust(
        &self,
        baseline: ForecastResult,
        events: Option<&FutureEventContext>,
    ) -> HybridForecast {
        if !baseline.is_success() {
            return HybridForecast::from_failed(baseline);
        }
        let Some(last_known) = baseline.last_known_value else {
            let err = EngineError::InternalPrediction(
                "Baseline forecast carries no last known value".to_string(),
            );
            return HybridForecast::from_failed(ForecastResult::error(&err));
        };

        let mut working: Vec<f64> = baseline.prediction.iter().map(|&v| v as f64).collect();
        if let Some(events) = events {
            if events.nutrients > 0.0 {
                self.apply_nutrients(&mut working, events.nutrients);
            }
            if let Some(label) = events.activity_label() {
                debug!(
                    activity = label,
                    duration_minutes = events.activity_duration,
                    "Applying activity effect"
                );
                self.apply_activity(&mut working);
            }
        }

        let bounded = self.enforcer.enforce(&working, last_known);
        let prediction_bounds = self.uncertainty_band(&bounded);

        HybridForecast {
            status: ForecastStatus::Success,
            error_kind: None,
            error_message: None,
            original_prediction: baseline.prediction,
            adjusted_prediction: bounded.iter().map(|v| v.round() as i64).collect(),
            prediction_bounds: Some(prediction_bounds),
            analysis: baseline.analysis,
            last_known_value: Some(last_known),
            model_source: baseline.model_source,
            generated_at: baseline.generated_at,
        }
    }

    /// Rise per step of the absorption curve for `nutrients` grams
    pub fn nutrient_impact(&self, nutrients: f64) -> f64 {
        (nutrients / self.config.nutrient_divisor) * self.config.nutrient_rise
            / self.horizon as f64
    }

    /// Constant drop per step caused by an activity
    pub fn activity_impact(&self) -> f64 {
        self.config.activity_drop / self.horizon as f64
    }

    fn apply_nutrients(&self, values: &mut [f64], nutrients: f64) {
        let impact = self.nutrient_impact(nutrients);
        let onset = self.config.nutrient_onset_step;
        for (step, value) in values.iter_mut().enumerate().skip(onset) {
            // Multiplier is 1 at the onset step and grows by 1 per step
            *value += impact * (step + 1 - onset) as f64;
        }
    }

    fn apply_activity(&self, values: &mut [f64]) {
        let impact = self.activity_impact();
        for value in values.iter_mut().skip(self.config.activity_onset_step) {
            *value -= impact;
        }
    }

    fn uncertainty_band(&self, bounded: &[f64]) -> PredictionBounds {
        let variability = self.config.default_variability;
        let half_width =
            |step: usize| variability * (1.0 + self.config.band_widening * step as f64);

        PredictionBounds {
            upper: bounded
                .iter()
                .enumerate()
                .map(|(i, v)| (v + half_width(i)).round() as i64)
                .collect(),
            lower: bounded
                .iter()
                .enumerate()
                .map(|(i, v)| (v - half_width(i)).round() as i64)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::BindingSource;

    fn baseline(values: Vec<i64>, last_known: f64) -> ForecastResult {
        ForecastResult::success(values, last_known, None, BindingSource::Default)
    }

    fn adjuster() -> EventAdjuster {
        EventAdjuster::new(&EngineConfig::default())
    }

    #[test]
    fn test_nutrient_impact_per_step() {
        let adjuster = adjuster();
        assert!((adjuster.nutrient_impact(120.0) - 3.5).abs() < 1e-9);
        assert!((adjuster.activity_impact() - 25.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_events_leaves_forecast_unchanged() {
        let adjuster = adjuster();
        let original = vec![121, 123, 126, 128, 130, 131, 132, 132, 131, 130, 128, 127];
        let hybrid = adjuster.adjust(baseline(original.clone(), 120.0), None);
        assert_eq!(hybrid.adjusted_prediction, original);
        assert_eq!(hybrid.original_prediction, original);

        let zero = FutureEventContext::with_nutrients(0.0);
        let hybrid = adjuster.adjust(baseline(original.clone(), 120.0), Some(&zero));
        assert_eq!(hybrid.adjusted_prediction, original);
    }

    #[test]
    fn test_nutrients_raise_forecast_after_delay() {
        let adjuster = adjuster();
        let events = FutureEventContext::with_nutrients(120.0);
        let hybrid = adjuster.adjust(baseline(vec![130; 12], 130.0), Some(&events));
        let adjusted = &hybrid.adjusted_prediction;

        assert_eq!(&adjusted[..3], &[130, 130, 130]);
        assert!(adjusted[3] > adjusted[2]);
        for i in 4..12 {
            assert!(adjusted[i] > adjusted[i - 1], "step {} not rising: {:?}", i, adjusted);
        }
        assert_eq!(adjusted[3], 134);
        assert_eq!(adjusted[11], 162);
    }

    #[test]
    fn test_activity_lowers_forecast_from_step_two() {
        let adjuster = adjuster();
        let events = FutureEventContext::default().with_activity("running", 30.0);
        let hybrid = adjuster.adjust(baseline(vec![150; 12], 150.0), Some(&events));
        let adjusted = &hybrid.adjusted_prediction;

        assert_eq!(&adjusted[..2], &[150, 150]);
        // 150 - 25/12
        assert!(adjusted[2..].iter().all(|&v| v == 148));
    }

    #[test]
    fn test_large_meal_still_respects_constraints() {
        let adjuster = adjuster();
        let events = FutureEventContext::with_nutrients(1000.0).with_activity("walk", 10.0);
        let hybrid = adjuster.adjust(baseline(vec![395; 12], 395.0), Some(&events));

        let mut previous = 395;
        for &value in &hybrid.adjusted_prediction {
            assert!((40..=400).contains(&value));
            assert!((value - previous).abs() <= 4);
            previous = value;
        }
    }

    #[test]
    fn test_uncertainty_band_widens_with_horizon() {
        let adjuster = adjuster();
        let hybrid = adjuster.adjust(baseline(vec![100; 12], 100.0), None);
        let bounds = hybrid.prediction_bounds.unwrap();

        assert_eq!(bounds.upper[0], 105);
        assert_eq!(bounds.lower[0], 95);
        assert_eq!(bounds.upper[10], 110);
        assert_eq!(bounds.lower[10], 90);
        for i in 1..12 {
            assert!(bounds.upper[i] - bounds.lower[i] >= bounds.upper[i - 1] - bounds.lower[i - 1]);
        }
    }

    #[test]
    fn test_failed_baseline_propagates_unchanged() {
        let adjuster = adjuster();
        let err = EngineError::InsufficientHistory {
            required: 12,
            actual: 4,
        };
        let events = FutureEventContext::with_nutrients(60.0);
        let hybrid = adjuster.adjust(ForecastResult::error(&err), Some(&events));

        assert!(!hybrid.is_success());
        assert_eq!(hybrid.error_kind, Some(ErrorKind::InsufficientHistory));
        assert!(hybrid.adjusted_prediction.is_empty());
        assert!(hybrid.prediction_bounds.is_none());
    }
}
