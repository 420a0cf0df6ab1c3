//! Closed-form dose heuristic and policy observation

use crate::artifacts::POLICY_FEATURES;
use crate::config::DoseConfig;
use crate::models::DoseRequest;

/// Trend fed to the policy. The policy was calibrated against a zero trend,
/// so this stays fixed until it is retrained with real trend input.
pub const POLICY_TREND_ESTIMATE: f32 = 0.0;

#[derive(Debug, Clone)]
pub struct DoseHeuristic {
    config: DoseConfig,
}

impl DoseHeuristic {
    pub fn new(config: DoseConfig) -> Self {
        Self { config }
    }

    /// Units covering a nutrient intake
    pub fn nutrient_bolus(&self, nutrients: f64) -> f64 {
        if nutrients > 0.0 {
            nutrients / self.config.nutrient_ratio
        } else {
            0.0
        }
    }

    /// Units bringing the reading back to target; never negative
    pub fn correction(&self, current_value: f64) -> f64 {
        ((current_value - self.config.target_value) / self.config.sensitivity_factor).max(0.0)
    }

    /// Heuristic dose after context multipliers and the safety clamp
    pub fn dose(&self, request: &DoseRequest) -> f64 {
        let mut total = self.nutrient_bolus(request.nutrients) + self.correction(request.current_value);

        if request.recent_activity {
            total *= self.config.activity_multiplier;
        }
        if request.stress_level > self.config.stress_threshold {
            total *= 1.0 + request.stress_level as f64 * self.config.stress_coefficient;
        }

        if total.is_nan() {
            return 0.0;
        }
        total.clamp(0.0, self.config.max_dose)
    }

    fn hours_since_last_action(&self, request: &DoseRequest) -> f64 {
        request
            .hours_since_last_action
            .unwrap_or(self.config.default_hours_since_last_action)
    }

    /// Remaining effect of the previous action, decaying to zero after two hours
    pub fn active_effect(&self, hours_since_last_action: f64) -> f64 {
        (4.0 - hours_since_last_action * 2.0).max(0.0)
    }

    /// Fixed-shape policy input:
    /// `[current, trend, time of day, active effect, hours since last action]`
    pub fn observation(&self, request: &DoseRequest) -> [f32; POLICY_FEATURES] {
        let hours = self.hours_since_last_action(request);
        let time_of_day = request.time_of_day.unwrap_or(self.config.default_time_of_day);
        [
            request.current_value as f32,
            POLICY_TREND_ESTIMATE,
            time_of_day as f32,
            self.active_effect(hours) as f32,
            // Meal timing proxy
            hours as f32,
        ]
    }

    pub fn rationale(&self, request: &DoseRequest) -> String {
        let mut reason = format!(
            "Calculated for {}g carbs and a current glucose of {}.",
            request.nutrients, request.current_value
        );
        if request.recent_activity {
            reason.push_str(" Adjusted for recent exercise.");
        }
        reason
    }
}
