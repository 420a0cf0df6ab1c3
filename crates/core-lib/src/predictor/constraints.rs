//! Physiological plausibility constraints
//!
//! Raw model output and event-adjusted forecasts both pass through the same
//! two-stage clamp: first to within `max_change_rate` of the previous step,
//! then to the absolute range. The clamped value seeds the next step.

use crate::config::ConstraintConfig;

#[derive(Debug, Clone)]
pub struct ConstraintEnforcer {
    config: ConstraintConfig,
}

impl ConstraintEnforcer {
    pub fn new() -> Self {
        Self {
            config: ConstraintConfig::default(),
        }
    }

    pub fn with_config(config: ConstraintConfig) -> Self {
        Self { config }
    }

    /// Bound `predictions`, chaining from the last true reading
    pub fn enforce(&self, predictions: &[f64], last_known_value: f64) -> Vec<f64> {
        let rate = self.config.max_change_rate;
        let mut previous = last_known_value;
        predictions
            .iter()
            .map(|&candidate| {
                let bounded = candidate
                    .clamp(previous - rate, previous + rate)
                    .clamp(self.config.min_value, self.config.max_value);
                previous = bounded;
                bounded
            })
            .collect()
    }

    /// True when `values` already satisfy every bound relative to `last_known_value`
    pub fn is_bounded(&self, values: &[f64], last_known_value: f64) -> bool {
        let mut previous = last_known_value;
        values.iter().all(|&value| {
            let ok = (self.config.min_value..=self.config.max_value).contains(&value)
                && (value - previous).abs() <= self.config.max_change_rate + f64::EPSILON;
            previous = value;
            ok
        })
    }
}

impl Default for ConstraintEnforcer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_of_change_limited_per_step() {
        let enforcer = ConstraintEnforcer::new();
        let bounded = enforcer.enforce(&[200.0, 200.0, 200.0], 120.0);
        assert_eq!(bounded, vec![124.0, 128.0, 132.0]);
    }

    #[test]
    fn test_falling_output_limited_per_step() {
        let enforcer = ConstraintEnforcer::new();
        let bounded = enforcer.enforce(&[60.0, 60.0], 100.0);
        assert_eq!(bounded, vec![96.0, 92.0]);
    }

    #[test]
    fn test_absolute_bounds_applied_after_rate_clamp() {
        let enforcer = ConstraintEnforcer::new();
        let bounded = enforcer.enforce(&[30.0, 30.0], 42.0);
        assert_eq!(bounded, vec![40.0, 40.0]);

        let bounded = enforcer.enforce(&[500.0, 500.0], 398.0);
        assert_eq!(bounded, vec![400.0, 400.0]);
    }

    #[test]
    fn test_values_within_bounds_pass_through() {
        let enforcer = ConstraintEnforcer::new();
        let raw = vec![121.0, 123.5, 122.0, 119.0];
        assert_eq!(enforcer.enforce(&raw, 120.0), raw);
    }

    #[test]
    fn test_enforcement_is_idempotent() {
        let enforcer = ConstraintEnforcer::new();
        let raw = vec![300.0, 10.0, 150.0, 151.0, 420.0, 90.0, 90.0, 95.0];
        let once = enforcer.enforce(&raw, 130.0);
        let twice = enforcer.enforce(&once, 130.0);
        assert_eq!(once, twice);
        assert!(enforcer.is_bounded(&once, 130.0));
    }

    #[test]
    fn test_output_length_matches_input() {
        let enforcer = ConstraintEnforcer::new();
        assert!(enforcer.enforce(&[], 100.0).is_empty());
        assert_eq!(enforcer.enforce(&[1.0; 12], 100.0).len(), 12);
    }

    #[test]
    fn test_custom_bounds() {
        let enforcer = ConstraintEnforcer::with_config(ConstraintConfig {
            min_value: 70.0,
            max_value: 180.0,
            max_change_rate: 10.0,
        });
        assert_eq!(enforcer.enforce(&[200.0, 200.0], 165.0), vec![175.0, 180.0]);
    }
}
