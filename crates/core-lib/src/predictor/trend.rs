//! Short-window trend classification

use crate::config::TrendConfig;
use crate::models::{TrendAnalysis, TrendDirection};

pub struct TrendAnalyzer {
    window: usize,
    config: TrendConfig,
}

impl TrendAnalyzer {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            config: TrendConfig::default(),
        }
    }

    pub fn with_config(window: usize, config: TrendConfig) -> Self {
        Self { window, config }
    }

    /// Classify the trend of the most recent `window` readings
    ///
    /// Returns `None` when fewer than `window` readings are supplied.
    pub fn analyze(&self, readings: &[f64]) -> Option<TrendAnalysis> {
        if readings.len() < self.window {
            return None;
        }
        let recent = &readings[readings.len() - self.window..];
        let slope = linear_regression_slope(recent);

        let direction = if slope > self.config.slope_threshold {
            TrendDirection::Rising
        } else if slope < -self.config.slope_threshold {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        };

        Some(TrendAnalysis {
            direction,
            slope: (slope * 100.0).round() / 100.0,
        })
    }
}

/// Ordinary least-squares slope over the index sequence 0..n
pub fn linear_regression_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();
    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}
