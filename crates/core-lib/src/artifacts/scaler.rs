//! Min-max feature scaler

use super::FeatureScaler;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Linear scaler fitted on the training readings
///
/// Serialized as `{"data_min": .., "data_max": .., "feature_range": [lo, hi]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub data_min: f64,
    pub data_max: f64,
    #[serde(default = "default_feature_range")]
    pub feature_range: (f64, f64),
}

fn default_feature_range() -> (f64, f64) {
    (0.0, 1.0)
}

impl MinMaxScaler {
    pub fn new(data_min: f64, data_max: f64) -> Self {
        Self {
            data_min,
            data_max,
            feature_range: default_feature_range(),
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let scaler: MinMaxScaler = serde_json::from_slice(bytes)?;
        scaler.validate()?;
        Ok(scaler)
    }

    fn validate(&self) -> Result<()> {
        let (lo, hi) = self.feature_range;
        if ![self.data_min, self.data_max, lo, hi].iter().all(|v| v.is_finite()) {
            anyhow::bail!("Scaler parameters must be finite");
        }
        if self.data_max < self.data_min {
            anyhow::bail!(
                "Scaler data_max {} is below data_min {}",
                self.data_max,
                self.data_min
            );
        }
        if hi <= lo {
            anyhow::bail!("Scaler feature range ({}, {}) is empty", lo, hi);
        }
        Ok(())
    }

    /// Scale factor; a constant feature scales by 1
    fn scale(&self) -> f64 {
        let (lo, hi) = self.feature_range;
        let span = self.data_max - self.data_min;
        if span == 0.0 {
            1.0
        } else {
            (hi - lo) / span
        }
    }
}

impl FeatureScaler for MinMaxScaler {
    fn transform(&self, values: &[f64]) -> Result<Vec<f32>> {
        let scale = self.scale();
        let lo = self.feature_range.0;
        values
            .iter()
            .map(|v| {
                if !v.is_finite() {
                    anyhow::bail!("Cannot scale non-finite reading {}", v);
                }
                Ok(((v - self.data_min) * scale + lo) as f32)
            })
            .collect()
    }

    fn inverse_transform(&self, scaled: f32) -> Result<f64> {
        if !scaled.is_finite() {
            anyhow::bail!("Model produced non-finite value {}", scaled);
        }
        Ok((scaled as f64 - self.feature_range.0) / self.scale() + self.data_min)
    }
}
