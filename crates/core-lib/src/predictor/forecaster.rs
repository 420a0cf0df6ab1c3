//! Autoregressive forecasting loop
//!
//! The last `window` readings are scaled into model space, then the model is
//! driven `horizon` times: each scaled prediction is appended to the window
//! (dropping the oldest value) and fed back as input for the next step.

use super::{ConstraintEnforcer, TrendAnalyzer};
use crate::config::EngineConfig;
use crate::error::{guard_inference, EngineError, Result};
use crate::models::{EntityId, ForecastResult};
use crate::resolver::{ModelBinding, ModelResolver};
use anyhow::Context;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Reject histories shorter than the model window
pub fn validate_history(history: &[f64], window: usize) -> Result<()> {
    if history.len() < window {
        return Err(EngineError::InsufficientHistory {
            required: window,
            actual: history.len(),
        });
    }
    Ok(())
}

pub struct AutoregressiveForecaster {
    resolver: Arc<ModelResolver>,
    enforcer: ConstraintEnforcer,
    analyzer: TrendAnalyzer,
    window: usize,
    horizon: usize,
}

impl AutoregressiveForecaster {
    pub fn new(resolver: Arc<ModelResolver>, config: &EngineConfig) -> Self {
        let window = config.forecast.window;
        Self {
            resolver,
            enforcer: ConstraintEnforcer::with_config(config.constraints.clone()),
            analyzer: TrendAnalyzer::with_config(window, config.trend.clone()),
            window,
            horizon: config.forecast.horizon,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Forecast `horizon` steps ahead; failures are reported in the result
    pub fn forecast(
        &self,
        entity_id: EntityId,
        history: &[f64],
        include_analysis: bool,
    ) -> ForecastResult {
        match self.try_forecast(entity_id, history, include_analysis) {
            Ok(result) => result,
            Err(err) => ForecastResult::error(&err),
        }
    }

    pub fn try_forecast(
        &self,
        entity_id: EntityId,
        history: &[f64],
        include_analysis: bool,
    ) -> Result<ForecastResult> {
        validate_history(history, self.window)?;
        let last_known = *history.last().ok_or(EngineError::InsufficientHistory {
            required: self.window.max(1),
            actual: 0,
        })?;
        let resolution = self.resolver.resolve(entity_id)?;

        let recent = &history[history.len() - self.window..];
        let prediction = self.run_model(&resolution.binding, recent, last_known)?;

        let analysis = if include_analysis {
            self.analyzer.analyze(history)
        } else {
            None
        };

        Ok(ForecastResult::success(
            prediction,
            last_known,
            analysis,
            resolution.source,
        ))
    }

    /// Run the loop and bound its output, turning any failure or panic into a
    /// prediction error
    // TODO: bound model invocation time; a stalled model blocks the calling request indefinitely
    fn run_model(
        &self,
        binding: &ModelBinding,
        recent: &[f64],
        last_known: f64,
    ) -> Result<Vec<i64>> {
        guard_inference(|| {
            anyhow::ensure!(
                last_known.is_finite(),
                "Last known reading {} is not finite",
                last_known
            );
            let raw = self.autoregress(binding, recent)?;
            Ok(self
                .enforcer
                .enforce(&raw, last_known)
                .into_iter()
                .map(|v| v.round() as i64)
                .collect())
        })
    }

    fn autoregress(&self, binding: &ModelBinding, recent: &[f64]) -> anyhow::Result<Vec<f64>> {
        let mut sequence: VecDeque<f32> = binding
            .scaler
            .transform(recent)
            .context("Failed to scale input window")?
            .into();

        let mut predictions = Vec::with_capacity(self.horizon);
        for step in 0..self.horizon {
            let scaled = binding
                .model
                .predict_next(sequence.make_contiguous())
                .with_context(|| format!("Model invocation failed at step {}", step))?;
            let value = binding
                .scaler
                .inverse_transform(scaled)
                .with_context(|| format!("Failed to unscale prediction at step {}", step))?;
            if !value.is_finite() {
                anyhow::bail!("Prediction at step {} is not finite: {}", step, value);
            }
            predictions.push(value);

            sequence.pop_front();
            sequence.push_back(scaled);
        }

        debug!(
            model = %binding.model_path.display(),
            steps = predictions.len(),
            "Autoregressive loop completed"
        );
        Ok(predictions)
    }
}
