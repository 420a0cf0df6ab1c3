//! ONNX inference using tract
//!
//! Forecasting and policy artifacts are exported as ONNX graphs and executed
//! with tract-onnx, keeping the engine free of any training framework.

use super::{PolicyModel, SequenceModel};
use crate::observability::EngineMetrics;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Width of the policy observation vector
pub const POLICY_FEATURES: usize = 5;

/// Inference latency above which a call is counted as slow
const MAX_INFERENCE_MS: u128 = 50;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Load and optimize an ONNX graph with a fixed input shape
fn load_plan(model_bytes: &[u8], input_fact: InferenceFact) -> Result<TractModel> {
    let model = tract_onnx::onnx()
        .model_for_read(&mut std::io::Cursor::new(model_bytes))
        .context("Failed to parse ONNX model")?
        .with_input_fact(0, input_fact)
        .context("Failed to set input shape")?
        .into_optimized()
        .context("Failed to optimize model")?
        .into_runnable()
        .context("Failed to create runnable model")?;
    Ok(model)
}

/// Run a plan and return its first output as a flat vector
fn run_plan(plan: &TractModel, input: Tensor) -> Result<Vec<f32>> {
    let result = plan.run(tvec!(input.into()))?;
    let output = result.first().context("No output from model")?;
    let view = output.to_array_view::<f32>()?;
    Ok(view.iter().copied().collect())
}

/// Inference statistics
#[derive(Debug, Clone)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
}

#[derive(Default)]
struct InferenceCounters {
    total: AtomicU64,
    slow: AtomicU64,
}

impl InferenceCounters {
    fn record(&self, start: Instant, artifact: &str) {
        let elapsed = start.elapsed();
        self.total.fetch_add(1, Ordering::Relaxed);
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow.fetch_add(1, Ordering::Relaxed);
            EngineMetrics::new().inc_slow_inferences(artifact);
            warn!(
                artifact = artifact,
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        } else {
            debug!(artifact = artifact, elapsed_us = elapsed.as_micros(), "Inference completed");
        }
    }

    fn snapshot(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.total.load(Ordering::Relaxed),
            slow_inferences: self.slow.load(Ordering::Relaxed),
        }
    }
}

/// Recurrent forecaster taking a `[1, window, 1]` input and emitting one scaled value
pub struct OnnxSequenceModel {
    plan: TractModel,
    window: usize,
    counters: InferenceCounters,
}

impl OnnxSequenceModel {
    pub fn from_bytes(model_bytes: &[u8], window: usize) -> Result<Self> {
        let plan = load_plan(model_bytes, f32::fact([1, window, 1]).into())?;
        Ok(Self {
            plan,
            window,
            counters: InferenceCounters::default(),
        })
    }

    pub fn stats(&self) -> InferenceStats {
        self.counters.snapshot()
    }
}

impl SequenceModel for OnnxSequenceModel {
    fn predict_next(&self, window: &[f32]) -> Result<f32> {
        if window.len() != self.window {
            anyhow::bail!(
                "Model expects a window of {} values, got {}",
                self.window,
                window.len()
            );
        }
        let start = Instant::now();
        let input: Tensor =
            tract_ndarray::Array3::from_shape_vec((1, self.window, 1), window.to_vec())?.into();
        let values = run_plan(&self.plan, input)?;
        self.counters.record(start, "sequence_model");

        values
            .first()
            .copied()
            .context("Model output is empty")
    }
}

/// Q-value policy taking a `[1, 5]` observation; the action is the argmax
pub struct OnnxPolicyModel {
    plan: TractModel,
    counters: InferenceCounters,
}

impl OnnxPolicyModel {
    pub fn from_bytes(model_bytes: &[u8]) -> Result<Self> {
        let plan = load_plan(model_bytes, f32::fact([1, POLICY_FEATURES]).into())?;
        Ok(Self {
            plan,
            counters: InferenceCounters::default(),
        })
    }

    pub fn stats(&self) -> InferenceStats {
        self.counters.snapshot()
    }
}

impl PolicyModel for OnnxPolicyModel {
    fn select_action(&self, observation: &[f32; POLICY_FEATURES]) -> Result<i64> {
        let start = Instant::now();
        let input: Tensor =
            tract_ndarray::Array2::from_shape_vec((1, POLICY_FEATURES), observation.to_vec())?
                .into();
        let q_values = run_plan(&self.plan, input)?;
        self.counters.record(start, "policy");

        argmax(&q_values).context("Policy output is empty")
    }
}

fn argmax(values: &[f32]) -> Option<i64> {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(idx, _)| idx as i64)
}
