//! Hybrid forecasting and dosing engine
//!
//! This crate provides the core functionality for:
//! - Per-entity model resolution with a shared fallback and single-flight caching
//! - Autoregressive multi-step forecasting with physiological constraints
//! - Rule-based adjustment for hypothetical future events
//! - Dose recommendation combining a learned policy with a clamped heuristic
//! - Health checks and observability

pub mod artifacts;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod recommender;
pub mod resolver;

pub use config::{EngineConfig, FallbackPolicy};
pub use engine::{Engine, PreflightReport};
pub use error::{EngineError, ErrorKind, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
