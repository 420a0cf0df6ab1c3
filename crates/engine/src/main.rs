//! Aura engine daemon
//!
//! Loads trained artifacts, verifies they are usable and exposes health,
//! readiness and metrics endpoints for the forecasting and dosing engine.

use anyhow::{Context, Result};
use aura_core::{
    health::{components, HealthRegistry},
    observability::{EngineMetrics, StructuredLogger},
    Engine,
};
use aura_engine::{api, config};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting aura-engine");

    let config_file = std::env::var(config::CONFIG_FILE_ENV).ok();
    let config = config::DaemonConfig::load(config_file.as_deref())?;
    let artifact_root = config.engine.artifacts.root.clone();
    info!(
        artifact_root = %artifact_root.display(),
        window = config.engine.forecast.window,
        horizon = config.engine.forecast.horizon,
        "Engine configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::ARTIFACT_STORE).await;
    health_registry.register(components::FORECASTER).await;
    health_registry.register(components::RECOMMENDER).await;

    if !artifact_root.is_dir() {
        health_registry
            .set_unhealthy(
                components::ARTIFACT_STORE,
                format!("Artifact root {} is not a directory", artifact_root.display()),
            )
            .await;
    }

    let metrics = EngineMetrics::new();
    let logger = StructuredLogger::new(&config.service_name);
    logger.log_startup(ENGINE_VERSION, &artifact_root.display().to_string());

    let engine = Arc::new(Engine::from_config(config.engine.clone())?);

    // Model loading is blocking work; keep it off the runtime threads
    let preflight_engine = engine.clone();
    let report = tokio::task::spawn_blocking(move || preflight_engine.preflight())
        .await
        .context("Artifact preflight panicked")?;
    health_registry.apply_preflight(&report).await;

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
        served = api_handle => {
            match served {
                Ok(Ok(())) => logger.log_shutdown("API server stopped"),
                Ok(Err(err)) => {
                    error!(error = %err, "API server failed");
                    return Err(err);
                }
                Err(err) => return Err(err).context("API server task panicked"),
            }
        }
    }

    info!("Shutting down");
    Ok(())
}
