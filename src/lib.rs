// src/lib.rs
// Public library surface for the binary, integration tests and demos.

pub mod api;
pub mod config;
pub mod region;

// Core pipeline: intensity → emissions → scoring → orchestration
pub mod emissions;
pub mod intensity;
pub mod orchestrator;
pub mod scoring;

// Collaborators
pub mod advisory;
pub mod metrics;

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use crate::api::{router, AppState};
pub use crate::orchestrator::{RecommendationOrchestrator, RefreshHandle};

use crate::advisory::DynAdvisor;
use crate::config::ServiceConfig;
use crate::emissions::{EmissionsEstimator, PowerModel, UtilizationSampler};
use crate::intensity::{IntensityCache, IntensitySource};

/// Install the tracing subscriber. `LOG_FORMAT=json` switches to JSON lines.
/// Uses `try_init`, so an already installed subscriber (e.g. the hosting
/// runtime's) is left alone.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("carbon_region_advisor=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Wire cache, estimator and advisor into one shared orchestrator.
pub fn build_orchestrator(
    cfg: ServiceConfig,
    source: Arc<dyn IntensitySource>,
    sampler: Arc<dyn UtilizationSampler>,
    advisor: DynAdvisor,
) -> Arc<RecommendationOrchestrator> {
    let cache = Arc::new(IntensityCache::new(
        source,
        cfg.regions.clone(),
        cfg.cache_ttl,
        cfg.fetch_timeout,
    ));
    let estimator = EmissionsEstimator::new(PowerModel::default(), sampler);
    Arc::new(RecommendationOrchestrator::new(cfg, cache, estimator, advisor))
}
