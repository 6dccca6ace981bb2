//! Carbon Region Advisor: Binary Entrypoint
//! Boots the Axum HTTP server, wires the orchestrator, and starts the
//! background refresh loop.
//!
//! See `README.md` for the environment variables.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use carbon_region_advisor::advisory::build_advisor;
use carbon_region_advisor::config::{AdvisorConfig, ServiceConfig};
use carbon_region_advisor::emissions::ProcStatSampler;
use carbon_region_advisor::intensity::providers::nowtricity::NowtricityClient;
use carbon_region_advisor::metrics::Metrics;
use carbon_region_advisor::{build_orchestrator, init_tracing, router, AppState};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = ServiceConfig::from_env().context("loading service config")?;
    let advisor_cfg = AdvisorConfig::load_default().context("loading advisor config")?;
    let advisor = build_advisor(&advisor_cfg);

    let source = NowtricityClient::new(
        cfg.intensity_api_base.clone(),
        cfg.intensity_api_key.clone(),
        cfg.fetch_timeout,
    )?;

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = ?e, "prometheus recorder not installed, /metrics disabled");
            None
        }
    };

    tracing::info!(
        role = %cfg.role,
        regions = cfg.regions.len(),
        home = %cfg.home_region,
        advisor = advisor.provider_name(),
        "starting carbon region advisor"
    );

    let orchestrator = build_orchestrator(
        cfg,
        Arc::new(source),
        Arc::new(ProcStatSampler::default()),
        advisor,
    );

    // Dropping the handle detaches the loop; it runs until the runtime exits.
    let _refresh = orchestrator.spawn_refresh_loop();

    let router = router(AppState::new(orchestrator, metrics));
    Ok(router.into())
}
