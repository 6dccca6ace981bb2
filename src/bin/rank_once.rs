//! One-shot ranking from the command line: fetch intensities, score every
//! configured region once, print the ranking as JSON.
//!
//! `RANK_WEIGHT` overrides the carbon weight; the usual service variables
//! apply. The advisor is not consulted.

use std::sync::Arc;

use carbon_region_advisor::advisory::DisabledAdvisor;
use carbon_region_advisor::build_orchestrator;
use carbon_region_advisor::config::ServiceConfig;
use carbon_region_advisor::emissions::ProcStatSampler;
use carbon_region_advisor::intensity::providers::nowtricity::NowtricityClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = ServiceConfig::from_env()?;
    let weight = std::env::var("RANK_WEIGHT")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|w| w.is_finite());

    let source = NowtricityClient::new(
        cfg.intensity_api_base.clone(),
        cfg.intensity_api_key.clone(),
        cfg.fetch_timeout,
    )?;
    let orch = build_orchestrator(
        cfg,
        Arc::new(source),
        Arc::new(ProcStatSampler::default()),
        Arc::new(DisabledAdvisor),
    );

    let eval = orch.evaluate(weight).await?;
    println!("{}", serde_json::to_string_pretty(&eval)?);
    Ok(())
}
