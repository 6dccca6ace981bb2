use metrics::{describe_counter, describe_gauge, describe_histogram, gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::scoring::Ranking;

// The recorder is process-global; install it at most once.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and describe the series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| PrometheusBuilder::new().install_recorder())?
            .clone();
        describe_all();
        Ok(Self { handle })
    }

    /// Prometheus exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

fn describe_all() {
    describe_gauge!(
        "grid_carbon_intensity_g_kwh",
        "Carbon intensity of electricity grid in gCO2/kWh"
    );
    describe_gauge!(
        "instance_co2_emissions_g_hour",
        "Estimated CO2 emissions in grams per hour"
    );
    describe_gauge!(
        "carbon_best_region",
        "Best region by lowest CO2/h (1=best, 0=not best)"
    );
    describe_gauge!(
        "carbon_balanced_region",
        "Balanced region by cost+carbon (1=best, 0=not best)"
    );
    describe_gauge!("region_score", "Region score by metric type");
    describe_gauge!(
        "intensity_cache_ttl_seconds",
        "Configured intensity cache TTL (absolute, no sliding refresh)"
    );
    describe_counter!("intensity_fetch_total", "Intensity refreshes against the source.");
    describe_counter!(
        "intensity_fallback_total",
        "Regions served from the fallback table."
    );
    describe_counter!(
        "intensity_source_errors_total",
        "Transport or status errors from the intensity source, per region."
    );
    describe_histogram!(
        "intensity_fetch_ms",
        Unit::Milliseconds,
        "Latency of successful intensity source calls."
    );
    describe_counter!("advisory_requests_total", "Advisory calls by outcome.");
    describe_counter!("refresh_cycles_total", "Background refresh cycles by outcome.");
}

/// Publish one scoring cycle: raw intensity, emissions per (role, region),
/// best/balanced indicators and the three score components.
pub fn record_cycle(role: &str, ranking: &Ranking) {
    for r in &ranking.regions {
        let region = r.region.to_string();
        gauge!("grid_carbon_intensity_g_kwh", "country" => region.clone()).set(r.intensity_g_per_kwh);
        gauge!(
            "instance_co2_emissions_g_hour",
            "role" => role.to_string(),
            "country" => region.clone()
        )
        .set(r.co2_g_per_hour);

        let is_best = if r.region == ranking.best_region { 1.0 } else { 0.0 };
        let is_balanced = if r.region == ranking.balanced_region { 1.0 } else { 0.0 };
        gauge!("carbon_best_region", "region" => region.clone()).set(is_best);
        gauge!("carbon_balanced_region", "region" => region.clone()).set(is_balanced);

        gauge!("region_score", "region" => region.clone(), "metric" => "carbon").set(r.co2_g_per_hour);
        gauge!("region_score", "region" => region.clone(), "metric" => "price").set(r.price_usd_h);
        gauge!("region_score", "region" => region, "metric" => "balanced").set(r.weighted_score);
    }
}
