//! # Intensity Cache
//! TTL cache over an [`IntensitySource`], the sole owner of freshness state.
//!
//! - Fresh (`now - fetched_at < ttl`) → served without touching the source.
//! - Stale or empty → every configured region is fetched independently;
//!   a failed region gets its fallback constant and the refresh continues.
//! - The new snapshot replaces the old one wholesale.
//! - The state mutex is held across the refresh, so concurrent misses wait
//!   for the one in-flight fetch instead of starting their own.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::types::{
    CarbonIntensitySample, IntensitySnapshot, IntensitySource, SampleOrigin, TimeWindow,
};
use crate::region::{RegionCode, RegionSet};

#[derive(Debug, Default)]
struct CacheState {
    snapshot: Option<Arc<IntensitySnapshot>>,
    fetched_at: Option<Instant>,
}

impl CacheState {
    fn fresh(&self, ttl: Duration, now: Instant) -> Option<Arc<IntensitySnapshot>> {
        match (&self.snapshot, self.fetched_at) {
            (Some(snap), Some(at)) if !snap.is_empty() && now.duration_since(at) < ttl => {
                Some(Arc::clone(snap))
            }
            _ => None,
        }
    }
}

pub struct IntensityCache {
    source: Arc<dyn IntensitySource>,
    regions: RegionSet,
    ttl: Duration,
    fetch_timeout: Duration,
    state: Mutex<CacheState>,
}

impl IntensityCache {
    pub fn new(
        source: Arc<dyn IntensitySource>,
        regions: RegionSet,
        ttl: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        gauge!("intensity_cache_ttl_seconds").set(ttl.as_secs_f64());
        Self {
            source,
            regions,
            ttl,
            fetch_timeout,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Complete intensity map for all configured regions. Never fails.
    pub async fn get(&self) -> Arc<IntensitySnapshot> {
        let mut state = self.state.lock().await;
        if let Some(snap) = state.fresh(self.ttl, Instant::now()) {
            tracing::debug!("using cached carbon intensity data");
            return snap;
        }

        let snap = Arc::new(self.fetch_all().await);
        state.snapshot = Some(Arc::clone(&snap));
        state.fetched_at = Some(Instant::now());
        snap
    }

    /// Current snapshot regardless of freshness, without fetching.
    pub async fn peek(&self) -> Option<Arc<IntensitySnapshot>> {
        self.state.lock().await.snapshot.clone()
    }

    /// Drop freshness; the next `get()` refetches. The old snapshot stays
    /// readable through `peek()` until then.
    pub async fn invalidate(&self) {
        self.state.lock().await.fetched_at = None;
    }

    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    async fn fetch_all(&self) -> IntensitySnapshot {
        tracing::info!(source = self.source.name(), "fetching fresh carbon intensity data");
        counter!("intensity_fetch_total").increment(1);

        let now = chrono::Utc::now();
        let window = TimeWindow::last_24h(now);
        let mut samples = Vec::with_capacity(self.regions.len());

        for code in self.regions.codes() {
            let sample = match self.fetch_region(code, &window).await {
                Ok(avg) => {
                    tracing::info!(region = %code, intensity = avg, "live intensity");
                    CarbonIntensitySample {
                        region: code.clone(),
                        intensity_g_per_kwh: avg,
                        origin: SampleOrigin::Live,
                    }
                }
                Err(e) => {
                    let fallback = self.regions.fallback_for(code);
                    tracing::warn!(region = %code, fallback, error = %e, "intensity unavailable, using fallback");
                    counter!("intensity_fallback_total", "region" => code.to_string()).increment(1);
                    CarbonIntensitySample {
                        region: code.clone(),
                        intensity_g_per_kwh: fallback,
                        origin: SampleOrigin::Fallback,
                    }
                }
            };
            samples.push(sample);
        }

        IntensitySnapshot {
            samples,
            fetched_at: now,
        }
    }

    async fn fetch_region(&self, code: &RegionCode, window: &TimeWindow) -> anyhow::Result<f64> {
        let values = tokio::time::timeout(self.fetch_timeout, self.source.fetch_window(code, window))
            .await
            .map_err(|_| anyhow::anyhow!("timed out after {:?}", self.fetch_timeout))??;
        average(&values)
    }
}

/// Mean of the samples; empty or negative/non-finite results are rejected.
fn average(values: &[f64]) -> anyhow::Result<f64> {
    if values.is_empty() {
        anyhow::bail!("empty payload");
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    if !avg.is_finite() || avg < 0.0 {
        anyhow::bail!("implausible average intensity {avg}");
    }
    Ok(avg)
}
