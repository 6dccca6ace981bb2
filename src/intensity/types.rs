// src/intensity/types.rs
use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;

use crate::region::RegionCode;

/// Whether a sample came from the live source or the static fallback table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleOrigin {
    Live,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarbonIntensitySample {
    pub region: RegionCode,
    pub intensity_g_per_kwh: f64,
    pub origin: SampleOrigin,
}

/// Complete set of samples for every configured region, in configured order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntensitySnapshot {
    pub samples: Vec<CarbonIntensitySample>,
    pub fetched_at: DateTime<Utc>,
}

impl IntensitySnapshot {
    pub fn get(&self, region: &RegionCode) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| &s.region == region)
            .map(|s| s.intensity_g_per_kwh)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegionCode, f64)> {
        self.samples
            .iter()
            .map(|s| (&s.region, s.intensity_g_per_kwh))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Query window sent to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The 24 hours ending at `end`.
    pub fn last_24h(end: DateTime<Utc>) -> Self {
        Self {
            start: end - Duration::hours(24),
            end,
        }
    }

    /// ISO-8601 UTC with a `Z` suffix, e.g. `2025-09-06T09:00:00Z`.
    pub fn start_param(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn end_param(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// External carbon-intensity data source.
///
/// Returns the raw intensity values (gCO2/kWh) available in `window`. The cache
/// decides what an empty or failed answer means.
#[async_trait::async_trait]
pub trait IntensitySource: Send + Sync {
    async fn fetch_window(&self, region: &RegionCode, window: &TimeWindow) -> Result<Vec<f64>>;
    fn name(&self) -> &'static str;
}
