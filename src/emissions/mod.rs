//! # Emissions Estimator
//! Instance power draw from CPU utilization × grid intensity → gCO2/hour.
//!
//! Power is interpolated linearly between an idle floor and a max ceiling;
//! utilization is sampled once per scoring pass and applied to every region,
//! so estimates within one pass are directly comparable.

pub mod sampler;

use std::sync::Arc;

use serde::Serialize;

use crate::intensity::IntensitySnapshot;
use crate::region::RegionCode;
pub use sampler::{FixedUtilization, ProcStatSampler, UtilizationSampler};

/// Substituted when utilization cannot be sampled.
pub const DEFAULT_UTILIZATION_PCT: f64 = 5.0;

/// Small burstable instance: idle + infrastructure overhead.
pub const IDLE_POWER_WATTS: f64 = 3.5;
/// CPU + RAM + network at full load.
pub const MAX_POWER_WATTS: f64 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerModel {
    pub idle_watts: f64,
    pub max_watts: f64,
}

impl Default for PowerModel {
    fn default() -> Self {
        Self {
            idle_watts: IDLE_POWER_WATTS,
            max_watts: MAX_POWER_WATTS,
        }
    }
}

impl PowerModel {
    /// Watts at `utilization_pct` (clamped to 0–100).
    pub fn power_watts(&self, utilization_pct: f64) -> f64 {
        let u = (utilization_pct / 100.0).clamp(0.0, 1.0);
        self.idle_watts + (self.max_watts - self.idle_watts) * u
    }

    /// Grams CO2 per hour at the given utilization and grid intensity.
    pub fn co2_g_per_hour(&self, utilization_pct: f64, intensity_g_per_kwh: f64) -> f64 {
        self.power_watts(utilization_pct) / 1000.0 * intensity_g_per_kwh
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmissionEstimate {
    pub region: RegionCode,
    pub power_watts: f64,
    pub co2_g_per_hour: f64,
}

#[derive(Clone)]
pub struct EmissionsEstimator {
    model: PowerModel,
    sampler: Arc<dyn UtilizationSampler>,
}

impl EmissionsEstimator {
    pub fn new(model: PowerModel, sampler: Arc<dyn UtilizationSampler>) -> Self {
        Self { model, sampler }
    }

    pub fn model(&self) -> PowerModel {
        self.model
    }

    /// Current utilization; sampling failures degrade to `DEFAULT_UTILIZATION_PCT`.
    pub async fn sample_utilization(&self) -> f64 {
        match self.sampler.sample().await {
            Ok(u) if u.is_finite() => u,
            Ok(u) => {
                tracing::warn!(value = u, "non-finite cpu utilization, using default");
                DEFAULT_UTILIZATION_PCT
            }
            Err(e) => {
                tracing::warn!(error = %e, "cpu utilization sampling failed, using default");
                DEFAULT_UTILIZATION_PCT
            }
        }
    }

    /// Deterministic estimate for a given (utilization, intensity) pair.
    pub fn estimate_at(
        &self,
        region: &RegionCode,
        utilization_pct: f64,
        intensity_g_per_kwh: f64,
    ) -> EmissionEstimate {
        let power_watts = self.model.power_watts(utilization_pct);
        let co2_g_per_hour = self.model.co2_g_per_hour(utilization_pct, intensity_g_per_kwh);
        tracing::debug!(
            region = %region,
            cpu = utilization_pct,
            power_w = power_watts,
            co2_g_h = co2_g_per_hour,
            "emission estimate"
        );
        EmissionEstimate {
            region: region.clone(),
            power_watts,
            co2_g_per_hour,
        }
    }

    /// Sample utilization now and estimate a single intensity.
    pub async fn estimate(&self, region: &RegionCode, intensity_g_per_kwh: f64) -> EmissionEstimate {
        let u = self.sample_utilization().await;
        self.estimate_at(region, u, intensity_g_per_kwh)
    }

    /// One utilization sample applied to every region of the snapshot, in order.
    pub async fn estimate_all(&self, snapshot: &IntensitySnapshot) -> (f64, Vec<EmissionEstimate>) {
        let u = self.sample_utilization().await;
        let estimates = snapshot
            .iter()
            .map(|(region, intensity)| self.estimate_at(region, u, intensity))
            .collect();
        (u, estimates)
    }
}
