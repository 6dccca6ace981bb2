//! # Region Scorer
//! Pure ranking of regions from per-region emission estimates.
//!
//! Two modes:
//! - carbon-only: argmin of gCO2/h.
//! - balanced: min-max normalize emissions and prices over the region set,
//!   `weighted = w * carbon_norm + (1 - w) * price_norm`, argmin.
//!
//! Ties go to the region encountered first (configured order). A dimension
//! where every region has the same value contributes 0 for all of them.

use serde::Serialize;

use crate::emissions::EmissionEstimate;
use crate::intensity::IntensitySnapshot;
use crate::region::{PriceTable, RegionCode};

/// Normalized components of one region's balanced score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub region: RegionCode,
    pub carbon_norm: f64,
    pub price_norm: f64,
    pub weighted_score: f64,
}

/// Full comparison row for one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionScore {
    pub region: RegionCode,
    pub intensity_g_per_kwh: f64,
    pub power_watts: f64,
    pub co2_g_per_hour: f64,
    pub price_usd_h: f64,
    pub carbon_norm: f64,
    pub price_norm: f64,
    pub weighted_score: f64,
}

/// Outcome of one scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub weight_carbon: f64,
    pub utilization_pct: f64,
    pub best_region: RegionCode,
    pub balanced_region: RegionCode,
    pub regions: Vec<RegionScore>,
}

impl Ranking {
    pub fn get(&self, region: &RegionCode) -> Option<&RegionScore> {
        self.regions.iter().find(|r| &r.region == region)
    }
}

/// `(v - min) / (max - min)`, or 0 when the range is degenerate.
pub fn normalize(v: f64, min: f64, max: f64) -> f64 {
    if max == min {
        0.0
    } else {
        (v - min) / (max - min)
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Index of the strictly smallest key; earlier entries win ties.
/// NaN keys are skipped; `None` when no key is a number.
fn argmin_by<T>(items: &[T], key: impl Fn(&T) -> f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, it) in items.iter().enumerate() {
        let k = key(it);
        if k.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if k >= b => {}
            _ => best = Some((i, k)),
        }
    }
    best.map(|(i, _)| i)
}

#[derive(Debug, Clone)]
pub struct RegionScorer {
    prices: PriceTable,
}

impl RegionScorer {
    pub fn new(prices: PriceTable) -> Self {
        Self { prices }
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    /// Lowest emissions wins. `None` for an empty input or all-NaN emissions.
    pub fn carbon_only<'a>(&self, estimates: &'a [EmissionEstimate]) -> Option<&'a EmissionEstimate> {
        argmin_by(estimates, |e| e.co2_g_per_hour).map(|i| &estimates[i])
    }

    /// Balanced scores in input order. `w` is taken as given (no clamping);
    /// a region missing from the price table is priced at 0.
    pub fn balanced(&self, estimates: &[EmissionEstimate], w: f64) -> Vec<ScoreResult> {
        let price_of = |r: &RegionCode| self.prices.get(r).unwrap_or(0.0);

        let Some((c_min, c_max)) = min_max(estimates.iter().map(|e| e.co2_g_per_hour)) else {
            return Vec::new();
        };
        let (p_min, p_max) =
            min_max(estimates.iter().map(|e| price_of(&e.region))).unwrap_or((0.0, 0.0));

        estimates
            .iter()
            .map(|e| {
                let carbon_norm = normalize(e.co2_g_per_hour, c_min, c_max);
                let price_norm = normalize(price_of(&e.region), p_min, p_max);
                ScoreResult {
                    region: e.region.clone(),
                    carbon_norm,
                    price_norm,
                    weighted_score: w * carbon_norm + (1.0 - w) * price_norm,
                }
            })
            .collect()
    }

    /// Winner of a balanced pass.
    pub fn balanced_winner<'a>(&self, scores: &'a [ScoreResult]) -> Option<&'a ScoreResult> {
        argmin_by(scores, |s| s.weighted_score).map(|i| &scores[i])
    }

    /// Both rankings plus the full per-region comparison.
    pub fn rank(
        &self,
        intensities: &IntensitySnapshot,
        utilization_pct: f64,
        estimates: &[EmissionEstimate],
        w: f64,
    ) -> Option<Ranking> {
        let best = self.carbon_only(estimates)?;
        let scores = self.balanced(estimates, w);
        let balanced = self.balanced_winner(&scores)?;

        let regions = estimates
            .iter()
            .zip(scores.iter())
            .map(|(e, s)| RegionScore {
                region: e.region.clone(),
                intensity_g_per_kwh: intensities.get(&e.region).unwrap_or(0.0),
                power_watts: e.power_watts,
                co2_g_per_hour: e.co2_g_per_hour,
                price_usd_h: self.prices.get(&e.region).unwrap_or(0.0),
                carbon_norm: s.carbon_norm,
                price_norm: s.price_norm,
                weighted_score: s.weighted_score,
            })
            .collect();

        Some(Ranking {
            weight_carbon: w,
            utilization_pct,
            best_region: best.region.clone(),
            balanced_region: balanced.region.clone(),
            regions,
        })
    }
}
