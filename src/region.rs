//! # Regions
//! Region identifiers and the static per-region table (display name, hourly
//! price, fallback intensity).
//!
//! - `RegionCode` is normalized to upper-case ASCII at parse time.
//! - `RegionSet` is non-empty, has unique codes, and keeps the configured
//!   order. That order is the tie-break order used by the scorer.
//! - `PriceTable` is the read-only price view handed to the scorer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Intensity used when a region has no configured fallback.
pub const DEFAULT_FALLBACK_G_PER_KWH: f64 = 100.0;

/// Country/region identifier, e.g. `SE`, `DE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionCode(String);

impl RegionCode {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let code = raw.trim().to_ascii_uppercase();
        if code.is_empty() {
            anyhow::bail!("region code must not be empty");
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!("invalid region code '{raw}'");
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RegionCode {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RegionCode> for String {
    fn from(code: RegionCode) -> Self {
        code.0
    }
}

/// One configured region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub code: RegionCode,
    #[serde(default)]
    pub name: String,
    /// Hourly instance price in USD.
    pub price_usd_h: f64,
    /// Intensity substituted when live data is unavailable (gCO2/kWh).
    #[serde(default = "default_fallback")]
    pub fallback_g_per_kwh: f64,
}

fn default_fallback() -> f64 {
    DEFAULT_FALLBACK_G_PER_KWH
}

/// Ordered, validated region table.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSet {
    specs: Vec<RegionSpec>,
}

impl RegionSet {
    pub fn new(specs: Vec<RegionSpec>) -> anyhow::Result<Self> {
        if specs.is_empty() {
            anyhow::bail!("at least one region must be configured");
        }
        for (i, s) in specs.iter().enumerate() {
            if specs[..i].iter().any(|prev| prev.code == s.code) {
                anyhow::bail!("duplicate region code '{}'", s.code);
            }
            if !s.price_usd_h.is_finite() || s.price_usd_h < 0.0 {
                anyhow::bail!("region {}: price must be a non-negative number", s.code);
            }
            if !s.fallback_g_per_kwh.is_finite() || s.fallback_g_per_kwh < 0.0 {
                anyhow::bail!("region {}: fallback intensity must be non-negative", s.code);
            }
        }
        Ok(Self { specs })
    }

    /// Reference deployment: SE, DE, GB, FR with static price and fallback estimates.
    pub fn reference() -> Self {
        let row = |code: &str, name: &str, price: f64, fallback: f64| RegionSpec {
            code: RegionCode(code.to_string()),
            name: name.to_string(),
            price_usd_h: price,
            fallback_g_per_kwh: fallback,
        };
        Self {
            specs: vec![
                row("SE", "Sweden", 0.0784, 25.0),
                row("DE", "Germany", 0.0120, 420.0),
                row("GB", "United Kingdom", 0.0118, 250.0),
                row("FR", "France", 0.0118, 60.0),
            ],
        }
    }

    /// First configured region; the set is never empty.
    pub fn first(&self) -> &RegionSpec {
        &self.specs[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionSpec> {
        self.specs.iter()
    }

    pub fn codes(&self) -> impl Iterator<Item = &RegionCode> {
        self.specs.iter().map(|s| &s.code)
    }

    pub fn get(&self, code: &RegionCode) -> Option<&RegionSpec> {
        self.specs.iter().find(|s| &s.code == code)
    }

    pub fn contains(&self, code: &RegionCode) -> bool {
        self.get(code).is_some()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Fallback intensity for `code`; unknown regions get the global default.
    pub fn fallback_for(&self, code: &RegionCode) -> f64 {
        self.get(code)
            .map(|s| s.fallback_g_per_kwh)
            .unwrap_or(DEFAULT_FALLBACK_G_PER_KWH)
    }

    pub fn price_table(&self) -> PriceTable {
        PriceTable {
            rows: self
                .specs
                .iter()
                .map(|s| (s.code.clone(), s.price_usd_h))
                .collect(),
        }
    }
}

/// Static RegionCode → hourly USD price. Never mutated after startup.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceTable {
    rows: Vec<(RegionCode, f64)>,
}

impl PriceTable {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (RegionCode, f64)>,
    {
        Self {
            rows: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, code: &RegionCode) -> Option<f64> {
        self.rows.iter().find(|(c, _)| c == code).map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegionCode, f64)> {
        self.rows.iter().map(|(c, p)| (c, *p))
    }
}
