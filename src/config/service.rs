// src/config/service.rs
use std::time::Duration;

use crate::region::{RegionCode, RegionSet};

/// Refresh cycles never run faster than this.
pub const MIN_REFRESH_SECS: u64 = 60;

pub const DEFAULT_REFRESH_SECS: u64 = 300;
pub const DEFAULT_BALANCE_WEIGHT: f64 = 0.5;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_ADVISORY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_INTENSITY_API: &str = "https://api.nowtricity.com/v1";

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Label of this instance (e.g. "api", "web", "compute").
    pub role: String,
    pub refresh_interval: Duration,
    /// Default carbon weight for the balanced ranking, in [0,1].
    pub balance_weight: f64,
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
    pub advisory_timeout: Duration,
    /// Region whose intensity drives the "current instance" CO2 figure.
    pub home_region: RegionCode,
    pub regions: RegionSet,
    pub intensity_api_base: String,
    pub intensity_api_key: Option<String>,
}

impl ServiceConfig {
    /// Defaults around a given region table. Home region is SE when present,
    /// else the first configured region.
    pub fn with_regions(regions: RegionSet) -> Self {
        let home_region = default_home(&regions);
        Self {
            role: "unknown".to_string(),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
            balance_weight: DEFAULT_BALANCE_WEIGHT,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            advisory_timeout: Duration::from_secs(DEFAULT_ADVISORY_TIMEOUT_SECS),
            home_region,
            regions,
            intensity_api_base: DEFAULT_INTENSITY_API.to_string(),
            intensity_api_key: None,
        }
    }

    /// Read settings from the environment. Unparseable values fall back to
    /// their defaults with a warning; only the region table can fail.
    pub fn from_env() -> anyhow::Result<Self> {
        let regions = super::regions::load_regions_default()?;
        let mut cfg = Self::with_regions(regions);

        if let Ok(role) = std::env::var("INSTANCE_ROLE") {
            if !role.trim().is_empty() {
                cfg.role = role.trim().to_string();
            }
        }

        let refresh = env_parse("AI_AUTO_REFRESH_SECONDS", DEFAULT_REFRESH_SECS);
        cfg.refresh_interval = floored_refresh(refresh);

        let w = env_parse("BALANCE_WEIGHT", DEFAULT_BALANCE_WEIGHT);
        cfg.balance_weight = sanitize_weight(w);

        cfg.cache_ttl = Duration::from_secs(env_parse("CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL_SECS));
        cfg.fetch_timeout = Duration::from_secs(
            env_parse("INTENSITY_FETCH_TIMEOUT_SECONDS", DEFAULT_FETCH_TIMEOUT_SECS).max(1),
        );
        cfg.advisory_timeout = Duration::from_secs(
            env_parse("ADVISORY_TIMEOUT_SECONDS", DEFAULT_ADVISORY_TIMEOUT_SECS).max(1),
        );

        if let Ok(raw) = std::env::var("HOME_REGION") {
            match RegionCode::parse(&raw) {
                Ok(code) if cfg.regions.contains(&code) => cfg.home_region = code,
                _ => tracing::warn!(value = %raw, "HOME_REGION is not a configured region, keeping default"),
            }
        }

        if let Ok(base) = std::env::var("NOWTRICITY_API_BASE") {
            if !base.trim().is_empty() {
                cfg.intensity_api_base = base.trim().trim_end_matches('/').to_string();
            }
        }
        cfg.intensity_api_key = std::env::var("NOWTRICITY_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        Ok(cfg)
    }
}

fn default_home(regions: &RegionSet) -> RegionCode {
    regions
        .codes()
        .find(|c| c.as_str() == "SE")
        .unwrap_or(&regions.first().code)
        .clone()
}

/// Floor to `MIN_REFRESH_SECS`.
pub fn floored_refresh(secs: u64) -> Duration {
    Duration::from_secs(secs.max(MIN_REFRESH_SECS))
}

/// Keep the configured default weight inside [0,1]; anything else → default.
pub fn sanitize_weight(w: f64) -> f64 {
    if w.is_finite() && (0.0..=1.0).contains(&w) {
        w
    } else {
        tracing::warn!(weight = w, "BALANCE_WEIGHT outside [0,1], using default");
        DEFAULT_BALANCE_WEIGHT
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, default = %default, "invalid env value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
