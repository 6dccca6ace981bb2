// tests/common/mod.rs
//
// Shared fixtures: a scripted in-memory intensity source and a builder for
// an orchestrator over the reference region table.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use carbon_region_advisor::advisory::DynAdvisor;
use carbon_region_advisor::config::ServiceConfig;
use carbon_region_advisor::emissions::FixedUtilization;
use carbon_region_advisor::intensity::{IntensityCache, IntensitySource, TimeWindow};
use carbon_region_advisor::region::{RegionCode, RegionSet};
use carbon_region_advisor::{build_orchestrator, RecommendationOrchestrator};

/// How the scripted source answers for one region.
#[derive(Debug, Clone)]
pub enum Reply {
    Values(Vec<f64>),
    Fail(&'static str),
    /// Never answers; only a timeout gets the caller out.
    Hang,
    /// Answers after a delay.
    Slow(Duration, Vec<f64>),
}

#[derive(Default)]
pub struct ScriptedSource {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live values equal to the reference fallbacks: SE 25, DE 420, GB 250, FR 60.
    pub fn reference() -> Self {
        let s = Self::new();
        s.set("SE", Reply::Values(vec![20.0, 30.0]));
        s.set("DE", Reply::Values(vec![420.0]));
        s.set("GB", Reply::Values(vec![240.0, 260.0]));
        s.set("FR", Reply::Values(vec![60.0]));
        s
    }

    pub fn set(&self, region: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(region.to_string(), reply);
    }

    pub fn calls_for(&self, region: &str) -> usize {
        self.calls.lock().unwrap().get(region).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntensitySource for ScriptedSource {
    async fn fetch_window(&self, region: &RegionCode, window: &TimeWindow) -> anyhow::Result<Vec<f64>> {
        assert!(window.start < window.end, "window must be non-empty");
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap()
            .entry(region.to_string())
            .or_insert(0) += 1;

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(region.as_str())
            .cloned()
            .unwrap_or(Reply::Fail("no script"));

        match reply {
            Reply::Values(v) => Ok(v),
            Reply::Fail(msg) => Err(anyhow::anyhow!(msg)),
            Reply::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Reply::Slow(d, v) => {
                tokio::time::sleep(d).await;
                Ok(v)
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn code(s: &str) -> RegionCode {
    RegionCode::parse(s).expect("valid region code")
}

pub fn reference_config() -> ServiceConfig {
    let mut cfg = ServiceConfig::with_regions(RegionSet::reference());
    cfg.role = "api".to_string();
    cfg
}

pub fn cache_over(source: Arc<ScriptedSource>, ttl: Duration) -> IntensityCache {
    IntensityCache::new(source, RegionSet::reference(), ttl, Duration::from_secs(10))
}

/// Orchestrator over the reference regions with a fixed utilization.
pub fn orchestrator_with(
    source: Arc<ScriptedSource>,
    utilization: f64,
    advisor: DynAdvisor,
) -> Arc<RecommendationOrchestrator> {
    build_orchestrator(
        reference_config(),
        source,
        Arc::new(FixedUtilization(utilization)),
        advisor,
    )
}
