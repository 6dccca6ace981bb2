//! # Recommendation Orchestrator
//! Drives cache → estimator → scorer, publishes metrics, calls the advisor,
//! and keeps the last good results for concurrent readers.
//!
//! - The last computed ranking and the last successful insight live behind
//!   one `RwLock` and are replaced only with complete values.
//! - A failed advisory call leaves the previous insight untouched.
//! - The periodic task never runs faster than the configured floor; its
//!   failures are logged and retried on the next tick.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use metrics::counter;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::advisory::{prompt::build_prompt, AdvisoryError, DynAdvisor};
use crate::config::service::MIN_REFRESH_SECS;
use crate::config::ServiceConfig;
use crate::emissions::EmissionsEstimator;
use crate::intensity::IntensityCache;
use crate::region::RegionCode;
use crate::scoring::{Ranking, RegionScorer};

/// Last successful advisory result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub timestamp: String,
    pub role: String,
    pub best_region: RegionCode,
    pub balanced_region: RegionCode,
    pub weight_carbon: f64,
    #[serde(rename = "insight")]
    pub text: String,
    pub provider: &'static str,
}

/// What `/ai-insight` returns: the stored insight plus a live CO2 figure.
#[derive(Debug, Clone, Serialize)]
pub struct InsightView {
    #[serde(flatten)]
    pub insight: Insight,
    pub current_co2_g_hour: f64,
}

/// A ranking plus the role and time it was computed for.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub role: String,
    pub ranking: Ranking,
    pub timestamp: String,
}

#[derive(Debug, Default)]
struct Snapshot {
    last_evaluation: Option<Arc<Evaluation>>,
    last_insight: Option<Insight>,
}

pub struct RecommendationOrchestrator {
    cfg: ServiceConfig,
    cache: Arc<IntensityCache>,
    estimator: EmissionsEstimator,
    scorer: RegionScorer,
    advisor: DynAdvisor,
    snapshot: RwLock<Snapshot>,
    // serializes advisory cycles (timer vs. forced refresh)
    cycle_gate: Mutex<()>,
}

impl RecommendationOrchestrator {
    pub fn new(
        cfg: ServiceConfig,
        cache: Arc<IntensityCache>,
        estimator: EmissionsEstimator,
        advisor: DynAdvisor,
    ) -> Self {
        let scorer = RegionScorer::new(cfg.regions.price_table());
        Self {
            cfg,
            cache,
            estimator,
            scorer,
            advisor,
            snapshot: RwLock::new(Snapshot::default()),
            cycle_gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.cfg
    }

    pub fn role(&self) -> &str {
        &self.cfg.role
    }

    pub fn cache(&self) -> &IntensityCache {
        &self.cache
    }

    pub fn scorer(&self) -> &RegionScorer {
        &self.scorer
    }

    pub fn advisor_name(&self) -> &'static str {
        self.advisor.provider_name()
    }

    /// Score all regions now. `weight` overrides the configured balance weight.
    pub async fn evaluate(&self, weight: Option<f64>) -> anyhow::Result<Evaluation> {
        let w = weight.unwrap_or(self.cfg.balance_weight);
        let intensities = self.cache.get().await;
        let (utilization, estimates) = self.estimator.estimate_all(&intensities).await;
        let ranking = self
            .scorer
            .rank(&intensities, utilization, &estimates, w)
            .context("no regions to rank")?;
        Ok(Evaluation {
            role: self.cfg.role.clone(),
            ranking,
            timestamp: now_iso(),
        })
    }

    /// Evaluate with the default weight, publish gauges, and remember the result.
    pub async fn evaluate_and_record(&self) -> anyhow::Result<Arc<Evaluation>> {
        let eval = self.evaluate(None).await?;
        crate::metrics::record_cycle(&self.cfg.role, &eval.ranking);
        let eval = Arc::new(eval);
        self.write_snapshot().last_evaluation = Some(Arc::clone(&eval));
        Ok(eval)
    }

    /// One full cycle: evaluate, record, ask the advisor. Only a successful
    /// advisory call replaces the stored insight.
    pub async fn run_cycle(&self) -> Result<Insight, AdvisoryError> {
        let _gate = self.cycle_gate.lock().await;
        self.cycle_locked().await
    }

    // Caller holds `cycle_gate`.
    async fn cycle_locked(&self) -> Result<Insight, AdvisoryError> {
        let eval = self
            .evaluate_and_record()
            .await
            .map_err(|e| AdvisoryError::Internal(format!("scoring failed: {e:#}")))?;
        let prompt = build_prompt(&self.cfg.role, &eval.ranking);

        tracing::info!(provider = self.advisor.provider_name(), "refreshing advisory insight");
        let outcome = match tokio::time::timeout(self.cfg.advisory_timeout, self.advisor.advise(&prompt)).await {
            Ok(res) => res,
            Err(_) => Err(AdvisoryError::Timeout(self.cfg.advisory_timeout.as_secs())),
        };

        match outcome {
            Ok(text) => {
                let insight = Insight {
                    timestamp: now_iso(),
                    role: self.cfg.role.clone(),
                    best_region: eval.ranking.best_region.clone(),
                    balanced_region: eval.ranking.balanced_region.clone(),
                    weight_carbon: eval.ranking.weight_carbon,
                    text,
                    provider: self.advisor.provider_name(),
                };
                self.write_snapshot().last_insight = Some(insight.clone());
                counter!("advisory_requests_total", "outcome" => "ok").increment(1);
                tracing::info!(
                    best = %insight.best_region,
                    balanced = %insight.balanced_region,
                    "advisory refresh complete"
                );
                Ok(insight)
            }
            Err(e) => {
                counter!("advisory_requests_total", "outcome" => e.kind()).increment(1);
                Err(e)
            }
        }
    }

    /// Last insight (refreshing first when forced or when none exists) plus
    /// the current CO2/h estimate for the home region.
    pub async fn insight(&self, force: bool) -> Result<InsightView, AdvisoryError> {
        let insight = match (force, self.last_insight()) {
            (false, Some(existing)) => existing,
            (true, _) => self.run_cycle().await?,
            (false, None) => {
                let _gate = self.cycle_gate.lock().await;
                // a concurrent caller may have filled it while we waited
                match self.last_insight() {
                    Some(existing) => existing,
                    None => self.cycle_locked().await?,
                }
            }
        };

        let intensities = self.cache.get().await;
        let home = &self.cfg.home_region;
        let intensity = intensities
            .get(home)
            .unwrap_or_else(|| self.cfg.regions.fallback_for(home));
        let current = self.estimator.estimate(home, intensity).await;

        Ok(InsightView {
            insight,
            current_co2_g_hour: current.co2_g_per_hour,
        })
    }

    pub fn last_insight(&self) -> Option<Insight> {
        self.read_snapshot().last_insight.clone()
    }

    pub fn last_evaluation(&self) -> Option<Arc<Evaluation>> {
        self.read_snapshot().last_evaluation.clone()
    }

    /// Effective period of the background loop.
    pub fn refresh_period(&self) -> Duration {
        self.cfg
            .refresh_interval
            .max(Duration::from_secs(MIN_REFRESH_SECS))
    }

    /// Spawn the periodic refresh task. The first cycle runs immediately.
    pub fn spawn_refresh_loop(self: &Arc<Self>) -> RefreshHandle {
        self.spawn_refresh_loop_every(self.refresh_period())
    }

    /// Same as [`spawn_refresh_loop`](Self::spawn_refresh_loop) with an explicit
    /// period, not subject to the floor. Used by tests.
    pub fn spawn_refresh_loop_every(self: &Arc<Self>, period: Duration) -> RefreshHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let orch = Arc::clone(self);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Dropping the handle detaches the loop; only an explicit stop ends it.
            let mut detached = false;
            tracing::info!(period_secs = period.as_secs(), "refresh loop started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = stop_rx.changed(), if !detached => {
                        match changed {
                            Ok(()) if *stop_rx.borrow() => break,
                            Ok(()) => continue,
                            Err(_) => {
                                detached = true;
                                continue;
                            }
                        }
                    }
                }

                match orch.run_cycle().await {
                    Ok(_) => {
                        counter!("refresh_cycles_total", "outcome" => "ok").increment(1);
                    }
                    Err(AdvisoryError::Disabled) => {
                        counter!("refresh_cycles_total", "outcome" => "scored").increment(1);
                        tracing::debug!("advisory disabled, refreshed scores only");
                    }
                    Err(e) => {
                        counter!("refresh_cycles_total", "outcome" => "error").increment(1);
                        tracing::error!(error = %e, kind = e.kind(), "refresh cycle failed");
                    }
                }
            }
            tracing::info!("refresh loop stopped");
        });

        RefreshHandle { stop: stop_tx, join }
    }

    fn read_snapshot(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_snapshot(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot> {
        self.snapshot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the background refresh task.
///
/// `shutdown()` stops scheduling further ticks and waits for the task.
/// Dropping the handle leaves the task running until the runtime ends.
pub struct RefreshHandle {
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl RefreshHandle {
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.join.await {
            tracing::warn!(error = %e, "refresh loop ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
