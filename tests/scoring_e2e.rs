// tests/scoring_e2e.rs
//
// End-to-end scoring over the reference regions:
// intensities {SE:25, DE:420, GB:250, FR:60}, utilization 0 %.

mod common;

use std::sync::Arc;

use carbon_region_advisor::advisory::DisabledAdvisor;
use carbon_region_advisor::emissions::{EmissionsEstimator, FixedUtilization, PowerModel};
use carbon_region_advisor::region::RegionSet;
use carbon_region_advisor::scoring::RegionScorer;
use common::{code, orchestrator_with, Reply, ScriptedSource};

fn reference_orchestrator() -> Arc<carbon_region_advisor::RecommendationOrchestrator> {
    orchestrator_with(
        Arc::new(ScriptedSource::reference()),
        0.0,
        Arc::new(DisabledAdvisor),
    )
}

#[tokio::test]
async fn carbon_only_winner_is_sweden() {
    let orch = reference_orchestrator();
    let eval = orch.evaluate(Some(1.0)).await.unwrap();
    assert_eq!(eval.ranking.best_region, code("SE"));
    assert_eq!(eval.role, "api");

    // 3.5 W idle at 25 g/kWh
    let se = eval.ranking.get(&code("SE")).unwrap();
    assert!((se.co2_g_per_hour - 0.0875).abs() < 1e-9);
    assert!((se.power_watts - 3.5).abs() < 1e-9);
}

#[tokio::test]
async fn weight_one_reproduces_carbon_only_ranking() {
    let orch = reference_orchestrator();
    let eval = orch.evaluate(Some(1.0)).await.unwrap();
    assert_eq!(eval.ranking.balanced_region, eval.ranking.best_region);
}

#[tokio::test]
async fn weight_zero_is_pure_price_and_ties_go_to_configured_order() {
    let orch = reference_orchestrator();
    let eval = orch.evaluate(Some(0.0)).await.unwrap();
    // GB and FR share the lowest price; GB comes first in the table.
    assert_eq!(eval.ranking.balanced_region, code("GB"));
    assert_eq!(eval.ranking.best_region, code("SE"));
}

#[tokio::test]
async fn default_weight_balances_towards_france() {
    let orch = reference_orchestrator();
    let eval = orch.evaluate(None).await.unwrap();
    assert_eq!(eval.ranking.weight_carbon, 0.5);
    assert_eq!(eval.ranking.balanced_region, code("FR"));

    for r in &eval.ranking.regions {
        assert!((0.0..=1.0).contains(&r.weighted_score), "{} out of range", r.region);
    }
    let se = eval.ranking.get(&code("SE")).unwrap();
    assert_eq!(se.carbon_norm, 0.0);
    assert_eq!(se.price_norm, 1.0);
}

#[tokio::test]
async fn identical_intensities_zero_the_carbon_dimension() {
    let source = ScriptedSource::new();
    for r in ["SE", "DE", "GB", "FR"] {
        source.set(r, Reply::Values(vec![100.0]));
    }
    let orch = orchestrator_with(Arc::new(source), 40.0, Arc::new(DisabledAdvisor));
    let eval = orch.evaluate(Some(0.7)).await.unwrap();

    assert!(eval.ranking.regions.iter().all(|r| r.carbon_norm == 0.0));
    // carbon ties everywhere: first configured region wins
    assert_eq!(eval.ranking.best_region, code("SE"));
    assert_eq!(eval.ranking.balanced_region, code("GB"));
}

#[tokio::test]
async fn estimates_grow_with_utilization_and_intensity() {
    let model = PowerModel::default();
    let mut prev = 0.0;
    for u in [0.0, 10.0, 50.0, 90.0, 100.0, 150.0] {
        let co2 = model.co2_g_per_hour(u, 250.0);
        assert!(co2 >= prev, "not monotone at u={u}");
        prev = co2;
    }
    assert!(model.co2_g_per_hour(30.0, 420.0) > model.co2_g_per_hour(30.0, 60.0));
    assert_eq!(model.power_watts(100.0), 18.0);
    assert_eq!(model.power_watts(250.0), 18.0);

    let est = EmissionsEstimator::new(model, Arc::new(FixedUtilization(100.0)));
    let e = est.estimate(&code("DE"), 420.0).await;
    assert!((e.co2_g_per_hour - 18.0 / 1000.0 * 420.0).abs() < 1e-9);
}

#[test]
fn scorer_over_explicit_estimates_matches_direct_argmin() {
    let regions = RegionSet::reference();
    let scorer = RegionScorer::new(regions.price_table());
    let model = PowerModel::default();
    let est = EmissionsEstimator::new(model, Arc::new(FixedUtilization(0.0)));

    let estimates: Vec<_> = regions
        .iter()
        .map(|spec| est.estimate_at(&spec.code, 0.0, spec.fallback_g_per_kwh))
        .collect();

    let best = scorer.carbon_only(&estimates).unwrap();
    assert_eq!(best.region, code("SE"));

    let balanced = scorer.balanced(&estimates, 1.0);
    let winner = scorer.balanced_winner(&balanced).unwrap();
    assert_eq!(winner.region, best.region);
    assert!(scorer.carbon_only(&[]).is_none());
}
