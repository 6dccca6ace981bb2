// tests/intensity_cache.rs
//
// Freshness, single-flight and fallback behavior of the intensity cache,
// driven by a scripted source under paused time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use carbon_region_advisor::intensity::providers::nowtricity::parse_intensities;
use carbon_region_advisor::intensity::SampleOrigin;
use common::{cache_over, code, Reply, ScriptedSource};

const TTL: Duration = Duration::from_secs(300);

#[tokio::test(start_paused = true)]
async fn two_gets_within_ttl_fetch_once_per_region() {
    let source = Arc::new(ScriptedSource::reference());
    let cache = cache_over(source.clone(), TTL);

    let a = cache.get().await;
    tokio::time::advance(Duration::from_secs(120)).await;
    let b = cache.get().await;

    assert!(Arc::ptr_eq(&a, &b), "second get should reuse the snapshot");
    for r in ["SE", "DE", "GB", "FR"] {
        assert_eq!(source.calls_for(r), 1, "region {r} fetched more than once");
    }
    assert_eq!(a.get(&code("SE")), Some(25.0));
    assert_eq!(a.get(&code("GB")), Some(250.0));
}

#[tokio::test(start_paused = true)]
async fn ttl_expiry_triggers_refetch() {
    let source = Arc::new(ScriptedSource::reference());
    let cache = cache_over(source.clone(), TTL);

    cache.get().await;
    tokio::time::advance(TTL + Duration::from_secs(1)).await;
    source.set("SE", Reply::Values(vec![40.0]));
    let snap = cache.get().await;

    assert_eq!(source.calls_for("SE"), 2);
    assert_eq!(snap.get(&code("SE")), Some(40.0));
}

#[tokio::test(start_paused = true)]
async fn concurrent_misses_share_one_fetch() {
    let source = Arc::new(ScriptedSource::reference());
    source.set("SE", Reply::Slow(Duration::from_secs(2), vec![25.0]));
    let cache = Arc::new(cache_over(source.clone(), TTL));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let c = Arc::clone(&cache);
            tokio::spawn(async move { c.get().await })
        })
        .collect();

    let mut snaps = Vec::new();
    for t in tasks {
        snaps.push(t.await.expect("task"));
    }

    assert_eq!(source.calls_for("SE"), 1);
    assert_eq!(source.total_calls(), 4);
    assert!(snaps.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[tokio::test(start_paused = true)]
async fn failing_region_gets_its_fallback_and_others_are_untouched() {
    let source = Arc::new(ScriptedSource::reference());
    source.set("SE", Reply::Values(vec![31.0]));
    source.set("DE", Reply::Fail("503 Service Unavailable"));
    let cache = cache_over(source, TTL);

    let snap = cache.get().await;
    let de = snap.samples.iter().find(|s| s.region == code("DE")).unwrap();
    assert_eq!(de.intensity_g_per_kwh, 420.0);
    assert_eq!(de.origin, SampleOrigin::Fallback);

    let se = snap.samples.iter().find(|s| s.region == code("SE")).unwrap();
    assert_eq!(se.intensity_g_per_kwh, 31.0);
    assert_eq!(se.origin, SampleOrigin::Live);
    assert_eq!(snap.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn hanging_source_times_out_to_fallback() {
    let source = Arc::new(ScriptedSource::reference());
    source.set("GB", Reply::Hang);
    let cache = cache_over(source, TTL);

    let snap = cache.get().await;
    assert_eq!(snap.get(&code("GB")), Some(250.0));
    assert_eq!(snap.get(&code("FR")), Some(60.0));
}

#[tokio::test(start_paused = true)]
async fn empty_or_non_numeric_payload_uses_fallback() {
    let source = Arc::new(ScriptedSource::reference());
    source.set("FR", Reply::Values(vec![]));
    let no_numbers = parse_intensities(r#"[{"datetime": "2025-03-01T00:00:00Z"}]"#).unwrap();
    source.set("SE", Reply::Values(no_numbers));
    let cache = cache_over(source, TTL);

    let snap = cache.get().await;
    assert_eq!(snap.get(&code("FR")), Some(60.0));
    assert_eq!(snap.get(&code("SE")), Some(25.0));
    assert!(snap
        .samples
        .iter()
        .filter(|s| s.origin == SampleOrigin::Fallback)
        .all(|s| s.region == code("FR") || s.region == code("SE")));
}

#[tokio::test(start_paused = true)]
async fn invalidate_forces_refetch_but_peek_keeps_old_snapshot() {
    let source = Arc::new(ScriptedSource::reference());
    let cache = cache_over(source.clone(), TTL);

    assert!(cache.peek().await.is_none());
    let first = cache.get().await;
    cache.invalidate().await;
    assert!(Arc::ptr_eq(&cache.peek().await.unwrap(), &first));

    cache.get().await;
    assert_eq!(source.calls_for("DE"), 2);
}

#[test]
fn fixture_payload_averages_numeric_entries() {
    let body = include_str!("fixtures/nowtricity_se.json");
    let values = parse_intensities(body).unwrap();
    assert_eq!(values, vec![22.0, 24.0, 29.0]);
}
