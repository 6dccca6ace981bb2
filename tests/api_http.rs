// tests/api_http.rs
//
// HTTP-level tests for the public router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /recommendation (shape, weight override, bad weight)
// - GET /ai-insight (disabled, mock, outage, bad refresh flag)
// - GET /metrics without an exporter

mod common;

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use carbon_region_advisor::advisory::{
    AdvisoryError, DisabledAdvisor, DynAdvisor, FailingAdvisor, MockAdvisor,
};
use carbon_region_advisor::{router, AppState};
use common::{orchestrator_with, ScriptedSource};

const BODY_LIMIT: usize = 1024 * 1024;

fn app_with(advisor: DynAdvisor) -> Router {
    let orch = orchestrator_with(Arc::new(ScriptedSource::reference()), 0.0, advisor);
    router(AppState::new(orch, None))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

#[tokio::test]
async fn health_reports_role() {
    let (status, v) = get(app_with(Arc::new(DisabledAdvisor)), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "healthy");
    assert_eq!(v["role"], "api");
}

#[tokio::test]
async fn recommendation_returns_full_comparison() {
    let (status, v) = get(app_with(Arc::new(DisabledAdvisor)), "/recommendation").await;
    assert_eq!(status, StatusCode::OK, "body: {v}");

    assert_eq!(v["role"], "api");
    assert_eq!(v["best_region"], "SE");
    assert_eq!(v["balanced_region"], "FR");
    assert_eq!(v["weight_carbon"], 0.5);
    assert_eq!(v["utilization_pct"], 0.0);
    assert!(v["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));

    for field in ["emissions_g_h", "prices_usd_h", "scores"] {
        let map = v[field].as_object().unwrap_or_else(|| panic!("{field} missing"));
        assert_eq!(map.len(), 4, "{field} should list every region");
    }
    // 3.5 W idle at 25 g/kWh, rounded to 2 dp
    let se = v["emissions_g_h"]["SE"].as_f64().unwrap();
    assert!((se - 0.09).abs() < 0.011, "SE emissions {se}");
    assert_eq!(v["prices_usd_h"]["SE"], 0.0784);
    assert_eq!(v["components"]["carbon"]["SE"], 0.0);
    assert_eq!(v["components"]["price"]["SE"], 1.0);
    assert_eq!(v["scores"]["SE"], 0.5);
}

#[tokio::test]
async fn recommendation_weight_override() {
    let (status, v) = get(app_with(Arc::new(DisabledAdvisor)), "/recommendation?w=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["weight_carbon"], 0.0);
    assert_eq!(v["balanced_region"], "GB");

    let (_, v) = get(app_with(Arc::new(DisabledAdvisor)), "/recommendation?w=1").await;
    assert_eq!(v["balanced_region"], v["best_region"]);
}

#[tokio::test]
async fn recommendation_rejects_bad_weight() {
    for uri in ["/recommendation?w=abc", "/recommendation?w=NaN", "/recommendation?w=inf"] {
        let (status, v) = get(app_with(Arc::new(DisabledAdvisor)), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(v["error"], "invalid_weight");
        assert!(v["message"].as_str().is_some());
    }
}

#[tokio::test]
async fn insight_unavailable_when_advisory_disabled() {
    let (status, v) = get(app_with(Arc::new(DisabledAdvisor)), "/ai-insight").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(v["error"], "disabled");
}

#[tokio::test]
async fn insight_from_mock_advisor() {
    let app = app_with(Arc::new(MockAdvisor::new("Prefer FR for steady workloads.")));
    let (status, v) = get(app, "/ai-insight?refresh=true").await;
    assert_eq!(status, StatusCode::OK, "body: {v}");
    assert_eq!(v["insight"], "Prefer FR for steady workloads.");
    assert_eq!(v["provider"], "mock");
    assert_eq!(v["best_region"], "SE");
    assert_eq!(v["balanced_region"], "FR");
    assert!(v["current_co2_g_hour"].as_f64().is_some());
}

#[tokio::test]
async fn insight_outage_maps_to_bad_gateway() {
    let err = AdvisoryError::Service {
        status: 500,
        message: "upstream exploded".into(),
    };
    let app = app_with(Arc::new(FailingAdvisor::new(err)));
    let (status, v) = get(app, "/ai-insight").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(v["error"], "service_error");
    assert!(v["message"].as_str().unwrap().contains("upstream exploded"));
}

#[tokio::test]
async fn insight_rejects_bad_refresh_flag() {
    let app = app_with(Arc::new(MockAdvisor::new("x")));
    let (status, v) = get(app, "/ai-insight?refresh=sometimes").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "invalid_refresh");
}

#[tokio::test]
async fn metrics_route_is_404_without_exporter() {
    let app = app_with(Arc::new(DisabledAdvisor));
    let req = Request::get("/metrics").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
