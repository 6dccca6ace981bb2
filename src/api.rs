use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::advisory::AdvisoryError;
use crate::metrics::Metrics;
use crate::orchestrator::{InsightView, RecommendationOrchestrator};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RecommendationOrchestrator>,
    /// `None` when no Prometheus recorder is installed; `/metrics` is then 404.
    pub metrics: Option<Metrics>,
}

impl AppState {
    pub fn new(orchestrator: Arc<RecommendationOrchestrator>, metrics: Option<Metrics>) -> Self {
        Self {
            orchestrator,
            metrics,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/recommendation", get(recommendation))
        .route("/ai-insight", get(ai_insight))
        .route("/metrics", get(metrics_text))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ------------------------------------------------------------
// Errors
// ------------------------------------------------------------

/// JSON error body: `{"error": <code>, "message": <text>}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, message: String },
    Advisory(AdvisoryError),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            ApiError::Advisory(e) => {
                let status = match e {
                    AdvisoryError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
                    AdvisoryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, e.kind(), e.to_string())
            }
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", message),
        };
        (status, Json(ErrorBody { error: code, message })).into_response()
    }
}

impl From<AdvisoryError> for ApiError {
    fn from(e: AdvisoryError) -> Self {
        ApiError::Advisory(e)
    }
}

// ------------------------------------------------------------
// Handlers
// ------------------------------------------------------------

#[derive(Serialize)]
struct HealthResp<'a> {
    status: &'static str,
    role: &'a str,
}

async fn health(State(state): State<AppState>) -> Response {
    Json(HealthResp {
        status: "healthy",
        role: state.orchestrator.role(),
    })
    .into_response()
}

// Raw strings so malformed values map to our own 400 body instead of
// axum's plain-text rejection.
#[derive(Deserialize)]
struct RecommendationQuery {
    w: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Components {
    pub carbon: BTreeMap<String, f64>,
    pub price: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResp {
    pub role: String,
    pub best_region: String,
    pub balanced_region: String,
    pub weight_carbon: f64,
    pub utilization_pct: f64,
    pub emissions_g_h: BTreeMap<String, f64>,
    pub prices_usd_h: BTreeMap<String, f64>,
    pub scores: BTreeMap<String, f64>,
    pub components: Components,
    pub timestamp: String,
}

/// Parse the optional carbon weight. Any finite number is accepted.
pub fn parse_weight(raw: Option<&str>) -> Result<Option<f64>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<f64>() {
        Ok(w) if w.is_finite() => Ok(Some(w)),
        _ => Err(ApiError::BadRequest {
            code: "invalid_weight",
            message: format!("w must be a finite number, got {raw:?}"),
        }),
    }
}

/// Parse the optional `refresh` flag (`true|false|1|0`).
pub fn parse_refresh(raw: Option<&str>) -> Result<bool, ApiError> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(other) => Err(ApiError::BadRequest {
            code: "invalid_refresh",
            message: format!("refresh must be true or false, got {other:?}"),
        }),
    }
}

fn round_to(v: f64, dp: i32) -> f64 {
    let f = 10f64.powi(dp);
    (v * f).round() / f
}

async fn recommendation(
    State(state): State<AppState>,
    Query(q): Query<RecommendationQuery>,
) -> Result<Json<RecommendationResp>, ApiError> {
    let weight = parse_weight(q.w.as_deref())?;
    let eval = state
        .orchestrator
        .evaluate(weight)
        .await
        .map_err(|e| ApiError::Internal(format!("{e:#}")))?;
    let ranking = &eval.ranking;

    let mut emissions = BTreeMap::new();
    let mut prices = BTreeMap::new();
    let mut scores = BTreeMap::new();
    let mut carbon = BTreeMap::new();
    let mut price = BTreeMap::new();
    for r in &ranking.regions {
        let code = r.region.to_string();
        emissions.insert(code.clone(), round_to(r.co2_g_per_hour, 2));
        prices.insert(code.clone(), r.price_usd_h);
        scores.insert(code.clone(), round_to(r.weighted_score, 3));
        carbon.insert(code.clone(), round_to(r.carbon_norm, 3));
        price.insert(code, round_to(r.price_norm, 3));
    }

    tracing::debug!(
        best = %ranking.best_region,
        balanced = %ranking.balanced_region,
        w = ranking.weight_carbon,
        "recommendation served"
    );

    Ok(Json(RecommendationResp {
        role: eval.role.clone(),
        best_region: ranking.best_region.to_string(),
        balanced_region: ranking.balanced_region.to_string(),
        weight_carbon: ranking.weight_carbon,
        utilization_pct: round_to(ranking.utilization_pct, 2),
        emissions_g_h: emissions,
        prices_usd_h: prices,
        scores,
        components: Components { carbon, price },
        timestamp: eval.timestamp.clone(),
    }))
}

#[derive(Deserialize)]
struct InsightQuery {
    refresh: Option<String>,
}

async fn ai_insight(
    State(state): State<AppState>,
    Query(q): Query<InsightQuery>,
) -> Result<Json<InsightView>, ApiError> {
    let force = parse_refresh(q.refresh.as_deref())?;
    match state.orchestrator.insight(force).await {
        Ok(view) => Ok(Json(view)),
        Err(e) => {
            tracing::warn!(error = %e, kind = e.kind(), force, "advisory insight unavailable");
            Err(e.into())
        }
    }
}

async fn metrics_text(State(state): State<AppState>) -> Response {
    let Some(metrics) = state.metrics.as_ref() else {
        return (StatusCode::NOT_FOUND, "metrics exporter not installed").into_response();
    };
    // Gauges reflect the current intensities, not just the last timer tick.
    if let Err(e) = state.orchestrator.evaluate_and_record().await {
        tracing::warn!(error = %e, "failed to refresh gauges before render");
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.render(),
    )
        .into_response()
}
