use crate::config::AppConfig;
use crate::context::{self, AppContext, InspectState, LayerState};
use crate::pollutant::Pollutant;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Deserialize)]
pub struct LayerParams {
    pollutant: String,
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
pub struct SampleParams {
    pollutant: String,
    year: i32,
    month: u32,
    // kept as text so non-numeric input is reported, not rejected by the extractor
    lat: String,
    lon: String,
}

#[derive(Deserialize)]
pub struct LegendParams {
    pollutant: String,
}

#[derive(Serialize)]
struct PollutantOption {
    id: &'static str,
    label: &'static str,
    unit: &'static str,
}

pub async fn start_server(config: AppConfig, context: AppContext) -> Result<()> {
    let state = Arc::new(context);

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    info!("Starting server on http://{}", addr);

    let app = router(state, &config.server.static_dir);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: Arc<AppContext>, static_dir: &Path) -> Router {
    Router::new()
        .route("/api/config", get(config_handler))
        .route("/api/aoi", get(aoi_handler))
        .route("/api/legend", get(legend_handler))
        .route("/api/layer", get(layer_handler))
        .route("/api/sample", get(sample_handler))
        .route("/api/cache/clear", post(cache_clear_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn config_handler(State(state): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let pollutants: Vec<PollutantOption> = Pollutant::ALL
        .iter()
        .map(|p| {
            let spec = p.spec();
            PollutantOption { id: spec.id, label: spec.label, unit: spec.unit }
        })
        .collect();
    let ui = &state.ui;

    Json(json!({
        "pollutants": pollutants,
        "years": (ui.first_year..=ui.last_year).collect::<Vec<_>>(),
        "default_year": ui.default_year,
        "months": (1..=12).collect::<Vec<u32>>(),
        "center": { "lat": ui.center[0], "lon": ui.center[1] },
        "zoom": ui.zoom,
        "aoi_name": state.aoi.name,
    }))
}

async fn aoi_handler(State(state): State<Arc<AppContext>>) -> Json<geojson::FeatureCollection> {
    Json(state.aoi.boundary.clone())
}

async fn legend_handler(Query(params): Query<LegendParams>) -> Response {
    match context::legend_view(&params.pollutant) {
        Ok(view) => Json(view).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": e.kind(), "message": e.to_string() })),
        )
            .into_response(),
    }
}

async fn layer_handler(
    State(state): State<Arc<AppContext>>,
    Query(params): Query<LayerParams>,
) -> (StatusCode, Json<LayerState>) {
    let layer = state.layer(&params.pollutant, params.year, params.month).await;
    let status = match layer {
        LayerState::Ready { .. } | LayerState::Empty { .. } => StatusCode::OK,
        LayerState::Invalid { .. } => StatusCode::BAD_REQUEST,
        LayerState::Error { .. } => StatusCode::BAD_GATEWAY,
    };
    (status, Json(layer))
}

async fn sample_handler(
    State(state): State<Arc<AppContext>>,
    Query(params): Query<SampleParams>,
) -> (StatusCode, Json<InspectState>) {
    let sample = state
        .inspect(&params.pollutant, params.year, params.month, &params.lat, &params.lon)
        .await;
    let status = match sample {
        InspectState::Invalid { .. } => StatusCode::BAD_REQUEST,
        InspectState::Error { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    };
    (status, Json(sample))
}

async fn cache_clear_handler(State(state): State<Arc<AppContext>>) -> impl IntoResponse {
    let dropped = state.composites.invalidate().await;
    info!(dropped, "Cleared composite cache");
    (StatusCode::OK, Json(json!({ "dropped": dropped })))
}
