use crate::config::AppConfig;
use crate::dashboard::render_dashboard;
use crate::types::{DashboardData, MunicipalityProductCapacity, ProductCapacity};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::{Html, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

/// Read-only state shared by every handler, built once before binding.
pub struct AppState {
    pub page: String,
    pub summary: SummaryResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    unique_stations: usize,
    total_capacity_m3: f64,
    dropped_rows: usize,
    by_product: Vec<ProductCapacity>,
    by_municipality_product: Vec<MunicipalityProductCapacity>,
}

impl From<&DashboardData> for SummaryResponse {
    fn from(data: &DashboardData) -> Self {
        Self {
            unique_stations: data.unique_stations,
            total_capacity_m3: data.total_capacity_m3,
            dropped_rows: data.dropped_rows,
            by_product: data.by_product.clone(),
            by_municipality_product: data.by_municipality_product.clone(),
        }
    }
}

impl AppState {
    pub fn new(config: &AppConfig, data: &DashboardData) -> Result<Self> {
        Ok(Self {
            page: render_dashboard(data, config)?,
            summary: SummaryResponse::from(data),
        })
    }
}

pub fn build_router(config: &AppConfig, data: &DashboardData) -> Result<Router> {
    let state = Arc::new(AppState::new(config, data)?);

    Ok(Router::new()
        .route("/", get(index_handler))
        .route("/api/summary", get(summary_handler))
        .nest_service("/assets", ServeDir::new(&config.output.asset_dir))
        .layer(CorsLayer::permissive())
        .with_state(state))
}

pub async fn start_server(config: AppConfig, data: DashboardData) -> Result<()> {
    let app = build_router(&config, &data)?;

    let addr = SocketAddr::from((config.server.host, config.server.port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.page.clone())
}

async fn summary_handler(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    Json(state.summary.clone())
}
