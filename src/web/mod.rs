use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    engine,
    export::{grid_csv, RunReport},
    scenario::{Overrides, Scenario},
};

pub struct WebServerConfig {
    pub scenario: Scenario,
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
struct LatestRun {
    report: RunReport,
    csv: String,
}

pub struct AppState {
    scenario: Scenario,
    latest: Mutex<Option<LatestRun>>,
}

impl AppState {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            latest: Mutex::new(None),
        }
    }

    fn latest(&self) -> Option<LatestRun> {
        match self.latest.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store(&self, run: LatestRun) {
        let mut guard = match self.latest.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(run);
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/run", get(run_release))
        .route("/api/latest", get(latest_report))
        .route("/api/latest/density.csv", get(latest_grid))
        .with_state(state)
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        scenario,
        host,
        port,
    } = config;

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    let scenario_name = scenario.name.clone();
    let state = Arc::new(AppState::new(scenario));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, scenario = %scenario_name, "release API listening (Ctrl+C to stop)");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down release API");
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "no run yet").into_response(),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
        }
    }
}

async fn run_release(
    State(state): State<Arc<AppState>>,
    Query(overrides): Query<Overrides>,
) -> Result<Json<RunReport>, ApiError> {
    let mut scenario = state.scenario.clone();
    scenario.apply(&overrides);

    // Resolving the origin may read the site raster, so it runs off the executor too.
    let run = tokio::task::spawn_blocking(move || -> Result<LatestRun, ApiError> {
        let params = scenario
            .release_params()
            .map_err(|err| ApiError::BadRequest(format!("{err:#}")))?;
        let outcome = engine::run(params.clone()).map_err(|err| {
            warn!(error = %err, "release run failed");
            ApiError::Internal(err.to_string())
        })?;
        let report = RunReport::new(&scenario.name, &params, &outcome);
        Ok(LatestRun {
            report,
            csv: grid_csv(&outcome.grid),
        })
    })
    .await
    .map_err(|err| ApiError::Internal(format!("simulation task failed: {err}")))??;

    let report = run.report.clone();
    state.store(run);
    Ok(Json(report))
}

async fn latest_report(State(state): State<Arc<AppState>>) -> Result<Json<RunReport>, ApiError> {
    state
        .latest()
        .map(|run| Json(run.report))
        .ok_or(ApiError::NotFound)
}

async fn latest_grid(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let run = state.latest().ok_or(ApiError::NotFound)?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], run.csv).into_response())
}
