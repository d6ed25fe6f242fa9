use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::Method;
use axum::response::Html;
use axum::routing::{get, MethodRouter};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::chart::ChartRenderer;
use crate::config::Config;
use crate::error::Result;
use crate::refresh::Refresher;
use crate::store::Store;
use crate::structs::{Period, TimeIndex, TimeSeries, Window};

#[derive(Clone)]
pub struct AppState {
    index: TimeIndex,
    renderer: ChartRenderer,
}

impl AppState {
    pub fn new(index: TimeIndex, renderer: ChartRenderer) -> Self {
        Self { index, renderer }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_methods([Method::GET]).allow_origin(Any);
    Router::new()
        .route("/", chart_route(Period::Week))
        .route("/day", chart_route(Period::Day))
        .route("/week", chart_route(Period::Week))
        .route("/month", chart_route(Period::Month))
        .route("/year", chart_route(Period::Year))
        .route("/all", chart_route(Period::All))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn chart_route(period: Period) -> MethodRouter<AppState> {
    get(
        move |State(state): State<AppState>, Query(params): Query<HashMap<String, String>>| async move {
            render_chart(&state, period, parse_shift(&params), Utc::now())
        },
    )
}

/// Missing or malformed `shift` means the current window.
pub fn parse_shift(params: &HashMap<String, String>) -> i32 {
    params
        .get("shift")
        .and_then(|s| s.trim().parse::<i32>().ok())
        .unwrap_or(0)
}

pub fn render_chart(state: &AppState, period: Period, shift: i32, now: DateTime<Utc>) -> Result<Html<String>> {
    let snapshot = state.index.current();
    let window = Window::resolve(period, shift, now);
    let ts = TimeSeries::from_snapshot(&snapshot, window);
    if ts.is_empty() {
        debug!("no dates in window {:?}..{}", window.min, window.max);
    }
    Ok(Html(state.renderer.render_page(&ts)?))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.index.current();
    Json(json!({
        "status": "ok",
        "assets": snapshot.asset_count(),
        "dates": snapshot.len(),
    }))
}

/// Loads the data, starts the refresh job and serves until the listener fails.
pub async fn run(config: Config) -> Result<()> {
    let store = Store::connect(&config.database_url).await?;
    store.migrate().await?;

    let index = TimeIndex::default();
    let refresher = Refresher::new(Arc::new(store), index.clone());
    if let Err(e) = refresher.refresh().await {
        error!("initial load failed, serving empty charts until the next refresh: {}", e);
    }
    let _scheduler = refresher.start(config.refresh_interval).await?;

    let renderer = ChartRenderer::new(config.page_template.as_deref())?;
    let app = router(AppState::new(index, renderer));

    let listener = tokio::net::TcpListener::bind(config.bind.as_str()).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

#[test]
pub fn test_parse_shift_defaults_to_zero() {
    let params = |v: &str| HashMap::from([("shift".to_string(), v.to_string())]);
    assert_eq!(parse_shift(&HashMap::new()), 0);
    assert_eq!(parse_shift(&params("-3")), -3);
    assert_eq!(parse_shift(&params("abc")), 0);
    assert_eq!(parse_shift(&params("")), 0);
    assert_eq!(parse_shift(&params("99999999999")), 0);
}
