use std::sync::Arc;

use apr_charts::chart::ChartRenderer;
use apr_charts::refresh::Refresher;
use apr_charts::server::{router, AppState};
use apr_charts::store::Store;
use apr_charts::{format_time, from_unix, Observation, TimeIndex};
use chrono::{DateTime, TimeDelta, Utc};

struct Fixture {
    base: String,
    recent: DateTime<Utc>,
    yesterday: DateTime<Utc>,
    last_week: DateTime<Utc>,
    index: TimeIndex,
    refresher: Refresher,
    store: Store,
}

async fn spawn_app() -> Fixture {
    let now = from_unix(Utc::now().timestamp()).unwrap();
    let recent = now - TimeDelta::hours(2);
    let yesterday = now - TimeDelta::hours(30);
    let last_week = now - TimeDelta::days(10);

    let store = Store::in_memory().await.unwrap();
    store.migrate().await.unwrap();
    store
        .insert_batch(&[
            Observation::new(recent, "USDT", 0.051, 0.0),
            Observation::new(yesterday, "USDT", 0.049, 0.0),
            Observation::new(yesterday, "DAI", 0.032, 0.0),
            Observation::new(last_week, "BUSD", 0.041, 0.01),
        ])
        .await
        .unwrap();

    let index = TimeIndex::default();
    let refresher = Refresher::new(Arc::new(store.clone()), index.clone());
    refresher.refresh().await.unwrap();

    let app = router(AppState::new(index.clone(), ChartRenderer::new(None).unwrap()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Fixture {
        base: format!("http://{}", addr),
        recent,
        yesterday,
        last_week,
        index,
        refresher,
        store,
    }
}

async fn get(url: String) -> (u16, String) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn test_day_page_shows_only_last_day() {
    let app = spawn_app().await;
    let (status, body) = get(format!("{}/day", app.base)).await;
    assert_eq!(status, 200);
    assert!(body.contains(&format_time(&app.recent)));
    assert!(!body.contains(&format_time(&app.yesterday)));
    assert!(body.contains("/day?shift=-1"));
}

#[tokio::test]
async fn test_shift_moves_window_back() {
    let app = spawn_app().await;
    let (_, body) = get(format!("{}/day?shift=-1", app.base)).await;
    assert!(body.contains(&format_time(&app.yesterday)));
    assert!(!body.contains(&format_time(&app.recent)));
    assert!(body.contains("/day?shift=-2"));
    assert!(body.contains("/day?shift=0"));
}

#[tokio::test]
async fn test_malformed_shift_is_current_window() {
    let app = spawn_app().await;
    let (status, body) = get(format!("{}/day?shift=yesterday", app.base)).await;
    assert_eq!(status, 200);
    assert!(body.contains(&format_time(&app.recent)));
}

#[tokio::test]
async fn test_root_is_week_and_all_has_everything() {
    let app = spawn_app().await;
    let (_, week) = get(format!("{}/", app.base)).await;
    assert!(week.contains(&format_time(&app.yesterday)));
    assert!(!week.contains(&format_time(&app.last_week)));

    let (_, all) = get(format!("{}/all", app.base)).await;
    for t in [app.recent, app.yesterday, app.last_week] {
        assert!(all.contains(&format_time(&t)));
    }
    assert!(!all.contains("shift="));
}

#[tokio::test]
async fn test_window_without_data_renders_empty_chart() {
    let app = spawn_app().await;
    let (status, body) = get(format!("{}/year?shift=-5", app.base)).await;
    assert_eq!(status, 200);
    assert!(body.contains("No observations between"));
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let app = spawn_app().await;
    let (status, _) = get(format!("{}/decade", app.base)).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_health_reports_snapshot_and_follows_refresh() {
    let app = spawn_app().await;
    let (_, body) = get(format!("{}/health", app.base)).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["assets"], 3);
    assert_eq!(json["dates"], 3);

    let later = app.recent + TimeDelta::minutes(30);
    app.store
        .insert_batch(&[Observation::new(later, "FDUSD", 0.06, 0.0)])
        .await
        .unwrap();
    app.refresher.refresh().await.unwrap();
    assert_eq!(app.index.current().len(), 4);
    let (_, body) = get(format!("{}/health", app.base)).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["assets"], 4);
}
