use std::collections::HashMap;

use apr_charts::external::BinanceEarn;
use apr_charts::{parse_time, AprError};
use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

async fn product_list(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let asset = params.get("asset").cloned().unwrap_or_default();
    assert_eq!(params.get("type").map(String::as_str), Some("Flexible"));
    let body = match asset.as_str() {
        "USDT" => json!({
            "success": true,
            "data": { "savingFlexibleProduct": [
                { "asset": "USDT", "apy": "0.04000000", "marketApr": "0.04000000" }
            ]}
        }),
        "DAI" => json!({
            "success": true,
            "data": { "savingFlexibleProduct": [
                { "asset": "DAI", "apy": "0.06500000", "marketApr": "0.05000000" }
            ]}
        }),
        "EMPTY" => json!({ "success": true, "data": { "savingFlexibleProduct": [] } }),
        _ => json!({ "success": false, "message": "unknown asset" }),
    };
    Json(body)
}

async fn spawn_mock() -> String {
    let app = Router::new().route("/list", get(product_list));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/list", addr)
}

#[tokio::test]
async fn test_fetch_sorts_by_apy_and_computes_bonus() {
    let client = BinanceEarn::with_url(spawn_mock().await);
    let time = parse_time("2024-06-01 12:00:00").unwrap();
    let quotes = client
        .fetch(&["USDT".to_string(), "DAI".to_string()], time)
        .await
        .unwrap();
    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes[0].asset, "DAI");
    assert_eq!(quotes[0].bonus, 0.015);
    assert_eq!(quotes[1].asset, "USDT");
    assert_eq!(quotes[1].bonus, 0.0);
    assert!(quotes.iter().all(|q| q.time == time));
}

#[tokio::test]
async fn test_unsuccessful_response_is_an_error() {
    let client = BinanceEarn::with_url(spawn_mock().await);
    let err = client.flexible_product("XYZ").await.unwrap_err();
    match err {
        AprError::RemoteApi { asset, reason } => {
            assert_eq!(asset, "XYZ");
            assert_eq!(reason, "unknown asset");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn test_missing_product_is_an_error() {
    let client = BinanceEarn::with_url(spawn_mock().await);
    assert!(client.flexible_product("EMPTY").await.is_err());
}
