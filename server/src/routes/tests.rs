//! Router tests. Only paths that never reach the database are exercised;
//! the pool is created lazily and never connects.

use super::create_routes;
use crate::config::Config;
use crate::tables::Tables;
use crate::AppState;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app() -> Router {
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "postgres://localhost/sluice_test".to_string(),
        planners_file: PathBuf::from("planners.json"),
        lookup_timeout: Duration::from_millis(100),
    };
    let tables = Tables::from_json(&json!({
        "tables": {
            "events": {"strategy": "append", "field.last.updated": "received_at"},
            "customers": {"strategy": "upsert", "fields.key": ["id"]}
        }
    }))
    .unwrap();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .unwrap();

    create_routes().with_state(AppState {
        pool,
        config: Arc::new(config),
        tables: Arc::new(tables),
    })
}

async fn send(method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_reports_tables() {
    let (status, body) = send(Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tables"], 2);
}

#[tokio::test]
async fn lists_tables() {
    let (status, body) = send(Method::GET, "/tables", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "customers");
    assert_eq!(body[1]["name"], "events");
}

#[tokio::test]
async fn describes_table() {
    let (status, body) = send(Method::GET, "/tables/customers", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "name": "customers",
            "strategy": "upsert",
            "keyFields": ["id"],
            "mutationTypes": ["insert", "update"]
        })
    );
}

#[tokio::test]
async fn unknown_table_is_not_found() {
    let (status, body) = send(Method::GET, "/tables/orders", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "table 'orders'");

    let (status, _) = send(
        Method::POST,
        "/tables/orders/plan",
        Some(json!({"records": []})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn plans_append_batch() {
    let (status, body) = send(
        Method::POST,
        "/tables/events/plan",
        Some(json!({"records": [{"id": 1, "kind": "click"}, {"id": 2, "kind": "view"}]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["table"], "events");
    assert_eq!(body["strategy"], "append");
    assert!(body.get("rowsAffected").is_none());

    let mutations = body["mutations"].as_array().unwrap();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0]["type"], "insert");
    assert_eq!(mutations[0]["records"][1]["kind"], "view");
    assert!(mutations[0]["records"][0]["received_at"].is_string());

    let fields: Vec<_> = mutations[0]["records"][0]
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    assert_eq!(fields, vec!["id", "kind", "received_at"]);
}

#[tokio::test]
async fn empty_batch_plans_nothing() {
    let (status, body) = send(
        Method::POST,
        "/tables/customers/plan",
        Some(json!({"records": []})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mutations"], json!([]));
}

#[tokio::test]
async fn nested_record_is_bad_request() {
    let (status, body) = send(
        Method::POST,
        "/tables/events/plan",
        Some(json!({"records": [{"id": 1, "tags": ["a"]}]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("record 0"));
}

#[tokio::test]
async fn non_uniform_batch_is_unprocessable() {
    let (status, body) = send(
        Method::POST,
        "/tables/events/plan",
        Some(json!({"records": [{"id": 1}, {"id": "two"}]})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("schema mismatch"));
}
