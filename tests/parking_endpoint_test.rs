use axum::http::StatusCode;
use miparqueo::api::{self, AppState};
use miparqueo::config::{Config, DbConfig, EmbeddedConfig, Environment};
use miparqueo::InitGate;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    gate: InitGate,
    _temp: TempDir,
}

fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let database = DbConfig::Embedded(EmbeddedConfig { path: db_path });
    let config = Config {
        port: 0,
        environment: Environment::Development,
        database: database.clone(),
        init_timeout: Duration::from_secs(5),
        static_dir: temp_dir.path().to_string_lossy().to_string(),
    };
    let gate = InitGate::new(Arc::new(database), config.init_timeout);
    let app = api::create_router(AppState::new(gate.clone(), config));

    TestApp {
        app,
        gate,
        _temp: temp_dir,
    }
}

async fn request(app: axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn centro() -> Value {
    json!({
        "name": "Centro",
        "location": "Calle 50",
        "totalSpaces": 150,
        "pricePerHour": 5000
    })
}

#[tokio::test]
async fn test_first_data_request_initializes_database() {
    let t = setup_test_app();
    assert!(!t.gate.is_ready());

    let (status, body) = request(t.app.clone(), "GET", "/api/parking", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    assert!(t.gate.is_ready());
    assert_eq!(t.gate.attempts(), 1);
}

#[tokio::test]
async fn test_create_then_list_and_get() {
    let t = setup_test_app();

    let (status, body) = request(t.app.clone(), "POST", "/api/parking", Some(centro())).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().expect("id should be returned");
    assert!(id >= 1);

    let (status, body) = request(t.app.clone(), "GET", "/api/parking", None).await;
    assert_eq!(status, StatusCode::OK);
    let lots = body.as_array().unwrap();
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0]["name"], "Centro");
    assert_eq!(lots[0]["available_spaces"], 150);

    let (status, body) = request(t.app.clone(), "GET", &format!("/api/parking/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert_eq!(body["location"], "Calle 50");
    assert_eq!(body["price_per_hour"], 5000.0);
}

#[tokio::test]
async fn test_update_and_delete() {
    let t = setup_test_app();
    let (_, body) = request(t.app.clone(), "POST", "/api/parking", Some(centro())).await;
    let id = body["id"].as_i64().unwrap();

    let update = json!({
        "name": "Centro",
        "location": "Calle 50 #15-20",
        "totalSpaces": 150,
        "availableSpaces": 120,
        "pricePerHour": 5500.5
    });
    let (status, _) = request(
        t.app.clone(),
        "PUT",
        &format!("/api/parking/{}", id),
        Some(update),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(t.app.clone(), "GET", &format!("/api/parking/{}", id), None).await;
    assert_eq!(body["available_spaces"], 120);
    assert_eq!(body["price_per_hour"], 5500.5);

    let (status, _) = request(t.app.clone(), "DELETE", &format!("/api/parking/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(t.app.clone(), "GET", &format!("/api/parking/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_lot_is_not_found() {
    let t = setup_test_app();

    let (status, body) = request(t.app.clone(), "GET", "/api/parking/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("999"));

    let (status, _) = request(t.app.clone(), "DELETE", "/api/parking/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_body_is_bad_request() {
    let t = setup_test_app();
    let body = json!({
        "name": "",
        "location": "Calle 50",
        "totalSpaces": 10,
        "pricePerHour": 1000
    });

    let (status, body) = request(t.app.clone(), "POST", "/api/parking", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("required"));
}

#[tokio::test]
async fn test_out_of_range_numbers_are_bad_request() {
    let t = setup_test_app();

    let mut too_many = centro();
    too_many["totalSpaces"] = json!(i64::from(i32::MAX) + 1);
    let (status, body) = request(t.app.clone(), "POST", "/api/parking", Some(too_many)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("totalSpaces"));

    let mut too_pricey = centro();
    too_pricey["pricePerHour"] = json!(1e9);
    let (status, body) = request(t.app.clone(), "POST", "/api/parking", Some(too_pricey)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("pricePerHour"));

    let (_, created) = request(t.app.clone(), "POST", "/api/parking", Some(centro())).await;
    let id = created["id"].as_i64().unwrap();
    let update = json!({
        "name": "Centro",
        "location": "Calle 50",
        "totalSpaces": 150,
        "availableSpaces": -1,
        "pricePerHour": 5000
    });
    let (status, body) = request(
        t.app.clone(),
        "PUT",
        &format!("/api/parking/{}", id),
        Some(update),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("availableSpaces"));
}

#[tokio::test]
async fn test_malformed_id_and_body_are_json_bad_request() {
    let t = setup_test_app();

    let (status, body) = request(t.app.clone(), "GET", "/api/parking/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = request(t.app.clone(), "DELETE", "/api/parking/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = request(
        t.app.clone(),
        "POST",
        "/api/parking",
        Some(json!({"name": "Centro"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_concurrent_first_requests_initialize_once() {
    let t = setup_test_app();

    let responses = futures::future::join_all(
        (0..10).map(|_| request(t.app.clone(), "GET", "/api/parking", None)),
    )
    .await;

    assert!(responses
        .iter()
        .all(|(status, _)| *status == StatusCode::OK));
    assert_eq!(t.gate.attempts(), 1);
}
