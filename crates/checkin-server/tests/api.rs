//! End-to-end tests for the HTTP surface.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum_test::TestServer;
use checkin_core::Config;
use checkin_server::api::create_router;
use checkin_server::state::AppState;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

const SELFIE: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRg==";

fn test_server() -> (TestServer, TempDir) {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    (server_with_config_at(&dir, config_path), dir)
}

fn server_with_config_at(dir: &TempDir, config_path: PathBuf) -> TestServer {
    let mut config = Config::default();
    config.system.timezone = "UTC".to_string();
    config.system.data_dir = Some(dir.path().join("data"));

    let state = AppState::new(config, config_path).into_shared();
    TestServer::new(create_router(state)).unwrap()
}

/// QR text for an event that started `started_minutes_ago` minutes ago (UTC).
fn event_code(title: &str, started_minutes_ago: i64, ttl: u32, gps: Option<(f64, f64)>) -> String {
    let start = Utc::now() - Duration::minutes(started_minutes_ago);
    let mut code = json!({
        "type": "event",
        "v": 1,
        "title": title,
        "date": start.format("%Y-%m-%d").to_string(),
        "time": start.format("%H:%M").to_string(),
        "location": "Main hall",
        "points": "3",
        "expireAfterMinutes": ttl,
    });
    if let Some((lat, lng)) = gps {
        code["gps"] = json!({ "lat": lat, "lng": lng });
    }
    code.to_string()
}

fn encode_key(key: &str) -> String {
    key.replace('%', "%25").replace(' ', "%20").replace('|', "%7C")
}

#[tokio::test]
async fn health_reports_timezone() {
    let (server, _dir) = test_server();

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["timezone"], "UTC");
    assert_eq!(body["checkins"], 0);
}

#[tokio::test]
async fn health_is_degraded_when_log_is_unreadable() {
    let (server, dir) = test_server();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("checkin_history.json"), "{ not json").unwrap();

    let response = server.get("/health").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = response.json();
    assert_eq!(body["status"], "degraded");
    assert!(body.get("checkins").is_none());
    assert!(body["problem"].as_str().unwrap().contains("checkin_history.json"));
}

#[tokio::test]
async fn check_in_is_recorded_once() {
    let (server, _dir) = test_server();
    let code = event_code("Volunteer day", 5, 60, Some((21.0, 105.0)));
    let request = json!({
        "payload": code,
        "position": { "lat": 21.0001, "lng": 105.0001, "accuracyMeters": 10.0 },
        "selfieImage": SELFIE,
    });

    let created = server.post("/api/checkins").json(&request).await;
    created.assert_status(StatusCode::CREATED);
    let record: Value = created.json();
    assert_eq!(record["payload"]["title"], "Volunteer day");
    assert_eq!(record["selfieImage"], SELFIE);
    assert!(record["distanceMeters"].as_f64().unwrap() < 100.0);

    let again = server.post("/api/checkins").json(&request).await;
    again.assert_status(StatusCode::CONFLICT);
    let error: Value = again.json();
    assert_eq!(error["error"], "duplicate_checkin");
    assert_eq!(error["details"]["compositeKey"], record["compositeKey"]);

    let history: Value = server.get("/api/checkins").await.json();
    assert_eq!(history["total"], 1);
    assert_eq!(history["totalPoints"], 3);
}

#[tokio::test]
async fn verify_does_not_record() {
    let (server, _dir) = test_server();
    let code = event_code("Career fair", 10, 30, None);

    let response = server
        .post("/api/checkins/verify")
        .json(&json!({ "payload": code }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["alreadyCheckedIn"], false);
    assert_eq!(body["verdict"]["eligible"], true);
    assert_eq!(body["verdict"]["geofenceRequired"], false);

    let history: Value = server.get("/api/checkins").await.json();
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn verify_flags_existing_check_in() {
    let (server, _dir) = test_server();
    let code = event_code("Blood drive", 1, 60, None);

    server
        .post("/api/checkins")
        .json(&json!({ "payload": code, "selfieImage": SELFIE }))
        .await
        .assert_status(StatusCode::CREATED);

    let body: Value = server
        .post("/api/checkins/verify")
        .json(&json!({ "payload": code }))
        .await
        .json();
    assert_eq!(body["alreadyCheckedIn"], true);
}

#[tokio::test]
async fn malformed_code_is_bad_request() {
    let (server, _dir) = test_server();

    let response = server
        .post("/api/checkins")
        .json(&json!({ "payload": "https://example.com/not-a-checkin", "selfieImage": SELFIE }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_code_is_forbidden() {
    let (server, _dir) = test_server();
    let code = event_code("Morning run", 180, 60, None);

    let response = server
        .post("/api/checkins")
        .json(&json!({ "payload": code, "selfieImage": SELFIE }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let error: Value = response.json();
    assert_eq!(error["error"], "time_window_closed");
    assert_eq!(error["details"]["retryable"], false);
}

#[tokio::test]
async fn outside_geofence_is_forbidden() {
    let (server, _dir) = test_server();
    let code = event_code("Campus cleanup", 5, 60, Some((21.0, 105.0)));

    let response = server
        .post("/api/checkins")
        .json(&json!({
            "payload": code,
            "position": { "lat": 21.1, "lng": 105.0, "accuracyMeters": 5.0 },
            "selfieImage": SELFIE,
        }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let error: Value = response.json();
    assert_eq!(error["error"], "outside_geofence");
    assert_eq!(error["details"]["retryable"], true);
}

#[tokio::test]
async fn missing_selfie_is_unavailable() {
    let (server, _dir) = test_server();
    let code = event_code("Library tour", 5, 60, Some((21.0, 105.0)));

    let response = server
        .post("/api/checkins")
        .json(&json!({
            "payload": code,
            "position": { "lat": 21.0, "lng": 105.0, "accuracyMeters": 5.0 },
        }))
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let history: Value = server.get("/api/checkins").await.json();
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn fenced_event_without_position_is_unavailable() {
    let (server, _dir) = test_server();
    let code = event_code("Seminar", 5, 60, Some((21.0, 105.0)));

    let response = server
        .post("/api/checkins")
        .json(&json!({ "payload": code, "selfieImage": SELFIE }))
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn get_check_in_by_key() {
    let (server, _dir) = test_server();
    let code = event_code("Open day", 2, 60, None);

    let record: Value = server
        .post("/api/checkins")
        .json(&json!({ "payload": code, "selfieImage": SELFIE }))
        .await
        .json();
    let key = record["compositeKey"].as_str().unwrap();
    assert!(key.starts_with("Open day|"));

    let found = server.get(&format!("/api/checkins/{}", encode_key(key))).await;
    found.assert_status_ok();
    let found: Value = found.json();
    assert_eq!(found["id"], record["id"]);

    let missing = server
        .get(&format!("/api/checkins/{}", encode_key("Nope|2025-01-01|09:00")))
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);
    let error: Value = missing.json();
    assert_eq!(error["error"], "checkin_not_found");
}

#[tokio::test]
async fn geofence_update_applies_and_persists() {
    let (server, dir) = test_server();

    let response = server
        .put("/api/config/geofence")
        .json(&json!({ "minRadiusMeters": 250.0 }))
        .await;
    response.assert_status_ok();

    let config: Value = server.get("/api/config").await.json();
    assert_eq!(config["geofence"]["minRadiusMeters"], 250.0);
    assert_eq!(config["geofence"]["accuracyMultiplier"], 2.0);

    let saved = Config::load(dir.path().join("config.toml")).unwrap();
    assert!((saved.geofence.min_radius_meters - 250.0).abs() < f64::EPSILON);

    // ~111 m away: outside the default 100 m fence, inside the new 250 m one.
    let code = event_code("Workshop", 5, 60, Some((21.0, 105.0)));
    server
        .post("/api/checkins")
        .json(&json!({
            "payload": code,
            "position": { "lat": 21.001, "lng": 105.0, "accuracyMeters": 5.0 },
            "selfieImage": SELFIE,
        }))
        .await
        .assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn failed_geofence_save_changes_nothing() {
    let dir = TempDir::new().unwrap();
    // A regular file where the config directory should be.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    let server = server_with_config_at(&dir, blocker.join("config.toml"));

    let response = server
        .put("/api/config/geofence")
        .json(&json!({ "minRadiusMeters": 250.0 }))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let error: Value = response.json();
    assert_eq!(error["error"], "config_error");

    let config: Value = server.get("/api/config").await.json();
    assert_eq!(config["geofence"]["minRadiusMeters"], 100.0);

    // ~111 m away: still refused by the 100 m fence.
    let code = event_code("Workshop", 5, 60, Some((21.0, 105.0)));
    server
        .post("/api/checkins")
        .json(&json!({
            "payload": code,
            "position": { "lat": 21.001, "lng": 105.0, "accuracyMeters": 5.0 },
            "selfieImage": SELFIE,
        }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn geofence_update_rejects_invalid_values() {
    let (server, _dir) = test_server();

    server
        .put("/api/config/geofence")
        .json(&json!({ "minRadiusMeters": 0.0 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .put("/api/config/geofence")
        .json(&json!({ "minRadiusMeters": 50.0, "accuracyMultiplier": 0.5 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (server, _dir) = test_server();

    let response = server.get("/api/openapi.json").await;
    response.assert_status_ok();
    let doc: Value = response.json();
    assert_eq!(doc["info"]["title"], "checkin API");
}

#[tokio::test]
async fn verify_accepts_integral_float_fields() {
    let (server, _dir) = test_server();
    let start = Utc::now() - Duration::minutes(5);
    let code = json!({
        "type": "event",
        "v": 1.0,
        "title": "Float fields",
        "date": start.format("%Y-%m-%d").to_string(),
        "time": start.format("%H:%M").to_string(),
        "location": "Main hall",
        "expireAfterMinutes": 60.0,
    })
    .to_string();

    let body: Value = server
        .post("/api/checkins/verify")
        .json(&json!({ "payload": code }))
        .await
        .json();
    assert_eq!(body["verdict"]["eligible"], true);
    assert_eq!(body["payload"]["expireAfterMinutes"], 60);
}
