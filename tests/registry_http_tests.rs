use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use filedrop::error::RegistryError;
use filedrop::registry::{HttpSessionRegistry, SessionRecord, SessionRegistry};

type Records = Arc<Mutex<HashMap<String, SessionRecord>>>;

async fn put_record(State(records): State<Records>, Json(rec): Json<SessionRecord>) -> StatusCode {
    records.lock().insert(rec.key.clone(), rec);
    StatusCode::CREATED
}

async fn get_record(State(records): State<Records>, Path(key): Path<String>) -> Result<Json<SessionRecord>, StatusCode> {
    match records.lock().get(&key) {
        Some(rec) if rec.expire > Utc::now() => Ok(Json(rec.clone())),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn delete_record(State(records): State<Records>, Path(key): Path<String>) -> StatusCode {
    match records.lock().remove(&key) {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    }
}

async fn broken() -> StatusCode { StatusCode::INTERNAL_SERVER_ERROR }

async fn slow() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(5)).await;
    StatusCode::OK
}

// Mock cache service: a healthy namespace under /cache-service, a failing one
// under /broken and one that never answers in time under /slow.
async fn start_cache_mock() -> (JoinHandle<()>, String, Records) {
    let records: Records = Arc::new(Mutex::new(HashMap::new()));
    let app = Router::new()
        .route("/cache-service/string", post(put_record))
        .route("/cache-service/string/{key}", get(get_record).delete(delete_record))
        .route("/broken/string", post(broken))
        .route("/broken/string/{key}", get(broken).delete(broken))
        .route("/slow/string/{key}", get(slow))
        .with_state(records.clone());
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("cache mock task error: {e:?}");
        }
    });
    (handle, format!("http://{}", addr), records)
}

fn client(base: &str, path: &str) -> HttpSessionRegistry {
    HttpSessionRegistry::new(&format!("{}/{}", base, path), Duration::from_millis(500)).expect("registry client")
}

#[tokio::test]
async fn put_exists_delete_round() {
    let (handle, base, records) = start_cache_mock().await;
    let reg = client(&base, "cache-service");

    let rec = SessionRecord::new("ab3F9k", Utc::now() + chrono::Duration::hours(24));
    reg.put(&rec).await.expect("put");
    assert_eq!(records.lock().get("ab3F9k").map(|r| r.value.clone()), Some(String::new()));
    assert!(reg.exists("ab3F9k").await.unwrap());
    assert!(!reg.exists("zzzzzz").await.unwrap());

    reg.delete("ab3F9k").await.expect("delete");
    assert!(!reg.exists("ab3F9k").await.unwrap());
    // Second delete sees 404 and still succeeds
    reg.delete("ab3F9k").await.expect("delete again");

    handle.abort();
}

#[tokio::test]
async fn expired_record_reads_as_absent() {
    let (handle, base, _records) = start_cache_mock().await;
    let reg = client(&base, "cache-service");
    let rec = SessionRecord::new("oldkey", Utc::now() - chrono::Duration::seconds(1));
    reg.put(&rec).await.unwrap();
    assert!(!reg.exists("oldkey").await.unwrap());
    handle.abort();
}

#[tokio::test]
async fn server_errors_surface_as_status() {
    let (handle, base, _records) = start_cache_mock().await;
    let reg = client(&base, "broken");
    let rec = SessionRecord::new("ab3F9k", Utc::now() + chrono::Duration::hours(1));
    assert!(matches!(reg.put(&rec).await, Err(RegistryError::Status { code: 500 })));
    assert!(matches!(reg.exists("ab3F9k").await, Err(RegistryError::Status { code: 500 })));
    assert!(matches!(reg.delete("ab3F9k").await, Err(RegistryError::Status { code: 500 })));
    handle.abort();
}

#[tokio::test]
async fn slow_registry_times_out() {
    let (handle, base, _records) = start_cache_mock().await;
    let reg = client(&base, "slow");
    match reg.exists("ab3F9k").await {
        Err(RegistryError::Timeout(ms)) => assert_eq!(ms, 500),
        other => panic!("expected timeout, got {other:?}"),
    }
    handle.abort();
}

#[tokio::test]
async fn unreachable_registry_is_transport_error() {
    // Bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let reg = client(&format!("http://127.0.0.1:{}", port), "cache-service");
    assert!(matches!(reg.exists("ab3F9k").await, Err(RegistryError::Transport(_))));
}
