//!
//! filedrop HTTP server
//! --------------------
//! Axum binding of the session orchestrator. Handlers only translate between
//! wire shapes and orchestrator calls; every rule about liveness and ordering
//! lives in `session`.
//!
//! Routes:
//! - `GET  /ping`                    health probe
//! - `POST /session`                 create a session
//! - `DELETE /session/{key}`         tear a session down with its files
//! - `POST /session/{key}`           upload one file (multipart field `file`)
//! - `GET  /session/{key}`           list the session's files
//! - `GET  /session/{key}/{name}`    download one file

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::{KeyStrength, ServiceConfig};
use crate::error::TransferError;
use crate::keygen::{AlphanumericKeyGenerator, KeyGenerator, SecureKeyGenerator};
use crate::registry::{HttpSessionRegistry, MemorySessionRegistry, SessionRegistry};
use crate::session::SessionOrchestrator;
use crate::store::{ByteStream, LocalObjectStore};

/// Shared state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SessionOrchestrator,
}

/// Wire everything the config asks for. Also returns the in-memory registry when
/// that backend was selected, so the caller can run its sweeper.
pub fn build_orchestrator(cfg: &ServiceConfig) -> anyhow::Result<(SessionOrchestrator, Option<MemorySessionRegistry>)> {
    let store = LocalObjectStore::new(&cfg.storage_root, cfg.store_timeout())
        .with_context(|| format!("While creating object store under: {}", cfg.storage_root))?;

    let (registry, memory): (Arc<dyn SessionRegistry>, Option<MemorySessionRegistry>) = match cfg.registry_url.as_deref() {
        Some(url) => {
            let reg = HttpSessionRegistry::new(url, cfg.registry_timeout())
                .with_context(|| format!("While creating registry client for: {}", url))?;
            (Arc::new(reg), None)
        }
        None => {
            let reg = MemorySessionRegistry::new();
            (Arc::new(reg.clone()), Some(reg))
        }
    };

    let keygen: Arc<dyn KeyGenerator> = match cfg.key_strength {
        KeyStrength::Short => Arc::new(AlphanumericKeyGenerator::new(cfg.key_length)),
        KeyStrength::Secure => Arc::new(SecureKeyGenerator::default()),
    };

    let orch = SessionOrchestrator::new(registry, Arc::new(store), keygen).with_ttl(cfg.session_ttl());
    Ok((orch, memory))
}

pub fn router(orchestrator: SessionOrchestrator) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/session", post(create_session))
        .route(
            "/session/{key}",
            post(upload_file)
                .layer(DefaultBodyLimit::disable())
                .get(list_files)
                .delete(delete_session),
        )
        .route("/session/{key}/{name}", get(download_file))
        .with_state(AppState { orchestrator })
}

/// Serve on an already-bound listener.
pub async fn serve(listener: tokio::net::TcpListener, orchestrator: SessionOrchestrator) -> anyhow::Result<()> {
    axum::serve(listener, router(orchestrator)).await?;
    Ok(())
}

fn spawn_registry_sweeper(registry: MemorySessionRegistry, interval_secs: u64) {
    if interval_secs == 0 {
        info!(target: "startup", "in-memory registry sweeper disabled");
        return;
    }
    tokio::spawn(async move {
        use std::time::Duration;
        loop {
            tokio::time::sleep(Duration::from_secs(interval_secs)).await;
            let removed = registry.sweep();
            if removed > 0 { tracing::debug!(removed = removed, "registry_sweep"); }
        }
    });
}

/// Start the HTTP server with the given configuration.
pub async fn run_with_config(cfg: ServiceConfig) -> anyhow::Result<()> {
    let (orch, memory) = build_orchestrator(&cfg)?;
    info!(
        target: "startup",
        "backends: registry={}, store={}, session_ttl_secs={}, key_strength={:?}",
        orch.registry_backend(), orch.store_backend(), cfg.session_ttl_secs, cfg.key_strength
    );
    if let Some(reg) = memory {
        warn!(target: "startup", "no registry URL configured; sessions are kept in-process and lost on restart");
        spawn_registry_sweeper(reg, cfg.sweep_interval_secs);
    }

    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, orch).await
}

fn error_response(err: &TransferError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!("request failed: {err}");
    }
    (status, Json(err.body())).into_response()
}

fn bad_request(code: &str, message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"status":"error","code": code,"message": message}))).into_response()
}

async fn ping() -> impl IntoResponse {
    Json(json!({"message": "pong"}))
}

async fn create_session(State(state): State<AppState>) -> Response {
    match state.orchestrator.create_session().await {
        Ok(s) => (StatusCode::CREATED, Json(json!({"key": s.key, "expire": s.expire}))).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn delete_session(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match state.orchestrator.delete_session(&key).await {
        Ok(d) => (StatusCode::OK, Json(json!({"msg": "deleted", "key": d.key}))).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn upload_file(State(state): State<AppState>, Path(key): Path<String>, mut multipart: Multipart) -> Response {
    // Skip any form fields ahead of `file`
    let field = loop {
        match multipart.next_field().await {
            Ok(Some(f)) if f.name() == Some("file") => break f,
            Ok(Some(_)) => continue,
            Ok(None) => return bad_request("missing_file", "multipart field 'file' is required".into()),
            Err(e) => return bad_request("bad_multipart", e.to_string()),
        }
    };
    let Some(name) = field.file_name().map(|s| s.to_string()) else {
        return bad_request("missing_file_name", "the 'file' field must carry a filename".into());
    };
    let content: ByteStream<'_> = Box::pin(field.map(|chunk| chunk.map_err(std::io::Error::other)));
    match state.orchestrator.upload_file(&key, &name, content).await {
        Ok(meta) => (
            StatusCode::CREATED,
            Json(json!({"msg": format!("'{}' uploaded!", meta.name), "file": meta})),
        ).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn list_files(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match state.orchestrator.list_files(&key).await {
        Ok(files) => (StatusCode::OK, Json(json!({"files": files}))).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn download_file(State(state): State<AppState>, Path((key, name)): Path<(String, String)>) -> Response {
    let content = match state.orchestrator.download_file(&key, &name).await {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    let mut resp = Response::new(Body::from_stream(content.body));
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content.meta.size));
    if let Ok(v) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", content.meta.name.replace('"', ""))) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }
    resp
}
