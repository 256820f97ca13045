//!
//! Session orchestrator
//! --------------------
//! The only component with business rules. Every storage operation first asks the
//! registry whether the session key is live; the registry, not this process, owns
//! liveness and expiry, so nothing here caches session state between calls.
//!
//! Liveness is fail-closed: if the registry cannot answer, the session is treated
//! as absent and storage is not touched.
//!
//! Deleting a session is a two-step, best-effort sequence with no shared commit
//! between registry and store:
//! 1. invalidate the registry record,
//! 2. delete the storage group.
//!
//! Step 1 runs first so a failure can only leave orphaned storage under a dead
//! key (the same state passive expiry produces) and never a live key without its
//! files. A failure in step 2 is reported as `PartialCleanupFailure` and is not
//! retried here.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, TransferError, TransferResult};
use crate::keygen::KeyGenerator;
use crate::registry::{SessionRecord, SessionRegistry};
use crate::store::{validate_group_name, validate_object_name, ByteStream, ObjectContent, ObjectMeta, ObjectStore};

/// Default session lifetime.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Liveness as observed at the time of the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Live,
    Absent,
}

/// A freshly created session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Session {
    pub key: String,
    pub expire: DateTime<Utc>,
}

/// Confirmation of a completed session teardown.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Deleted {
    pub key: String,
}

/// What a successful upload reports back: the store's view of the object.
pub type UploadRecord = ObjectMeta;

#[derive(Clone)]
pub struct SessionOrchestrator {
    registry: Arc<dyn SessionRegistry>,
    store: Arc<dyn ObjectStore>,
    keygen: Arc<dyn KeyGenerator>,
    ttl: Duration,
}

impl SessionOrchestrator {
    pub fn new(registry: Arc<dyn SessionRegistry>, store: Arc<dyn ObjectStore>, keygen: Arc<dyn KeyGenerator>) -> Self {
        Self { registry, store, keygen, ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS) }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn registry_backend(&self) -> &'static str { self.registry.backend_name() }

    pub fn store_backend(&self) -> &'static str { self.store.backend_name() }

    /// Mint a new key and record it with `expire = now + ttl`.
    /// Nothing touches storage here, so a failed registry write needs no rollback.
    pub async fn create_session(&self) -> TransferResult<Session> {
        let key = self.keygen.generate().map_err(|e| TransferError::KeyGeneration(e.to_string()))?;
        let expire = Utc::now() + self.ttl;
        let record = SessionRecord::new(key.clone(), expire);
        self.registry
            .put(&record)
            .await
            .map_err(|cause| TransferError::RegistryUnavailable { cause })?;
        info!(target: "session", key = %key, expire = %expire, "session created");
        Ok(Session { key, expire })
    }

    /// Any registry failure counts as `Absent`.
    pub async fn validate_session(&self, key: &str) -> SessionState {
        if validate_group_name(key).is_err() {
            debug!(target: "session", key = %key, "malformed session key");
            return SessionState::Absent;
        }
        match self.registry.exists(key).await {
            Ok(true) => SessionState::Live,
            Ok(false) => SessionState::Absent,
            Err(e) => {
                warn!(target: "session", key = %key, error = %e, "registry check failed; treating session as absent");
                SessionState::Absent
            }
        }
    }

    async fn require_live(&self, key: &str) -> TransferResult<()> {
        match self.validate_session(key).await {
            SessionState::Live => Ok(()),
            SessionState::Absent => Err(TransferError::SessionInvalid { key: key.to_string() }),
        }
    }

    /// Store `content` as `name` in the session's group (create or replace).
    pub async fn upload_file(&self, key: &str, name: &str, content: ByteStream<'_>) -> TransferResult<UploadRecord> {
        self.require_live(key).await?;
        validate_object_name(name).map_err(|e| TransferError::InvalidFileName(e.to_string()))?;
        let meta = match self.store.put(key, name, content).await {
            Ok(meta) => meta,
            Err(StoreError::ContentStream(e)) => {
                warn!(target: "session", key = %key, name = %name, error = %e, "upload stream broke off; nothing stored");
                return Err(TransferError::UploadAborted(e.to_string()));
            }
            Err(e) => return Err(store_failure(e)),
        };
        info!(target: "session", key = %key, name = %meta.name, size = meta.size, "file uploaded");
        Ok(meta)
    }

    /// Full enumeration of the session's group. Order is backend-defined.
    pub async fn list_files(&self, key: &str) -> TransferResult<Vec<ObjectMeta>> {
        self.require_live(key).await?;
        self.store.list(key).await.map_err(store_failure)
    }

    pub async fn download_file(&self, key: &str, name: &str) -> TransferResult<ObjectContent> {
        self.require_live(key).await?;
        validate_object_name(name).map_err(|e| TransferError::InvalidFileName(e.to_string()))?;
        match self.store.get(key, name).await {
            Ok(content) => Ok(content),
            Err(StoreError::NotFound { .. }) => Err(TransferError::FileNotFound { key: key.to_string(), name: name.to_string() }),
            Err(e) => Err(store_failure(e)),
        }
    }

    /// Tear down a live session: registry first, then storage.
    ///
    /// An already-gone session is rejected with `SessionInvalid` rather than
    /// treated as a successful no-op.
    pub async fn delete_session(&self, key: &str) -> TransferResult<Deleted> {
        self.require_live(key).await?;

        self.registry
            .delete(key)
            .await
            .map_err(|cause| TransferError::RegistryUnavailable { cause })?;
        debug!(target: "session", key = %key, "registry record invalidated");

        // Run cleanup on its own task so a caller that goes away after step 1
        // does not abandon step 2 halfway.
        let store = Arc::clone(&self.store);
        let group = key.to_string();
        let cleanup = tokio::spawn(async move { store.delete_group(&group).await });
        let outcome = match cleanup.await {
            Ok(res) => res,
            Err(join_err) => Err(StoreError::Backend(format!("cleanup task failed: {join_err}"))),
        };
        if let Err(cause) = outcome {
            error!(target: "session", key = %key, error = %cause, "session invalidated but storage group was not removed; orphaned group needs reconciliation");
            return Err(TransferError::PartialCleanupFailure { key: key.to_string(), cause });
        }
        info!(target: "session", key = %key, "session deleted");
        Ok(Deleted { key: key.to_string() })
    }
}

fn store_failure(err: StoreError) -> TransferError {
    match err {
        StoreError::InvalidName(msg) => TransferError::InvalidFileName(msg),
        StoreError::ContentStream(e) => TransferError::UploadAborted(e.to_string()),
        cause => TransferError::StoreUnavailable { cause },
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
