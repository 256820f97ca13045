//!
//! Session registry clients
//! ------------------------
//! The registry is the source of truth for session liveness. Each record is an
//! opaque key, an unused value slot and an absolute expiry; the backend enforces
//! the TTL. Backends must report transport failures as errors and keep them
//! separate from "record absent" so the orchestrator can apply its fail-closed
//! policy uniformly.
//!
//! Two backends ship here:
//! - `HttpSessionRegistry` talks to the remote cache service over HTTP.
//! - `MemorySessionRegistry` keeps records in-process (single-node and tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

mod http;
mod memory;

pub use http::HttpSessionRegistry;
pub use memory::MemorySessionRegistry;

/// A session record as stored by the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub key: String,
    /// Reserved for future metadata; always written empty today.
    #[serde(default)]
    pub value: String,
    pub expire: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(key: impl Into<String>, expire: DateTime<Utc>) -> Self {
        Self { key: key.into(), value: String::new(), expire }
    }
}

#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Write (or overwrite) a record. Only `Ok` confirms the write.
    async fn put(&self, record: &SessionRecord) -> Result<(), RegistryError>;

    /// `Ok(false)` means confirmed absent or expired.
    async fn exists(&self, key: &str) -> Result<bool, RegistryError>;

    /// Remove a record. Removing an absent record succeeds.
    async fn delete(&self, key: &str) -> Result<(), RegistryError>;

    fn backend_name(&self) -> &'static str;
}
