//!
//! Object store clients
//! --------------------
//! Durable storage of named objects grouped under a session key. The contract the
//! orchestrator relies on:
//! - `put` provisions the group on first write and has create-or-replace semantics;
//!   an object is either fully stored or not visible at all.
//! - `list` re-enumerates the whole group on every call; order is whatever the
//!   backend yields and callers must not depend on it.
//! - `delete_group` succeeds for empty or absent groups.
//!
//! Content moves as a stream of byte chunks so uploads and downloads are never
//! fully buffered by the service itself.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

mod local;
mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

/// Streamed object content.
pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + 'a>>;

/// Metadata for one stored object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectMeta {
    pub group: String,
    pub name: String,
    pub size: u64,
    /// Assigned by the store at write time.
    pub uploaded_at: DateTime<Utc>,
    /// xxh3 content hash, when the backend tracks it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// A readable object: metadata plus its content stream.
pub struct ObjectContent {
    pub meta: ObjectMeta,
    pub body: ByteStream<'static>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, group: &str, name: &str, content: ByteStream<'_>) -> Result<ObjectMeta, StoreError>;

    async fn list(&self, group: &str) -> Result<Vec<ObjectMeta>, StoreError>;

    async fn get(&self, group: &str, name: &str) -> Result<ObjectContent, StoreError>;

    async fn delete_group(&self, group: &str) -> Result<(), StoreError>;

    fn backend_name(&self) -> &'static str;
}

/// Longest accepted object or group name, in bytes.
pub const MAX_NAME_BYTES: usize = 255;

/// Validate a single-segment object name:
/// - non-empty and at most `MAX_NAME_BYTES` bytes
/// - no '/', '\\' or NUL
/// - not "." or ".."
pub fn validate_object_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidName("name cannot be empty".into()));
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(StoreError::InvalidName(format!("name longer than {} bytes", MAX_NAME_BYTES)));
    }
    if name.chars().any(|c| c == '/' || c == '\\' || c == '\u{0000}') {
        return Err(StoreError::InvalidName(format!("'{}' contains a path separator or NUL", name)));
    }
    if name == "." || name == ".." {
        return Err(StoreError::InvalidName("'.' and '..' are not allowed".into()));
    }
    Ok(())
}

/// Groups follow the object rules and additionally may not start with '.',
/// which keeps backend-internal directories out of the group namespace.
pub fn validate_group_name(group: &str) -> Result<(), StoreError> {
    validate_object_name(group)?;
    if group.starts_with('.') {
        return Err(StoreError::InvalidName(format!("group '{}' may not start with '.'", group)));
    }
    Ok(())
}

/// Stable ETag for content hashed incrementally with xxh3_64; fixed-width lowercase hex.
pub(crate) fn etag_hex(digest: u64) -> String {
    format!("{digest:016x}")
}
