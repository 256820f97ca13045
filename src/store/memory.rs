use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures_util::{stream, StreamExt};
use parking_lot::RwLock;
use xxhash_rust::xxh3::xxh3_64;

use super::{etag_hex, validate_group_name, validate_object_name, ByteStream, ObjectContent, ObjectMeta, ObjectStore};
use crate::error::StoreError;

#[derive(Clone)]
struct StoredObject {
    meta: ObjectMeta,
    data: Bytes,
}

/// In-process object store. Objects are buffered in memory, so this backend
/// suits tests and small single-node deployments only.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    /// group -> (name -> object)
    groups: Arc<RwLock<HashMap<String, BTreeMap<String, StoredObject>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self { Self::default() }

    /// Names of all groups currently holding at least one object.
    pub fn group_names(&self) -> Vec<String> {
        self.groups.read().iter().filter(|(_, g)| !g.is_empty()).map(|(k, _)| k.clone()).collect()
    }

    pub fn object_count(&self) -> usize {
        self.groups.read().values().map(|g| g.len()).sum()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, group: &str, name: &str, mut content: ByteStream<'_>) -> Result<ObjectMeta, StoreError> {
        validate_group_name(group)?;
        validate_object_name(name)?;
        let mut buf = BytesMut::new();
        while let Some(chunk) = content.next().await {
            buf.extend_from_slice(&chunk.map_err(StoreError::ContentStream)?);
        }
        let data = buf.freeze();
        let meta = ObjectMeta {
            group: group.to_string(),
            name: name.to_string(),
            size: data.len() as u64,
            uploaded_at: Utc::now(),
            etag: Some(etag_hex(xxh3_64(&data))),
        };
        let mut w = self.groups.write();
        w.entry(group.to_string())
            .or_default()
            .insert(name.to_string(), StoredObject { meta: meta.clone(), data });
        Ok(meta)
    }

    async fn list(&self, group: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        validate_group_name(group)?;
        let r = self.groups.read();
        Ok(r.get(group).map(|g| g.values().map(|o| o.meta.clone()).collect()).unwrap_or_default())
    }

    async fn get(&self, group: &str, name: &str) -> Result<ObjectContent, StoreError> {
        validate_group_name(group)?;
        validate_object_name(name)?;
        let obj = self.groups.read().get(group).and_then(|g| g.get(name).cloned());
        match obj {
            Some(o) => {
                let item: std::io::Result<Bytes> = Ok(o.data);
                Ok(ObjectContent { meta: o.meta, body: Box::pin(stream::once(async move { item })) })
            }
            None => Err(StoreError::NotFound { group: group.to_string(), name: name.to_string() }),
        }
    }

    async fn delete_group(&self, group: &str) -> Result<(), StoreError> {
        validate_group_name(group)?;
        self.groups.write().remove(group);
        Ok(())
    }

    fn backend_name(&self) -> &'static str { "memory" }
}
