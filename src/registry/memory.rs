use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{SessionRecord, SessionRegistry};
use crate::error::RegistryError;

/// In-process registry with absolute-expiry records.
///
/// Expired records are dropped lazily on lookup; `sweep` removes the rest and is
/// meant to be called periodically by the server.
#[derive(Clone, Default)]
pub struct MemorySessionRegistry {
    map: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemorySessionRegistry {
    pub fn new() -> Self { Self::default() }

    /// Remove expired records. Returns number removed.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut w = self.map.write();
        let before = w.len();
        w.retain(|_, e| e.expire > now);
        before - w.len()
    }

    pub fn len(&self) -> usize { self.map.read().len() }

    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }

    /// Expiry of a live record, if any.
    pub fn expiry_of(&self, key: &str) -> Option<DateTime<Utc>> {
        let now = Utc::now();
        self.map.read().get(key).map(|e| e.expire).filter(|exp| *exp > now)
    }
}

#[async_trait]
impl SessionRegistry for MemorySessionRegistry {
    async fn put(&self, record: &SessionRecord) -> Result<(), RegistryError> {
        self.map.write().insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, RegistryError> {
        let now = Utc::now();
        {
            let r = self.map.read();
            match r.get(key) {
                None => return Ok(false),
                Some(ent) if ent.expire > now => return Ok(true),
                Some(_) => {}
            }
        }
        // Expired: drop it so the map does not wait for the sweeper
        let mut w = self.map.write();
        if w.get(key).map(|e| e.expire <= now).unwrap_or(false) {
            w.remove(key);
        }
        Ok(false)
    }

    async fn delete(&self, key: &str) -> Result<(), RegistryError> {
        self.map.write().remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str { "memory" }
}
