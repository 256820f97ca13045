use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::{SessionRecord, SessionRegistry};
use crate::error::RegistryError;

/// Client for the remote cache service that holds session records.
///
/// Wire protocol (string namespace of the cache service):
/// - `POST {base}/string` with `{"key","value","expire"}` -> 201 Created
/// - `GET {base}/string/{key}` -> 200 when present, 404 when absent or expired
/// - `DELETE {base}/string/{key}` -> 2xx, or 404 when already gone
#[derive(Clone)]
pub struct HttpSessionRegistry {
    base: Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSessionRegistry {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base).context("invalid registry base URL")?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building registry HTTP client")?;
        Ok(Self { base: base_url, client, timeout })
    }

    pub fn base_url(&self) -> &Url { &self.base }

    fn collection_url(&self) -> String {
        format!("{}/string", self.base.as_str().trim_end_matches('/'))
    }

    fn record_url(&self, key: &str) -> String {
        format!("{}/{}", self.collection_url(), urlencoding::encode(key))
    }

    fn map_err(&self, err: reqwest::Error) -> RegistryError {
        if err.is_timeout() {
            RegistryError::Timeout(self.timeout.as_millis() as u64)
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl SessionRegistry for HttpSessionRegistry {
    async fn put(&self, record: &SessionRecord) -> Result<(), RegistryError> {
        let resp = self.client
            .post(self.collection_url())
            .json(record)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        let status = resp.status();
        debug!(target: "registry", key = %record.key, status = status.as_u16(), "registry put");
        match status {
            StatusCode::CREATED | StatusCode::OK => Ok(()),
            other => Err(RegistryError::Status { code: other.as_u16() }),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, RegistryError> {
        let resp = self.client
            .get(self.record_url(key))
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(RegistryError::Status { code: other.as_u16() }),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), RegistryError> {
        let resp = self.client
            .delete(self.record_url(key))
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        let status = resp.status();
        debug!(target: "registry", key = %key, status = status.as_u16(), "registry delete");
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(RegistryError::Status { code: status.as_u16() })
        }
    }

    fn backend_name(&self) -> &'static str { "http" }
}
