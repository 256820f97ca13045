use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;
use xxhash_rust::xxh3::Xxh3;

use super::{etag_hex, validate_group_name, validate_object_name, ByteStream, MAX_NAME_BYTES, ObjectContent, ObjectMeta, ObjectStore};
use crate::error::StoreError;

const STAGING_DIR: &str = ".staging";
const READ_CHUNK: usize = 64 * 1024;

/// Filesystem-backed object store.
///
/// Layout: `<root>/<group dir>/<name>`, where the group dir is the group name
/// with each ASCII uppercase letter written as `^` plus its lowercase form (and
/// `^` itself as `^^`). Session keys differ by case alone, and on a
/// case-insensitive filesystem two such keys must not share a directory.
/// Object names inside a group are stored verbatim. Uploads are staged under `<root>/.staging`
/// and renamed into place once fully written, so a reader never observes a
/// partially written object and a failed upload leaves the previous version
/// (if any) untouched. Each filesystem call is bounded by `op_timeout`; the
/// upload as a whole is not, since its pace is set by the sender.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    op_timeout: Duration,
}

impl LocalObjectStore {
    pub fn new(root: impl AsRef<Path>, op_timeout: Duration) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(STAGING_DIR))?;
        Ok(Self { root, op_timeout })
    }

    pub fn root(&self) -> &Path { &self.root }

    /// Directory holding `group`'s objects.
    pub fn group_path(&self, group: &str) -> PathBuf { self.root.join(group_dir_name(group)) }

    fn group_dir(&self, group: &str) -> Result<PathBuf, StoreError> {
        validate_group_name(group)?;
        let dir = group_dir_name(group);
        if dir.len() > MAX_NAME_BYTES {
            return Err(StoreError::InvalidName(format!("group '{}' is too long once encoded", group)));
        }
        Ok(self.root.join(dir))
    }

    fn staging_path(&self) -> PathBuf {
        self.root.join(STAGING_DIR).join(format!("{}.tmp", Uuid::new_v4()))
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = std::io::Result<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(res) => res.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.op_timeout.as_millis() as u64)),
        }
    }

    async fn write_staged(&self, tmp: &Path, mut content: ByteStream<'_>) -> Result<(u64, String), StoreError> {
        let mut file = self.bounded(tokio::fs::File::create(tmp)).await?;
        let mut hasher = Xxh3::new();
        let mut size: u64 = 0;
        while let Some(chunk) = content.next().await {
            let chunk = chunk.map_err(StoreError::ContentStream)?;
            hasher.update(&chunk);
            size += chunk.len() as u64;
            self.bounded(file.write_all(&chunk)).await?;
        }
        self.bounded(file.flush()).await?;
        self.bounded(file.sync_all()).await?;
        Ok((size, etag_hex(hasher.digest())))
    }
}

/// Case-safe directory name for a group.
pub(crate) fn group_dir_name(group: &str) -> String {
    let mut out = String::with_capacity(group.len() + 4);
    for c in group.chars() {
        match c {
            '^' => out.push_str("^^"),
            c if c.is_ascii_uppercase() => {
                out.push('^');
                out.push(c.to_ascii_lowercase());
            }
            c => out.push(c),
        }
    }
    out
}

/// Removes its staging file on drop unless disarmed. Covers both error returns
/// and a caller dropping the upload future mid-stream.
struct StagedFile {
    path: PathBuf,
    armed: bool,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self { Self { path, armed: true } }

    fn disarm(mut self) { self.armed = false; }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn modified_utc(md: &std::fs::Metadata) -> DateTime<Utc> {
    md.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, group: &str, name: &str, content: ByteStream<'_>) -> Result<ObjectMeta, StoreError> {
        validate_object_name(name)?;
        let dir = self.group_dir(group)?;
        self.bounded(tokio::fs::create_dir_all(&dir)).await?;

        let staged = StagedFile::new(self.staging_path());
        let (size, etag) = self.write_staged(&staged.path, content).await?;
        let dest = dir.join(name);
        self.bounded(tokio::fs::rename(&staged.path, &dest)).await?;
        staged.disarm();
        let md = self.bounded(tokio::fs::metadata(&dest)).await?;
        debug!(target: "store", group = %group, name = %name, size = size, "local put");
        Ok(ObjectMeta {
            group: group.to_string(),
            name: name.to_string(),
            size,
            uploaded_at: modified_utc(&md),
            etag: Some(etag),
        })
    }

    async fn list(&self, group: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let dir = self.group_dir(group)?;
        let mut rd = match self.bounded(tokio::fs::read_dir(&dir)).await {
            Ok(rd) => rd,
            // Never written to: an implicit, empty group
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut out = Vec::new();
        while let Some(ent) = self.bounded(rd.next_entry()).await? {
            let md = self.bounded(ent.metadata()).await?;
            if !md.is_file() { continue; }
            out.push(ObjectMeta {
                group: group.to_string(),
                name: ent.file_name().to_string_lossy().to_string(),
                size: md.len(),
                uploaded_at: modified_utc(&md),
                etag: None,
            });
        }
        Ok(out)
    }

    async fn get(&self, group: &str, name: &str) -> Result<ObjectContent, StoreError> {
        validate_object_name(name)?;
        let path = self.group_dir(group)?.join(name);
        let file = match self.bounded(tokio::fs::File::open(&path)).await {
            Ok(f) => f,
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound { group: group.to_string(), name: name.to_string() });
            }
            Err(e) => return Err(e),
        };
        let md = self.bounded(file.metadata()).await?;
        let meta = ObjectMeta {
            group: group.to_string(),
            name: name.to_string(),
            size: md.len(),
            uploaded_at: modified_utc(&md),
            etag: None,
        };
        let body = stream::unfold(Some(file), |state| async move {
            let mut file = state?;
            let mut buf = vec![0u8; READ_CHUNK];
            match file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(Bytes::from(buf)), Some(file)))
                }
                Err(e) => Some((Err(e), None)),
            }
        });
        Ok(ObjectContent { meta, body: Box::pin(body) })
    }

    async fn delete_group(&self, group: &str) -> Result<(), StoreError> {
        let dir = self.group_dir(group)?;
        match self.bounded(tokio::fs::remove_dir_all(&dir)).await {
            Ok(()) => Ok(()),
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn backend_name(&self) -> &'static str { "local" }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod local_tests;
