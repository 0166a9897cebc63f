use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;

/// Where a stored blob can be fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    /// Public URL of the blob.
    pub url: String,
    /// URL that asks the browser to save the blob.
    pub download_url: String,
}

/// Object storage for uploads, covers and composed videos.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous blob.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<StoredBlob>;

    /// Read back a blob by the URL [`BlobStore::put`] returned.
    async fn read_url(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

/// [`BlobStore`] on the local filesystem, served by the router under `/files`.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    /// Store blobs below `root`, addressed as `{public_base_url}/files/{key}`.
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Directory blobs are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn prefix(&self) -> String {
        format!("{}/files/", self.public_base_url)
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .split('/')
                .all(|part| !part.is_empty() && part != "." && part != "..");
        if !valid {
            anyhow::bail!("invalid blob key {key:?}");
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<StoredBlob> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let len = bytes.len();
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        tracing::debug!(key, content_type, bytes = len, "blob stored");

        let url = format!("{}{key}", self.prefix());
        Ok(StoredBlob {
            download_url: format!("{url}?download=1"),
            url,
        })
    }

    async fn read_url(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let key = url
            .strip_prefix(&self.prefix())
            .map(|rest| rest.split('?').next().unwrap_or(rest))
            .with_context(|| format!("{url} is not served by this store"))?;
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("read {}", path.display()))
    }
}

/// Key for an upload: `videos/{id}/original.{ext}`.
pub fn original_key(video_id: &str, extension: &str) -> String {
    format!("videos/{video_id}/original.{extension}")
}
