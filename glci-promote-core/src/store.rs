//! Manifest store backends and typed manifest upload/download helpers.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::ManifestStoreCfg;
use crate::contract::ManifestStore;
use crate::error::StoreError;
use crate::model::{OnlineReleaseManifest, ReleaseManifest, ReleaseManifestSet};

/// Opens the store described by the build configuration.
pub fn open_manifest_store(cfg: &ManifestStoreCfg) -> Arc<dyn ManifestStore> {
    match cfg {
        ManifestStoreCfg::Filesystem { root } => {
            info!(root = %root.display(), "Using filesystem manifest store");
            Arc::new(FsManifestStore::new(root.clone()))
        }
        ManifestStoreCfg::Http { endpoint, bucket } => {
            info!(endpoint = %endpoint, bucket = %bucket, "Using http manifest store");
            Arc::new(HttpManifestStore::new(endpoint.clone(), bucket.clone()))
        }
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let path = Path::new(key);
    let valid = !key.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Stores every key as a file below a root directory.
pub struct FsManifestStore {
    root: PathBuf,
}

impl FsManifestStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ManifestStore for FsManifestStore {
    fn bucket_name(&self) -> String {
        self.root.display().to_string()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key, path = %path.display(), "No document at key");
                Ok(None)
            }
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn put(&self, key: &str, body: String) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&path, body).await.map_err(io_err)?;
        debug!(key, path = %path.display(), "Wrote document");
        Ok(())
    }
}

/// Plain GET/PUT against `{endpoint}/{bucket}/{key}`.
pub struct HttpManifestStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
}

impl HttpManifestStore {
    pub fn new(endpoint: String, bucket: String) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint, bucket)
    }

    pub fn with_client(client: reqwest::Client, endpoint: String, bucket: String) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket,
        }
    }

    /// Each key segment is percent-encoded, so `#` or `?` in a version stay part of the path.
    fn url_for(&self, key: &str) -> Result<reqwest::Url, StoreError> {
        validate_key(key)?;
        let invalid = |detail: String| StoreError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            detail,
        };
        let mut url = reqwest::Url::parse(&self.endpoint).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base url".to_string()))?
            .pop_if_empty()
            .push(&self.bucket)
            .extend(key.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl ManifestStore for HttpManifestStore {
    fn bucket_name(&self) -> String {
        self.bucket.clone()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let url = self.url_for(key)?;
        let http_err = |source| StoreError::Http {
            key: key.to_string(),
            source,
        };
        let response = self.client.get(url.clone()).send().await.map_err(http_err)?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(key, url = %url, "No document at key");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(http_err)?;
        Ok(Some(body))
    }

    async fn put(&self, key: &str, body: String) -> Result<(), StoreError> {
        let url = self.url_for(key)?;
        let response = self
            .client
            .put(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/x-yaml")
            .body(body)
            .send()
            .await
            .map_err(|source| StoreError::Http {
                key: key.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }
        debug!(key, url = %url, "Uploaded document");
        Ok(())
    }
}

pub async fn upload_release_manifest<S>(
    store: &S,
    key: &str,
    manifest: &ReleaseManifest,
) -> Result<(), StoreError>
where
    S: ManifestStore + ?Sized,
{
    let body = serde_yaml::to_string(manifest).map_err(|source| StoreError::Serialize {
        key: key.to_string(),
        source,
    })?;
    store.put(key, body).await
}

pub async fn upload_release_manifest_set<S>(
    store: &S,
    key: &str,
    manifest_set: &ReleaseManifestSet,
) -> Result<(), StoreError>
where
    S: ManifestStore + ?Sized,
{
    let body = serde_yaml::to_string(manifest_set).map_err(|source| StoreError::Serialize {
        key: key.to_string(),
        source,
    })?;
    store.put(key, body).await
}

/// Reads the release manifest at `key` and records where it was found.
pub async fn load_release_manifest<S>(
    store: &S,
    key: &str,
) -> Result<Option<OnlineReleaseManifest>, StoreError>
where
    S: ManifestStore + ?Sized,
{
    let Some(body) = store.get(key).await? else {
        return Ok(None);
    };
    let manifest: ReleaseManifest =
        serde_yaml::from_str(&body).map_err(|source| StoreError::Deserialize {
            key: key.to_string(),
            source,
        })?;
    Ok(Some(OnlineReleaseManifest {
        manifest,
        s3_key: key.to_string(),
        s3_bucket: store.bucket_name(),
    }))
}
