use crate::error::{Error, Result};
use crate::models::{DeviceAlbum, Page, Photo, PhotoMetadata, RawAsset, RawPage};
use crate::permission::PermissionGate;
use async_trait::async_trait;
use std::sync::Arc;

/// Platform media library. Pages come back newest first.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn query_page(&self, after: Option<&str>, limit: usize) -> Result<RawPage>;

    /// Deletes what it can and returns the ids that are confirmed gone.
    async fn delete_assets(&self, ids: &[String]) -> Result<Vec<String>>;

    async fn asset_info(&self, id: &str) -> Result<Option<RawAsset>>;

    async fn create_album(&self, name: &str, ids: &[String]) -> Result<DeviceAlbum>;

    async fn albums(&self) -> Result<Vec<DeviceAlbum>>;
}

/// Gates every media-library call on the permission and normalizes results.
#[derive(Clone)]
pub struct AssetAdapter {
    source: Arc<dyn AssetSource>,
    gate: Arc<PermissionGate>,
}

impl AssetAdapter {
    pub fn new(source: Arc<dyn AssetSource>, gate: Arc<PermissionGate>) -> Self {
        Self { source, gate }
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub async fn fetch_page(&self, after: &str, limit: usize) -> Result<Page> {
        self.gate.ensure_granted(false).await?;

        let after = (!after.is_empty()).then_some(after);
        let raw = self
            .source
            .query_page(after, limit)
            .await
            .map_err(as_fetch_failure)?;

        let has_next_page = raw.has_next_page && !raw.assets.is_empty();
        let assets: Vec<Photo> = raw.assets.into_iter().map(normalize).collect();
        log::debug!(
            "Fetched {} assets after {:?}, has_next_page={has_next_page}",
            assets.len(),
            after
        );
        Ok(Page {
            assets,
            has_next_page,
            end_cursor: raw.end_cursor.unwrap_or_default(),
        })
    }

    /// Returns the ids the source confirmed as deleted. A source error
    /// becomes [`Error::DeleteFailed`] with nothing confirmed.
    pub async fn delete(&self, ids: &[String]) -> Result<Vec<String>> {
        self.gate.ensure_granted(false).await?;
        self.source
            .delete_assets(ids)
            .await
            .map_err(|err| Error::DeleteFailed {
                requested: ids.to_vec(),
                deleted: Vec::new(),
                message: err.to_string(),
            })
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        self.gate.ensure_granted(false).await?;
        Ok(self.source.asset_info(id).await?.is_some())
    }

    pub async fn asset(&self, id: &str) -> Result<Option<Photo>> {
        self.gate.ensure_granted(false).await?;
        Ok(self.source.asset_info(id).await?.map(normalize))
    }

    pub async fn create_album(&self, name: &str, ids: &[String]) -> Result<DeviceAlbum> {
        self.gate.ensure_granted(false).await?;
        self.source.create_album(name, ids).await
    }

    pub async fn albums(&self) -> Result<Vec<DeviceAlbum>> {
        self.gate.ensure_granted(false).await?;
        self.source.albums().await
    }
}

fn as_fetch_failure(err: Error) -> Error {
    match err {
        Error::PermissionDenied | Error::FetchFailed(_) => err,
        other => Error::FetchFailed(other.to_string()),
    }
}

pub fn normalize(raw: RawAsset) -> Photo {
    let metadata = raw.creation_time.map(|created_at| PhotoMetadata {
        width: raw.width,
        height: raw.height,
        created_at,
        location: raw.location,
    });
    Photo {
        thumbnail_uri: Some(raw.preview_uri.unwrap_or_else(|| raw.uri.clone())),
        id: raw.id,
        uri: raw.uri,
        metadata,
        selected: false,
    }
}
