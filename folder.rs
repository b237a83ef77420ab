use crate::assets::AssetSource;
use crate::error::{Error, Result};
use crate::models::{DeviceAlbum, PermissionStatus, RawAsset, RawPage};
use crate::permission::MediaPermissions;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use uuid::Uuid;
use walkdir::WalkDir;
use xxhash_rust::xxh3::xxh3_128;

const SUPPORTED_EXT: &[&str] = &["jpg", "jpeg", "png", "heic", "webp", "gif", "bmp", "tiff", "tif"];

const ALBUMS_DIR: &str = ".gallery-albums";

/// A directory tree standing in for the device media library.
#[derive(Debug, Clone)]
pub struct FolderAssetSource {
    root: PathBuf,
}

#[derive(Debug)]
struct Entry {
    id: String,
    path: PathBuf,
    modified: SystemTime,
    /// Modification time in nanoseconds since the epoch; pre-epoch times clamp to 0.
    nanos: u128,
    /// Lossy path string, the tie-breaker of the listing order.
    key: String,
}

impl Entry {
    fn cursor(&self) -> String {
        format!("{}:{}", self.nanos, self.key)
    }

    /// Whether this entry sorts strictly after `cursor` in the newest-first listing.
    fn is_after(&self, cursor: &Cursor) -> bool {
        self.nanos < cursor.nanos || (self.nanos == cursor.nanos && self.key > cursor.key)
    }
}

/// Position of the last entry handed out: `<mtime nanos>:<path>`.
/// Deleting listed files never moves it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Cursor {
    nanos: u128,
    key: String,
}

impl Cursor {
    fn parse(raw: &str) -> Result<Self> {
        let invalid = || Error::FetchFailed(format!("Invalid cursor {raw:?}"));
        let (nanos, key) = raw.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            nanos: nanos.parse().map_err(|_| invalid())?,
            key: key.to_string(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumManifest {
    id: String,
    title: String,
    asset_ids: Vec<String>,
}

impl FolderAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(PathBuf) -> Result<T> + Send + 'static,
    {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || f(root))
            .await
            .map_err(|e| Error::Init(format!("Task join error: {e}")))?
    }
}

#[async_trait]
impl AssetSource for FolderAssetSource {
    async fn query_page(&self, after: Option<&str>, limit: usize) -> Result<RawPage> {
        let cursor = after.map(Cursor::parse).transpose()?;
        let echoed = after.map(str::to_string);
        self.blocking(move |root| {
            let entries = scan(&root)?;
            let start = match &cursor {
                Some(cursor) => entries
                    .iter()
                    .position(|e| e.is_after(cursor))
                    .unwrap_or(entries.len()),
                None => 0,
            };
            let page = &entries[start..entries.len().min(start + limit)];
            Ok(RawPage {
                has_next_page: start + page.len() < entries.len(),
                end_cursor: page.last().map(Entry::cursor).or(echoed),
                assets: page.iter().map(to_raw_asset).collect(),
            })
        })
        .await
    }

    async fn delete_assets(&self, ids: &[String]) -> Result<Vec<String>> {
        let ids = ids.to_vec();
        self.blocking(move |root| {
            let entries = scan(&root)?;
            let mut deleted = Vec::new();
            for id in ids {
                let Some(entry) = entries.iter().find(|e| e.id == id) else {
                    continue;
                };
                match fs::remove_file(&entry.path) {
                    Ok(()) => {
                        log::debug!("Deleted {}", entry.path.display());
                        deleted.push(id);
                    }
                    Err(err) => log::warn!("Failed to delete {}: {err}", entry.path.display()),
                }
            }
            Ok(deleted)
        })
        .await
    }

    async fn asset_info(&self, id: &str) -> Result<Option<RawAsset>> {
        let id = id.to_string();
        self.blocking(move |root| {
            let entries = scan(&root)?;
            Ok(entries.iter().find(|e| e.id == id).map(to_raw_asset))
        })
        .await
    }

    async fn create_album(&self, name: &str, ids: &[String]) -> Result<DeviceAlbum> {
        let manifest = AlbumManifest {
            id: Uuid::new_v4().to_string(),
            title: name.to_string(),
            asset_ids: ids.to_vec(),
        };
        self.blocking(move |root| {
            let dir = root.join(ALBUMS_DIR);
            fs::create_dir_all(&dir)?;
            let path = dir.join(format!("{}.json", manifest.id));
            fs::write(&path, serde_json::to_vec_pretty(&manifest)?)?;
            Ok(DeviceAlbum {
                asset_count: manifest.asset_ids.len(),
                id: manifest.id,
                title: manifest.title,
            })
        })
        .await
    }

    async fn albums(&self) -> Result<Vec<DeviceAlbum>> {
        self.blocking(|root| {
            let dir = root.join(ALBUMS_DIR);
            if !dir.is_dir() {
                return Ok(Vec::new());
            }
            let mut albums = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let manifest: AlbumManifest = match serde_json::from_slice(&fs::read(&path)?) {
                    Ok(manifest) => manifest,
                    Err(err) => {
                        log::warn!("Skipping unreadable album {}: {err}", path.display());
                        continue;
                    }
                };
                albums.push(DeviceAlbum {
                    asset_count: manifest.asset_ids.len(),
                    id: manifest.id,
                    title: manifest.title,
                });
            }
            albums.sort_by(|a, b| a.title.cmp(&b.title));
            Ok(albums)
        })
        .await
    }
}

/// Granted while the library root is a readable directory.
#[derive(Debug, Clone)]
pub struct FolderPermissions {
    root: PathBuf,
}

impl FolderPermissions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn check(&self) -> PermissionStatus {
        match fs::read_dir(&self.root) {
            Ok(_) => PermissionStatus::Granted,
            Err(err) => {
                log::debug!("Library root {} unreadable: {err}", self.root.display());
                PermissionStatus::Denied
            }
        }
    }
}

#[async_trait]
impl MediaPermissions for FolderPermissions {
    async fn status(&self) -> Result<PermissionStatus> {
        Ok(self.check())
    }

    async fn request(&self) -> Result<PermissionStatus> {
        Ok(self.check())
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXT.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn asset_id(path: &Path) -> String {
    let key = path.to_string_lossy();
    format!("{:x}", xxh3_128(key.as_bytes()))
}

/// Supported files under `root`, newest first. Hidden entries are skipped.
fn scan(root: &Path) -> Result<Vec<Entry>> {
    if !root.is_dir() {
        return Err(Error::FetchFailed(format!(
            "Library root {} is not a directory",
            root.display()
        )));
    }
    let mut entries: Vec<Entry> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_supported(e.path()))
        .map(|e| {
            let modified = e
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let nanos = modified
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            Entry {
                id: asset_id(e.path()),
                key: e.path().to_string_lossy().into_owned(),
                path: e.into_path(),
                modified,
                nanos,
            }
        })
        .collect();
    entries.sort_by(|a, b| b.nanos.cmp(&a.nanos).then_with(|| a.key.cmp(&b.key)));
    Ok(entries)
}

fn to_raw_asset(entry: &Entry) -> RawAsset {
    let (width, height) = image::image_dimensions(&entry.path).unwrap_or_else(|err| {
        log::debug!("No dimensions for {}: {err}", entry.path.display());
        (0, 0)
    });
    RawAsset {
        id: entry.id.clone(),
        uri: format!("file://{}", entry.path.display()),
        preview_uri: None,
        width,
        height,
        creation_time: Some(DateTime::<Utc>::from(entry.modified)),
        location: None,
    }
}
