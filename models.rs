use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::HashMap;
use uuid::Uuid;

pub type PhotoMap = HashMap<String, Photo>;
pub type AlbumMap = HashMap<String, Album>;

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub uri: String,
    pub thumbnail_uri: Option<String>,
    pub metadata: Option<PhotoMetadata>,
    /// Transient UI flag. Never written to storage; restored photos start unselected.
    #[serde(default, skip_serializing)]
    pub selected: bool,
}

impl Photo {
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Records missing an id or a uri are kept in the map but hidden from views.
    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty() && !self.uri.is_empty()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.metadata.as_ref().map(|m| m.created_at)
    }

    pub(crate) fn apply(&mut self, patch: PhotoPatch) {
        if let Some(uri) = patch.uri {
            self.uri = uri;
        }
        if let Some(thumbnail_uri) = patch.thumbnail_uri {
            self.thumbnail_uri = Some(thumbnail_uri);
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = Some(metadata);
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoPatch {
    pub uri: Option<String>,
    pub thumbnail_uri: Option<String>,
    pub metadata: Option<PhotoMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlbumKind {
    #[default]
    Manual,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub name: String,
    pub photo_ids: Vec<String>,
    #[serde(rename = "type")]
    pub kind: AlbumKind,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Album {
    pub fn manual(name: impl Into<String>, photo_ids: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            photo_ids,
            kind: AlbumKind::Manual,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub(crate) fn apply(&mut self, patch: AlbumPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(photo_ids) = patch.photo_ids {
            self.photo_ids = photo_ids;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(timestamp) = patch.timestamp {
            self.timestamp = timestamp;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlbumPatch {
    pub name: Option<String>,
    pub photo_ids: Option<Vec<String>>,
    pub kind: Option<AlbumKind>,
    pub timestamp: Option<i64>,
}

/// A media-library record before normalization into a [`Photo`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawAsset {
    pub id: String,
    pub uri: String,
    pub preview_uri: Option<String>,
    pub width: u32,
    pub height: u32,
    pub creation_time: Option<DateTime<Utc>>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawPage {
    pub assets: Vec<RawAsset>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub assets: Vec<Photo>,
    pub has_next_page: bool,
    pub end_cursor: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAlbum {
    pub id: String,
    pub title: String,
    pub asset_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == PermissionStatus::Granted
    }
}

/// Last known outcome of a media permission check, persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub status: PermissionStatus,
    pub granted: bool,
}

impl From<PermissionStatus> for PermissionGrant {
    fn from(status: PermissionStatus) -> Self {
        Self {
            status,
            granted: status.is_granted(),
        }
    }
}
