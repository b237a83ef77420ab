//! Paginated photo gallery store.
//!
//! [`Gallery`] owns the normalized photo/album state and is its only
//! mutation surface. Pages come from an [`AssetSource`] behind a
//! [`PermissionGate`]; photo and album slices are written behind to a
//! [`KeyValueStore`] by the [`PersistenceMirror`].

pub mod assets;
pub mod config;
pub mod db;
pub mod error;
pub mod folder;
pub mod gallery;
pub mod kv;
pub mod mirror;
pub mod models;
pub mod permission;
pub mod schema;
pub mod store;

pub use crate::assets::{AssetAdapter, AssetSource};
pub use crate::config::{AppPaths, Settings, StorageKeys};
pub use crate::db::SqliteKeyValueStore;
pub use crate::error::{Error, Result};
pub use crate::folder::{FolderAssetSource, FolderPermissions};
pub use crate::gallery::Gallery;
pub use crate::kv::{KeyValueStore, MemoryKeyValueStore};
pub use crate::mirror::PersistenceMirror;
pub use crate::models::{Album, AlbumKind, Photo, PhotoMetadata};
pub use crate::permission::{MediaPermissions, PermissionGate};
pub use crate::store::{Action, GalleryState};
