use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageKeys {
    #[serde(default = "default_photos_key")]
    pub photos: String,
    #[serde(default = "default_albums_key")]
    pub albums: String,
    #[serde(default = "default_permission_key")]
    pub permission: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            photos: default_photos_key(),
            albums: default_albums_key(),
            permission: default_permission_key(),
        }
    }
}

fn default_photos_key() -> String {
    "gallery_photos".to_string()
}

fn default_albums_key() -> String {
    "gallery_albums".to_string()
}

fn default_permission_key() -> String {
    "media_permission".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Pause after a fresh grant before the first query; some platforms
    /// report the grant before the library becomes queryable.
    #[serde(default = "default_grant_settle_delay_ms")]
    pub grant_settle_delay_ms: u64,
    #[serde(default)]
    pub storage_keys: StorageKeys,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            grant_settle_delay_ms: default_grant_settle_delay_ms(),
            storage_keys: StorageKeys::default(),
        }
    }
}

fn default_page_size() -> usize {
    20
}

fn default_grant_settle_delay_ms() -> u64 {
    500
}

impl Settings {
    /// Reads settings from a JSON file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, crate::error::Error> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&raw)?;
        Ok(settings)
    }

    pub fn grant_settle_delay(&self) -> Duration {
        Duration::from_millis(self.grant_settle_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppPaths {
    pub root: PathBuf,
    pub db_path: PathBuf,
    pub settings_path: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self, crate::error::Error> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| crate::error::Error::Path("Failed to get app data dir".to_string()))?;
        Self::at(data_dir.join("GalleryStore"))
    }

    pub fn at(root: PathBuf) -> Result<Self, crate::error::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            db_path: root.join("gallery.db"),
            settings_path: root.join("settings.json"),
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings.page_size, 20);
        assert_eq!(settings.grant_settle_delay(), Duration::from_millis(500));
        assert_eq!(settings.storage_keys.photos, "gallery_photos");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"page_size": 50, "storage_keys": {"albums": "my_albums"}}"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.grant_settle_delay_ms, 500);
        assert_eq!(settings.storage_keys.albums, "my_albums");
        assert_eq!(settings.storage_keys.permission, "media_permission");
    }

    #[test]
    fn app_paths_are_created_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::at(dir.path().join("nested")).unwrap();
        assert!(paths.root.is_dir());
        assert_eq!(paths.db_path.file_name().unwrap(), "gallery.db");
    }
}
