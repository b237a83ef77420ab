use crate::assets::AssetAdapter;
use crate::error::{Error, Result};
use crate::mirror::PersistenceMirror;
use crate::models::{Album, AlbumPatch, Photo, PhotoPatch};
use crate::store::{Action, GalleryState, Touched};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// The gallery store with its collaborators: the only mutation surface
/// the UI sees.
///
/// The state lock is never held across an await, so every transition
/// applies atomically in dispatch order.
pub struct Gallery {
    state: Mutex<GalleryState>,
    adapter: AssetAdapter,
    mirror: PersistenceMirror,
    page_size: usize,
}

impl Gallery {
    pub fn new(adapter: AssetAdapter, mirror: PersistenceMirror, page_size: usize) -> Self {
        Self {
            state: Mutex::new(GalleryState::default()),
            adapter,
            mirror,
            page_size: page_size.max(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, GalleryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Applies one transition and queues the slices it touched for persistence.
    pub fn dispatch(&self, action: Action) -> Touched {
        let mut state = self.state();
        let touched = state.apply(action);
        if touched.any() {
            self.mirror.observe(touched, &state);
        }
        touched
    }

    pub fn snapshot(&self) -> GalleryState {
        self.state().clone()
    }

    pub fn photos(&self) -> Vec<Photo> {
        self.state().photos_view().into_iter().cloned().collect()
    }

    pub fn selected_count(&self) -> usize {
        self.state().selected_count()
    }

    pub fn loading(&self) -> bool {
        self.state().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    pub fn has_next_page(&self) -> bool {
        self.state().has_next_page
    }

    /// Loads persisted slices before anything else touches the store.
    pub async fn restore(&self) {
        let restored = self.mirror.restore().await;
        let mut state = self.state();
        if let Some(photos) = restored.photos {
            state.apply(Action::SetPhotos(photos));
        }
        if let Some(albums) = restored.albums {
            state.apply(Action::SetAlbums(albums));
        }
    }

    /// Fetches the page after the current cursor. Resolves to `false` when
    /// nothing was merged: no further pages, a load already in flight, or a
    /// reset overtook the fetch.
    pub async fn load_next_page(&self) -> Result<bool> {
        let (generation, cursor) = {
            let mut state = self.state();
            if state.loading {
                log::debug!("Page load already in flight");
                return Ok(false);
            }
            if !state.has_next_page {
                return Ok(false);
            }
            state.apply(Action::BeginLoad);
            (state.generation, state.end_cursor.clone())
        };

        match self.adapter.fetch_page(&cursor, self.page_size).await {
            Ok(page) => Ok(self.dispatch(Action::PageLoaded { generation, page }).photos),
            Err(err) => {
                if self.state().generation != generation {
                    log::debug!("Dropping failure of a fetch overtaken by reset: {err}");
                    return Ok(false);
                }
                log::warn!("Failed to load photos after {cursor:?}: {err}");
                self.dispatch(Action::PageFailed {
                    generation,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    pub fn reset(&self) {
        self.dispatch(Action::Reset);
    }

    /// Clears the store and loads the first page again.
    pub async fn refresh(&self) -> Result<bool> {
        self.reset();
        self.load_next_page().await
    }

    pub fn toggle_select(&self, id: impl Into<String>) {
        self.dispatch(Action::ToggleSelect(id.into()));
    }

    pub fn set_selected_photos(&self, ids: Vec<String>) {
        self.dispatch(Action::SetSelectedPhotos(ids));
    }

    pub fn clear_selection(&self) {
        self.dispatch(Action::ClearSelection);
    }

    pub fn add_photo(&self, photo: Photo) {
        self.dispatch(Action::AddPhoto(photo));
    }

    pub fn update_photo(&self, id: impl Into<String>, patch: PhotoPatch) {
        self.dispatch(Action::UpdatePhoto {
            id: id.into(),
            patch,
        });
    }

    /// Drops a photo from the store only; the media library is not touched.
    pub fn delete_photo(&self, id: impl Into<String>) {
        self.dispatch(Action::DeletePhoto(id.into()));
    }

    pub fn add_album(&self, album: Album) {
        self.dispatch(Action::AddAlbum(album));
    }

    pub fn update_album(&self, id: impl Into<String>, patch: AlbumPatch) {
        self.dispatch(Action::UpdateAlbum {
            id: id.into(),
            patch,
        });
    }

    pub fn delete_album(&self, id: impl Into<String>) {
        self.dispatch(Action::DeleteAlbum(id.into()));
    }

    pub fn set_error(&self, error: Option<String>) {
        self.dispatch(Action::SetError(error));
    }

    /// Deletes the current selection from the media library, then from the store.
    ///
    /// A source error leaves the store untouched. When the source confirms
    /// only part of the batch, the rest are re-queried; ids that no longer
    /// exist count as deleted. Whatever is confirmed is committed, the rest
    /// stay selected and [`Error::DeleteFailed`] is returned.
    pub async fn delete_selected(&self) -> Result<Vec<String>> {
        let requested = self.state().selected_photos.clone();
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let reported = self.adapter.delete(&requested).await?;
        let mut confirmed: HashSet<String> = reported
            .into_iter()
            .filter(|id| requested.contains(id))
            .collect();
        for id in &requested {
            if confirmed.contains(id) {
                continue;
            }
            match self.adapter.exists(id).await {
                Ok(false) => {
                    confirmed.insert(id.clone());
                }
                Ok(true) => {}
                Err(err) => log::warn!("Could not re-check asset {id} after delete: {err}"),
            }
        }
        let deleted: Vec<String> = requested
            .iter()
            .filter(|id| confirmed.contains(*id))
            .cloned()
            .collect();

        if !deleted.is_empty() {
            self.dispatch(Action::DeletePhotosConfirmed(deleted.clone()));
        }
        if deleted.len() == requested.len() {
            self.dispatch(Action::ClearSelection);
            log::info!("Deleted {} photos", deleted.len());
            return Ok(deleted);
        }

        let message = format!(
            "{} of {} photos could not be deleted",
            requested.len() - deleted.len(),
            requested.len()
        );
        log::warn!("{message}");
        Err(Error::DeleteFailed {
            requested,
            deleted,
            message,
        })
    }

    /// Creates the album in the media library and mirrors it as a manual album.
    pub async fn create_device_album(&self, name: &str, photo_ids: Vec<String>) -> Result<Album> {
        let device = self.adapter.create_album(name, &photo_ids).await?;
        log::debug!("Created device album {} ({} assets)", device.id, device.asset_count);
        let album = Album::manual(name, photo_ids);
        self.dispatch(Action::AddAlbum(album.clone()));
        Ok(album)
    }

    /// Waits until queued persistence writes have been attempted.
    pub async fn flush(&self) {
        self.mirror.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::{granted_gate, FakeSource};
    use crate::assets::AssetSource;
    use crate::config::StorageKeys;
    use crate::kv::{KeyValueStore, MemoryKeyValueStore};
    use crate::mirror::decode_albums;
    use crate::models::{DeviceAlbum, RawAsset, RawPage};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn gallery_with(
        source: Arc<dyn AssetSource>,
        kv: Arc<MemoryKeyValueStore>,
        page_size: usize,
    ) -> Gallery {
        let adapter = AssetAdapter::new(source, granted_gate());
        let mirror = PersistenceMirror::spawn(kv, StorageKeys::default());
        Gallery::new(adapter, mirror, page_size)
    }

    fn gallery(ids: &[&str], page_size: usize) -> (Gallery, Arc<FakeSource>, Arc<MemoryKeyValueStore>) {
        let source = Arc::new(FakeSource::with_ids(ids));
        let kv = Arc::new(MemoryKeyValueStore::new());
        (gallery_with(source.clone(), kv.clone(), page_size), source, kv)
    }

    /// Holds each query until the test releases it.
    struct GatedSource {
        inner: FakeSource,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl AssetSource for GatedSource {
        async fn query_page(&self, after: Option<&str>, limit: usize) -> crate::error::Result<RawPage> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.query_page(after, limit).await
        }

        async fn delete_assets(&self, ids: &[String]) -> crate::error::Result<Vec<String>> {
            self.inner.delete_assets(ids).await
        }

        async fn asset_info(&self, id: &str) -> crate::error::Result<Option<RawAsset>> {
            self.inner.asset_info(id).await
        }

        async fn create_album(&self, name: &str, ids: &[String]) -> crate::error::Result<DeviceAlbum> {
            self.inner.create_album(name, ids).await
        }

        async fn albums(&self) -> crate::error::Result<Vec<DeviceAlbum>> {
            self.inner.albums().await
        }
    }

    #[tokio::test]
    async fn pages_until_exhausted() {
        let (gallery, source, _) = gallery(&["a", "b", "c", "d", "e"], 2);
        let mut merged = 0;
        while gallery.has_next_page() {
            if gallery.load_next_page().await.unwrap() {
                merged += 1;
            }
        }
        assert_eq!(merged, 3);
        assert_eq!(gallery.photos().len(), 5);
        assert!(!gallery.loading());
        assert!(!gallery.load_next_page().await.unwrap());
        assert_eq!(source.queries.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_page_surfaces_error_and_retry_resumes_cursor() {
        let (gallery, source, _) = gallery(&["a", "b", "c"], 2);
        gallery.load_next_page().await.unwrap();

        *source.fail_queries.lock().unwrap() = true;
        let err = gallery.load_next_page().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(gallery.error().is_some());
        assert!(!gallery.loading());

        *source.fail_queries.lock().unwrap() = false;
        assert!(gallery.load_next_page().await.unwrap());
        assert_eq!(gallery.error(), None);
        let queries = source.queries.lock().unwrap().clone();
        assert_eq!(queries[1], queries[2]);
        assert_eq!(gallery.photos().len(), 3);
    }

    #[tokio::test]
    async fn reset_discards_in_flight_page() {
        let source = Arc::new(GatedSource {
            inner: FakeSource::with_ids(&["a", "b"]),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let gallery = Arc::new(gallery_with(
            source.clone(),
            Arc::new(MemoryKeyValueStore::new()),
            10,
        ));

        let loader = {
            let gallery = gallery.clone();
            tokio::spawn(async move { gallery.load_next_page().await })
        };
        source.entered.notified().await;
        gallery.reset();
        source.release.notify_one();

        assert!(!loader.await.unwrap().unwrap());
        let state = gallery.snapshot();
        assert!(state.photos.is_empty());
        assert!(state.albums.is_empty());
        assert_eq!(state.end_cursor, "");
        assert!(state.has_next_page);
    }

    #[tokio::test]
    async fn failure_of_fetch_overtaken_by_reset_is_dropped() {
        let inner = FakeSource::with_ids(&["a", "b"]);
        *inner.fail_queries.lock().unwrap() = true;
        let source = Arc::new(GatedSource {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
        });
        let gallery = Arc::new(gallery_with(
            source.clone(),
            Arc::new(MemoryKeyValueStore::new()),
            10,
        ));

        let loader = {
            let gallery = gallery.clone();
            tokio::spawn(async move { gallery.load_next_page().await })
        };
        source.entered.notified().await;
        gallery.reset();
        source.release.notify_one();

        assert!(!loader.await.unwrap().unwrap());
        assert_eq!(gallery.error(), None);
        assert!(!gallery.loading());
        assert!(gallery.has_next_page());
    }

    #[tokio::test]
    async fn delete_selected_commits_after_source_confirms() {
        let (gallery, source, kv) = gallery(&["1", "2", "3"], 10);
        gallery.load_next_page().await.unwrap();
        gallery.add_album(Album {
            id: "trip".into(),
            name: "Trip".into(),
            photo_ids: vec!["1".into(), "3".into()],
            kind: Default::default(),
            timestamp: 0,
        });
        gallery.toggle_select("1");
        gallery.toggle_select("2");

        let deleted = gallery.delete_selected().await.unwrap();
        assert_eq!(deleted, vec!["1".to_string(), "2".to_string()]);

        let state = gallery.snapshot();
        assert!(!state.photos.contains_key("1"));
        assert!(!state.photos.contains_key("2"));
        assert!(state.selected_photos.is_empty());
        assert_eq!(state.albums["trip"].photo_ids, vec!["3".to_string()]);
        assert_eq!(source.assets.lock().unwrap().len(), 1);

        gallery.flush().await;
        let albums = decode_albums(&kv.get("gallery_albums").unwrap().unwrap()).unwrap();
        assert_eq!(albums["trip"].photo_ids, vec!["3".to_string()]);
    }

    #[tokio::test]
    async fn delete_error_leaves_store_untouched() {
        let (gallery, source, _) = gallery(&["1", "2"], 10);
        gallery.load_next_page().await.unwrap();
        gallery.toggle_select("1");
        let before = gallery.snapshot();

        *source.fail_delete.lock().unwrap() = true;
        let err = gallery.delete_selected().await.unwrap_err();
        assert!(matches!(err, Error::DeleteFailed { ref deleted, .. } if deleted.is_empty()));
        assert_eq!(gallery.snapshot(), before);
    }

    #[tokio::test]
    async fn partial_delete_commits_confirmed_ids_only() {
        let (gallery, source, _) = gallery(&["1", "2", "3"], 10);
        gallery.load_next_page().await.unwrap();
        gallery.set_selected_photos(vec!["1".into(), "2".into(), "gone".into()]);
        source.stuck.lock().unwrap().insert("2".into());

        let err = gallery.delete_selected().await.unwrap_err();
        match err {
            Error::DeleteFailed {
                requested, deleted, ..
            } => {
                assert_eq!(requested.len(), 3);
                assert_eq!(deleted, vec!["1".to_string(), "gone".to_string()]);
            }
            other => panic!("Expected DeleteFailed, got {other:?}"),
        }

        let state = gallery.snapshot();
        assert!(!state.photos.contains_key("1"));
        assert!(state.photos.contains_key("2"));
        assert_eq!(state.selected_photos, vec!["2".to_string()]);
        assert!(state.photos["2"].selected);
    }

    #[tokio::test]
    async fn duplicate_delete_report_does_not_count_as_full_success() {
        let (gallery, source, _) = gallery(&["1", "2", "3"], 10);
        gallery.load_next_page().await.unwrap();
        gallery.set_selected_photos(vec!["1".into(), "2".into()]);
        source.stuck.lock().unwrap().insert("2".into());
        source.report_extra.lock().unwrap().push("1".into());

        let err = gallery.delete_selected().await.unwrap_err();
        assert!(matches!(err, Error::DeleteFailed { ref deleted, .. } if deleted == &["1".to_string()]));

        let state = gallery.snapshot();
        assert!(!state.photos.contains_key("1"));
        assert!(state.photos.contains_key("2"));
        assert_eq!(state.selected_photos, vec!["2".to_string()]);
        assert!(state.photos["2"].selected);
    }

    #[tokio::test]
    async fn unrequested_ids_in_delete_report_are_not_committed() {
        let (gallery, source, _) = gallery(&["1", "2", "3"], 10);
        gallery.load_next_page().await.unwrap();
        gallery.toggle_select("1");
        source.report_extra.lock().unwrap().push("3".into());

        let deleted = gallery.delete_selected().await.unwrap();
        assert_eq!(deleted, vec!["1".to_string()]);

        let state = gallery.snapshot();
        assert!(!state.photos.contains_key("1"));
        assert!(state.photos.contains_key("3"));
        assert!(state.selected_photos.is_empty());
    }

    #[tokio::test]
    async fn restore_applies_persisted_slices() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set(
            "gallery_photos",
            r#"{"1":{"id":"1","uri":"file:///1.jpg","selected":true}}"#,
        )
        .unwrap();
        kv.set(
            "gallery_albums",
            r#"{"a":{"id":"a","name":"Kept","photoIds":["1"],"type":"auto","timestamp":5}}"#,
        )
        .unwrap();
        let gallery = gallery_with(Arc::new(FakeSource::default()), kv, 10);

        gallery.restore().await;
        let state = gallery.snapshot();
        assert_eq!(state.photos.len(), 1);
        assert!(!state.photos["1"].selected);
        assert_eq!(state.albums["a"].name, "Kept");
    }

    #[tokio::test]
    async fn device_album_is_mirrored_into_store() {
        let (gallery, _, _) = gallery(&["1", "2"], 10);
        let album = gallery
            .create_device_album("Favorites", vec!["1".into(), "2".into()])
            .await
            .unwrap();
        let state = gallery.snapshot();
        assert_eq!(state.albums[&album.id].photo_ids.len(), 2);
        assert_eq!(state.albums[&album.id].name, "Favorites");
    }
}
