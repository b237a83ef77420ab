//! Normalized gallery state and the reducer that owns every mutation of it.
//!
//! Transitions are synchronous and total: [`GalleryState::apply`] never
//! suspends and never fails. Results of asynchronous page fetches carry the
//! generation they were started under; anything older than the current
//! generation is dropped instead of merged.

use crate::models::{Album, AlbumMap, AlbumPatch, Page, Photo, PhotoMap, PhotoPatch};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryState {
    pub photos: PhotoMap,
    pub albums: AlbumMap,
    pub selected_photos: Vec<String>,
    pub loading: bool,
    pub error: Option<String>,
    pub has_next_page: bool,
    /// Empty string means the start of the collection.
    pub end_cursor: String,
    /// Bumped by every reset; fetches started under an older value are stale.
    pub generation: u64,
}

impl Default for GalleryState {
    fn default() -> Self {
        Self {
            photos: PhotoMap::new(),
            albums: AlbumMap::new(),
            selected_photos: Vec::new(),
            loading: false,
            error: None,
            has_next_page: true,
            end_cursor: String::new(),
            generation: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    BeginLoad,
    PageLoaded { generation: u64, page: Page },
    PageFailed { generation: u64, message: String },
    Reset,
    SetPhotos(PhotoMap),
    SetAlbums(AlbumMap),
    AddPhoto(Photo),
    UpdatePhoto { id: String, patch: PhotoPatch },
    DeletePhoto(String),
    DeletePhotosConfirmed(Vec<String>),
    ToggleSelect(String),
    SetSelectedPhotos(Vec<String>),
    ClearSelection,
    AddAlbum(Album),
    UpdateAlbum { id: String, patch: AlbumPatch },
    DeleteAlbum(String),
    SetError(Option<String>),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::BeginLoad => "beginLoad",
            Action::PageLoaded { .. } => "pageLoaded",
            Action::PageFailed { .. } => "pageFailed",
            Action::Reset => "reset",
            Action::SetPhotos(_) => "setPhotos",
            Action::SetAlbums(_) => "setAlbums",
            Action::AddPhoto(_) => "addPhoto",
            Action::UpdatePhoto { .. } => "updatePhoto",
            Action::DeletePhoto(_) => "deletePhoto",
            Action::DeletePhotosConfirmed(_) => "deletePhotosConfirmed",
            Action::ToggleSelect(_) => "toggleSelect",
            Action::SetSelectedPhotos(_) => "setSelectedPhotos",
            Action::ClearSelection => "clearSelection",
            Action::AddAlbum(_) => "addAlbum",
            Action::UpdateAlbum { .. } => "updateAlbum",
            Action::DeleteAlbum(_) => "deleteAlbum",
            Action::SetError(_) => "setError",
        }
    }
}

/// Which persisted slices a transition changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Touched {
    pub photos: bool,
    pub albums: bool,
}

impl Touched {
    pub const NONE: Touched = Touched {
        photos: false,
        albums: false,
    };
    pub const PHOTOS: Touched = Touched {
        photos: true,
        albums: false,
    };
    pub const ALBUMS: Touched = Touched {
        photos: false,
        albums: true,
    };
    pub const BOTH: Touched = Touched {
        photos: true,
        albums: true,
    };

    pub fn any(self) -> bool {
        self.photos || self.albums
    }
}

impl GalleryState {
    pub fn apply(&mut self, action: Action) -> Touched {
        let name = action.name();
        let touched = match action {
            Action::BeginLoad => {
                self.loading = true;
                self.error = None;
                Touched::NONE
            }
            Action::PageLoaded { generation, page } => {
                if generation != self.generation {
                    log::debug!(
                        "Discarding stale page from generation {generation} (current {})",
                        self.generation
                    );
                    return Touched::NONE;
                }
                if !self.loading {
                    log::warn!("Ignoring page that arrived with no load in flight");
                    return Touched::NONE;
                }
                let count = page.assets.len();
                for photo in page.assets {
                    self.upsert_photo(photo);
                }
                self.has_next_page = page.has_next_page;
                self.end_cursor = page.end_cursor;
                self.loading = false;
                log::debug!(
                    "Merged {count} photos, total {}, has_next_page={}",
                    self.photos.len(),
                    self.has_next_page
                );
                Touched::PHOTOS
            }
            Action::PageFailed {
                generation,
                message,
            } => {
                if generation != self.generation {
                    log::debug!("Discarding stale failure from generation {generation}");
                    return Touched::NONE;
                }
                if !self.loading {
                    log::warn!("Ignoring failure that arrived with no load in flight");
                    return Touched::NONE;
                }
                self.loading = false;
                self.error = Some(message);
                Touched::NONE
            }
            Action::Reset => {
                self.generation += 1;
                self.photos.clear();
                self.albums.clear();
                self.selected_photos.clear();
                self.has_next_page = true;
                self.end_cursor.clear();
                self.loading = false;
                self.error = None;
                Touched::BOTH
            }
            Action::SetPhotos(photos) => {
                self.photos = photos;
                let selected: HashSet<&String> = self.selected_photos.iter().collect();
                for (id, photo) in self.photos.iter_mut() {
                    photo.selected = selected.contains(id);
                }
                log::debug!("Setting all photos, count {}", self.photos.len());
                Touched::PHOTOS
            }
            Action::SetAlbums(albums) => {
                log::debug!("Setting all albums, count {}", albums.len());
                self.albums = albums;
                Touched::ALBUMS
            }
            Action::AddPhoto(photo) => {
                self.upsert_photo(photo);
                Touched::PHOTOS
            }
            Action::UpdatePhoto { id, patch } => match self.photos.get_mut(&id) {
                Some(photo) => {
                    photo.apply(patch);
                    Touched::PHOTOS
                }
                None => Touched::NONE,
            },
            Action::DeletePhoto(id) => self.remove_photos(&[id]),
            Action::DeletePhotosConfirmed(ids) => self.remove_photos(&ids),
            Action::ToggleSelect(id) => {
                let flag = match self.selected_photos.iter().position(|s| *s == id) {
                    Some(pos) => {
                        self.selected_photos.remove(pos);
                        false
                    }
                    None => {
                        self.selected_photos.push(id.clone());
                        true
                    }
                };
                if let Some(photo) = self.photos.get_mut(&id) {
                    photo.selected = flag;
                }
                Touched::NONE
            }
            Action::SetSelectedPhotos(ids) => {
                self.clear_selection();
                let mut seen = HashSet::new();
                for id in ids {
                    if seen.insert(id.clone()) {
                        if let Some(photo) = self.photos.get_mut(&id) {
                            photo.selected = true;
                        }
                        self.selected_photos.push(id);
                    }
                }
                Touched::NONE
            }
            Action::ClearSelection => {
                self.clear_selection();
                Touched::NONE
            }
            Action::AddAlbum(album) => {
                log::debug!("Adding album {} ({})", album.id, album.name);
                self.albums.insert(album.id.clone(), album);
                Touched::ALBUMS
            }
            Action::UpdateAlbum { id, patch } => match self.albums.get_mut(&id) {
                Some(album) => {
                    album.apply(patch);
                    Touched::ALBUMS
                }
                None => Touched::NONE,
            },
            Action::DeleteAlbum(id) => {
                if self.albums.remove(&id).is_some() {
                    Touched::ALBUMS
                } else {
                    Touched::NONE
                }
            }
            Action::SetError(error) => {
                self.error = error;
                Touched::NONE
            }
        };
        log::debug!("Applied {name}");
        touched
    }

    /// Well-formed photos, newest first. Photos without a creation time sort last.
    pub fn photos_view(&self) -> Vec<&Photo> {
        let mut photos: Vec<&Photo> = self
            .photos
            .values()
            .filter(|photo| photo.is_well_formed())
            .collect();
        photos.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id.cmp(&b.id))
        });
        photos
    }

    pub fn selected_count(&self) -> usize {
        self.selected_photos.len()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected_photos.iter().any(|s| s == id)
    }

    /// Full-record overwrite; the selection flag follows the selection list.
    fn upsert_photo(&mut self, mut photo: Photo) {
        photo.selected = self.is_selected(&photo.id);
        self.photos.insert(photo.id.clone(), photo);
    }

    fn clear_selection(&mut self) {
        for id in self.selected_photos.drain(..) {
            if let Some(photo) = self.photos.get_mut(&id) {
                photo.selected = false;
            }
        }
    }

    fn remove_photos(&mut self, ids: &[String]) -> Touched {
        let ids: HashSet<&String> = ids.iter().collect();
        let mut touched = Touched::NONE;

        let before = self.photos.len();
        self.photos.retain(|id, _| !ids.contains(id));
        touched.photos = self.photos.len() != before;

        self.selected_photos.retain(|id| !ids.contains(id));

        for album in self.albums.values_mut() {
            let before = album.photo_ids.len();
            album.photo_ids.retain(|id| !ids.contains(id));
            touched.albums |= album.photo_ids.len() != before;
        }
        touched
    }
}
