//! Write-behind persistence of the photo and album slices.
//!
//! Transitions hand serialized slices to a writer thread over a channel and
//! return immediately. Write failures are logged on that thread and never
//! reach the caller; storage is a cache, the media library stays
//! authoritative.

use crate::config::StorageKeys;
use crate::error::{Error, Result};
use crate::kv::KeyValueStore;
use crate::models::{AlbumMap, PhotoMap};
use crate::store::{GalleryState, Touched};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread;

enum Command {
    Write { key: String, payload: String },
    Flush(Sender<()>),
}

/// Slices found in storage at startup. `None` means absent or unreadable.
#[derive(Debug, Default, PartialEq)]
pub struct Restored {
    pub photos: Option<PhotoMap>,
    pub albums: Option<AlbumMap>,
}

pub struct PersistenceMirror {
    kv: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    tx: Option<Sender<Command>>,
    writer: Option<thread::JoinHandle<()>>,
}

impl PersistenceMirror {
    pub fn spawn(kv: Arc<dyn KeyValueStore>, keys: StorageKeys) -> Self {
        let (tx, rx) = unbounded::<Command>();
        let writer_kv = kv.clone();
        let writer = thread::Builder::new()
            .name("gallery-mirror".into())
            .spawn(move || run_writer(rx, writer_kv))
            .map_err(|err| log::error!("Failed to start persistence writer: {err}"))
            .ok();
        Self {
            kv,
            keys,
            tx: writer.as_ref().map(|_| tx),
            writer,
        }
    }

    /// Queues the slices `touched` names. Never blocks on storage.
    pub fn observe(&self, touched: Touched, state: &GalleryState) {
        if touched.photos {
            match encode_photos(&state.photos) {
                Ok(payload) => self.enqueue(&self.keys.photos, payload),
                Err(err) => log::error!("Failed to encode photos: {err}"),
            }
        }
        if touched.albums {
            match encode_albums(&state.albums) {
                Ok(payload) => self.enqueue(&self.keys.albums, payload),
                Err(err) => log::error!("Failed to encode albums: {err}"),
            }
        }
    }

    /// Resolves once every write queued before the call has been attempted.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else { return };
        let (ack_tx, ack_rx) = bounded(1);
        if tx.send(Command::Flush(ack_tx)).is_err() {
            return;
        }
        let _ = tokio::task::spawn_blocking(move || ack_rx.recv()).await;
    }

    pub async fn restore(&self) -> Restored {
        let kv = self.kv.clone();
        let keys = self.keys.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            (kv.get(&keys.photos), kv.get(&keys.albums))
        })
        .await;
        let (photos, albums) = match loaded {
            Ok(pair) => pair,
            Err(err) => {
                log::error!("Failed to load gallery data from local storage: {err}");
                return Restored::default();
            }
        };
        let restored = Restored {
            photos: decode_slice(photos, "photos", decode_photos),
            albums: decode_slice(albums, "albums", decode_albums),
        };
        log::info!(
            "Store initialized from local storage (photos loaded: {}, albums loaded: {})",
            restored.photos.is_some(),
            restored.albums.is_some()
        );
        restored
    }

    fn enqueue(&self, key: &str, payload: String) {
        let sent = self.tx.as_ref().map(|tx| {
            tx.send(Command::Write {
                key: key.to_string(),
                payload,
            })
        });
        if !matches!(sent, Some(Ok(()))) {
            log::error!(
                "{}",
                Error::PersistenceWriteFailed(format!("{key}: writer unavailable"))
            );
        }
    }
}

impl Drop for PersistenceMirror {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}

fn run_writer(rx: Receiver<Command>, kv: Arc<dyn KeyValueStore>) {
    while let Ok(first) = rx.recv() {
        // Coalesce a burst of transitions into one write per key.
        let mut pending: Vec<(String, String)> = Vec::new();
        let mut acks = Vec::new();
        for command in std::iter::once(first).chain(rx.try_iter()) {
            match command {
                Command::Write { key, payload } => {
                    match pending.iter_mut().find(|(k, _)| *k == key) {
                        Some(slot) => slot.1 = payload,
                        None => pending.push((key, payload)),
                    }
                }
                Command::Flush(ack) => acks.push(ack),
            }
        }
        for (key, payload) in pending {
            match kv.set(&key, &payload) {
                Ok(()) => log::debug!("Saved {key} to local storage"),
                Err(err) => log::error!(
                    "{}",
                    Error::PersistenceWriteFailed(format!("{key}: {err}"))
                ),
            }
        }
        for ack in acks {
            let _ = ack.send(());
        }
    }
    log::debug!("Persistence writer stopped");
}

fn decode_slice<T>(
    raw: Result<Option<String>>,
    label: &str,
    decode: fn(&str) -> Result<T>,
) -> Option<T> {
    match raw {
        Ok(Some(json)) => match decode(&json) {
            Ok(slice) => Some(slice),
            Err(err) => {
                log::error!("Discarding unreadable stored {label}: {err}");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            log::error!("Failed to read stored {label}: {err}");
            None
        }
    }
}

pub fn encode_photos(photos: &PhotoMap) -> Result<String> {
    Ok(serde_json::to_string(photos)?)
}

pub fn encode_albums(albums: &AlbumMap) -> Result<String> {
    Ok(serde_json::to_string(albums)?)
}

/// Rekeys by record id so the map key always matches the stored record.
pub fn decode_photos(json: &str) -> Result<PhotoMap> {
    let photos: PhotoMap = serde_json::from_str(json)?;
    Ok(photos
        .into_values()
        .map(|photo| (photo.id.clone(), photo))
        .collect())
}

pub fn decode_albums(json: &str) -> Result<AlbumMap> {
    let albums: AlbumMap = serde_json::from_str(json)?;
    Ok(albums
        .into_values()
        .map(|album| (album.id.clone(), album))
        .collect())
}
