use crate::error::{Error, Result};
use crate::kv::KeyValueStore;
use crate::models::{PermissionGrant, PermissionStatus};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Platform media-library permission API.
#[async_trait]
pub trait MediaPermissions: Send + Sync {
    /// Current status without prompting.
    async fn status(&self) -> Result<PermissionStatus>;

    /// Prompts the user when the platform allows it.
    async fn request(&self) -> Result<PermissionStatus>;
}

/// Caches the last permission outcome and re-validates it on demand.
pub struct PermissionGate {
    permissions: Arc<dyn MediaPermissions>,
    kv: Arc<dyn KeyValueStore>,
    cache_key: String,
    settle_delay: Duration,
    stored: OnceCell<Option<PermissionGrant>>,
    latest: Mutex<Option<PermissionGrant>>,
}

impl PermissionGate {
    pub fn new(
        permissions: Arc<dyn MediaPermissions>,
        kv: Arc<dyn KeyValueStore>,
        cache_key: impl Into<String>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            permissions,
            kv,
            cache_key: cache_key.into(),
            settle_delay,
            stored: OnceCell::new(),
            latest: Mutex::new(None),
        }
    }

    /// Resolves to `Ok(true)` when access is granted and fails with
    /// [`Error::PermissionDenied`] otherwise. A cached grant short-circuits
    /// unless `force_request` is set.
    pub async fn ensure_granted(&self, force_request: bool) -> Result<bool> {
        let cached = self.cached().await;
        if !force_request && cached.map(|grant| grant.granted).unwrap_or(false) {
            log::debug!("Media permission granted (cached)");
            return Ok(true);
        }

        let mut status = self.permissions.status().await?;
        let mut freshly_granted = false;
        if !status.is_granted() {
            log::info!("Media permission is {status:?}, requesting");
            status = self.permissions.request().await?;
            freshly_granted = status.is_granted();
        }

        let grant = PermissionGrant::from(status);
        self.remember(grant).await;

        if !grant.granted {
            log::warn!("Media permission denied");
            return Err(Error::PermissionDenied);
        }
        if freshly_granted && !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        Ok(true)
    }

    /// Last known grant, loading the persisted record once per gate.
    pub async fn cached(&self) -> Option<PermissionGrant> {
        let latest = *self.latest.lock().unwrap_or_else(|e| e.into_inner());
        if latest.is_some() {
            return latest;
        }
        *self.stored.get_or_init(|| self.load_stored()).await
    }

    async fn load_stored(&self) -> Option<PermissionGrant> {
        let kv = self.kv.clone();
        let key = self.cache_key.clone();
        let raw = match tokio::task::spawn_blocking(move || kv.get(&key)).await {
            Ok(Ok(raw)) => raw?,
            Ok(Err(err)) => {
                log::warn!("Failed to read cached media permission: {err}");
                return None;
            }
            Err(err) => {
                log::warn!("Permission cache task failed: {err}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(grant) => Some(grant),
            Err(err) => {
                log::warn!("Ignoring unreadable media permission cache: {err}");
                None
            }
        }
    }

    async fn remember(&self, grant: PermissionGrant) {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(grant);

        let payload = match serde_json::to_string(&grant) {
            Ok(payload) => payload,
            Err(err) => {
                log::error!("Failed to encode media permission: {err}");
                return;
            }
        };
        let kv = self.kv.clone();
        let key = self.cache_key.clone();
        let result = tokio::task::spawn_blocking(move || kv.set(&key, &payload)).await;
        match result {
            Ok(Ok(())) => log::debug!("Cached media permission {:?}", grant.status),
            Ok(Err(err)) => log::error!("{}", Error::PersistenceWriteFailed(err.to_string())),
            Err(err) => log::error!("{}", Error::PersistenceWriteFailed(err.to_string())),
        }
    }
}
