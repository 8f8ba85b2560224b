use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::{
    MimiError, MimiResult,
    assets::{Sprite, decode::decode_sprite},
};

/// Source of decoded sprites for a [`SpriteCache`].
#[async_trait]
pub trait SpriteLoader: Send + Sync {
    /// Read and decode the sprite named `path`.
    async fn load(&self, path: &str) -> MimiResult<Sprite>;
}

/// Loads sprites from files under a root directory.
#[derive(Clone, Debug)]
pub struct FsSpriteLoader {
    root: PathBuf,
}

impl FsSpriteLoader {
    /// Create a loader resolving sprite paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Asset root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl SpriteLoader for FsSpriteLoader {
    async fn load(&self, path: &str) -> MimiResult<Sprite> {
        let full = self.root.join(path);
        let bytes = tokio::fs::read(&full)
            .await
            .map_err(|e| MimiError::decode(path, format!("read '{}': {e}", full.display())))?;
        let owned = path.to_string();
        tokio::task::spawn_blocking(move || decode_sprite(&owned, &bytes))
            .await
            .map_err(|e| MimiError::decode(path, e.to_string()))?
    }
}

type Slot = Arc<OnceCell<Arc<Sprite>>>;

struct CacheInner {
    loader: Arc<dyn SpriteLoader>,
    slots: Mutex<HashMap<String, Slot>>,
    decodes: AtomicU64,
}

/// Memoizing sprite cache keyed by path.
///
/// The first request for a path starts a load; requests for the same path made while that load
/// is pending wait on it instead of starting another. Loaded sprites are kept for the lifetime
/// of the cache. A failed load is not memoized, so a later request tries again.
#[derive(Clone)]
pub struct SpriteCache {
    inner: Arc<CacheInner>,
}

impl SpriteCache {
    /// Create an empty cache over `loader`.
    pub fn new(loader: Arc<dyn SpriteLoader>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                loader,
                slots: Mutex::new(HashMap::new()),
                decodes: AtomicU64::new(0),
            }),
        }
    }

    /// Fetch a sprite, loading it on first use.
    pub async fn get(&self, path: &str) -> MimiResult<Arc<Sprite>> {
        let slot = self.slot(path);
        slot.get_or_try_init(|| self.load(path)).await.cloned()
    }

    /// Load several sprites in order, stopping at the first failure.
    pub async fn get_all(&self, paths: &[&str]) -> MimiResult<Vec<Arc<Sprite>>> {
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            out.push(self.get(path).await?);
        }
        Ok(out)
    }

    /// Return `true` once `path` has been loaded successfully.
    pub fn contains(&self, path: &str) -> bool {
        self.lock_slots()
            .get(path)
            .is_some_and(|slot| slot.initialized())
    }

    /// Number of loader invocations so far, failed ones included.
    pub fn decode_count(&self) -> u64 {
        self.inner.decodes.load(Ordering::Relaxed)
    }

    fn slot(&self, path: &str) -> Slot {
        self.lock_slots()
            .entry(path.to_string())
            .or_default()
            .clone()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn load(&self, path: &str) -> MimiResult<Arc<Sprite>> {
        self.inner.decodes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(path, "loading sprite");
        match self.inner.loader.load(path).await {
            Ok(sprite) => Ok(Arc::new(sprite)),
            Err(err) => {
                tracing::warn!(path, error = %err, "sprite load failed");
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for SpriteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpriteCache")
            .field("entries", &self.lock_slots().len())
            .field("decodes", &self.decode_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
