//! Per-session cart registry.
//!
//! Each client session owns one `CartStore`. The registry restores a cart
//! from its session storage on first use and hands out a shared handle for
//! later requests, so one session's requests serialize on its cart lock
//! while different sessions proceed independently.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cart::{
    CartStore, FileSessionStorage, InMemorySessionStorage, SessionStorage, StorageError,
};
use store::ProductCatalog;
use tokio::sync::Mutex;

use crate::error::ApiError;

const MAX_SESSION_ID_LEN: usize = 64;

/// Session storage selected at startup.
#[derive(Debug, Clone)]
pub enum SessionBackend {
    Memory(InMemorySessionStorage),
    File(FileSessionStorage),
}

impl SessionStorage for SessionBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self {
            SessionBackend::Memory(storage) => storage.get(key),
            SessionBackend::File(storage) => storage.get(key),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        match self {
            SessionBackend::Memory(storage) => storage.set(key, value),
            SessionBackend::File(storage) => storage.set(key, value),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self {
            SessionBackend::Memory(storage) => storage.remove(key),
            SessionBackend::File(storage) => storage.remove(key),
        }
    }
}

/// Handle to one session's cart.
pub type SharedCart = Arc<Mutex<CartStore<SessionBackend>>>;

/// Default number of carts kept in memory.
pub const DEFAULT_SESSION_CAPACITY: usize = 10_000;

/// Default idle time after which a cart is dropped from memory.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

struct Entry {
    cart: SharedCart,
    last_used: Instant,
}

/// Lazily restored carts keyed by session id.
///
/// Carts idle longer than the idle limit are evicted, and when the registry
/// is full the least recently used cart goes first. Only carts no request
/// is holding are evicted. An evicted on-disk cart is restored from its
/// directory on next use; an evicted in-memory cart is gone, which is how
/// in-memory sessions expire.
pub struct SessionRegistry {
    root: Option<PathBuf>,
    capacity: usize,
    idle_limit: Duration,
    carts: Mutex<HashMap<String, Entry>>,
}

impl SessionRegistry {
    /// Keeps session storage in memory only.
    pub fn in_memory() -> Self {
        Self {
            root: None,
            capacity: DEFAULT_SESSION_CAPACITY,
            idle_limit: DEFAULT_SESSION_IDLE,
            carts: Mutex::new(HashMap::new()),
        }
    }

    /// Persists each session's cart under `root/<session id>/`.
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::in_memory()
        }
    }

    /// Caps the number of carts in memory and how long they may sit idle.
    pub fn with_limits(mut self, capacity: usize, idle_limit: Duration) -> Self {
        self.capacity = capacity.max(1);
        self.idle_limit = idle_limit;
        self
    }

    pub fn idle_limit(&self) -> Duration {
        self.idle_limit
    }

    /// Returns the cart for `session_id`, restoring it from storage against
    /// the current catalog the first time the session is seen.
    #[tracing::instrument(skip(self, catalog))]
    pub async fn get_or_restore<P: ProductCatalog>(
        &self,
        session_id: &str,
        catalog: &P,
    ) -> Result<SharedCart, ApiError> {
        validate_session_id(session_id)?;

        if let Some(entry) = self.carts.lock().await.get_mut(session_id) {
            entry.last_used = Instant::now();
            return Ok(entry.cart.clone());
        }

        let storage = self.open_storage(session_id)?;
        let entries = CartStore::load_entries(&storage);
        let ids: Vec<_> = entries.iter().map(|e| e.product_id.clone()).collect();
        let products = if ids.is_empty() {
            Vec::new()
        } else {
            catalog.get_products(&ids).await?
        };
        let restored = CartStore::restore(storage, &products);
        tracing::debug!(lines = restored.len(), "session cart restored");

        let now = Instant::now();
        let mut carts = self.carts.lock().await;
        if let Some(entry) = carts.get_mut(session_id) {
            // Restored concurrently by another request.
            entry.last_used = now;
            return Ok(entry.cart.clone());
        }

        self.evict_idle_locked(&mut carts, now);
        self.evict_lru_locked(&mut carts);

        let cart = Arc::new(Mutex::new(restored));
        carts.insert(
            session_id.to_string(),
            Entry {
                cart: cart.clone(),
                last_used: now,
            },
        );
        metrics::gauge!("cart_sessions_active").set(carts.len() as f64);
        Ok(cart)
    }

    /// Drops carts idle past the limit. Returns how many were evicted.
    pub async fn evict_idle(&self) -> usize {
        let mut carts = self.carts.lock().await;
        let evicted = self.evict_idle_locked(&mut carts, Instant::now());
        metrics::gauge!("cart_sessions_active").set(carts.len() as f64);
        evicted
    }

    /// Number of sessions with a cart in memory.
    pub async fn len(&self) -> usize {
        self.carts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.carts.lock().await.is_empty()
    }

    fn evict_idle_locked(&self, carts: &mut HashMap<String, Entry>, now: Instant) -> usize {
        let idle: Vec<String> = carts
            .iter()
            .filter(|(_, entry)| {
                is_unused(entry) && now.duration_since(entry.last_used) >= self.idle_limit
            })
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &idle {
            self.release(carts, session_id, "idle");
        }
        idle.len()
    }

    /// Makes room for one more cart.
    fn evict_lru_locked(&self, carts: &mut HashMap<String, Entry>) {
        while carts.len() >= self.capacity {
            let oldest = carts
                .iter()
                .filter(|(_, entry)| is_unused(entry))
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(session_id) => self.release(carts, &session_id, "capacity"),
                // Every cart is in use; go over capacity until one frees up.
                None => break,
            }
        }
    }

    fn release(&self, carts: &mut HashMap<String, Entry>, session_id: &str, reason: &'static str) {
        let Some(entry) = carts.remove(session_id) else {
            return;
        };

        let mut empty = false;
        if let Ok(mut cart) = entry.cart.try_lock() {
            if !cart.flush() {
                tracing::warn!(%session_id, "evicting cart whose last change was not persisted");
            }
            empty = cart.is_empty();
        }

        if let (true, Some(root)) = (empty, &self.root) {
            if let Err(e) = std::fs::remove_dir_all(root.join(session_id)) {
                tracing::debug!(%session_id, error = %e, "could not remove empty session directory");
            }
        }

        metrics::counter!("cart_sessions_evicted_total", "reason" => reason).increment(1);
        tracing::debug!(%session_id, reason, "session cart evicted");
    }

    fn open_storage(&self, session_id: &str) -> Result<SessionBackend, ApiError> {
        match &self.root {
            None => Ok(SessionBackend::Memory(InMemorySessionStorage::new())),
            Some(root) => FileSessionStorage::open(root.join(session_id))
                .map(SessionBackend::File)
                .map_err(|e| ApiError::Internal(format!("session storage: {e}"))),
        }
    }
}

/// True when only the registry holds the cart, so no request can be using it.
fn is_unused(entry: &Entry) -> bool {
    Arc::strong_count(&entry.cart) == 1
}

fn validate_session_id(session_id: &str) -> Result<(), ApiError> {
    let valid = !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "invalid session id: {session_id:?}"
        )))
    }
}
