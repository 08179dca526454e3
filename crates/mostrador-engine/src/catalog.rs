//! # Catalog Mirror
//!
//! Local lookup table of the backend catalog.
//!
//! ## Refresh Triggers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   heartbeat (10s) ──────────────────────────┐                           │
//! │                                             ▼                           │
//! │   version poll (5s) ── version > last? ──► refresh_all() ──► swap table │
//! │                              │ no                │ error                │
//! │                              ▼                   ▼                      │
//! │                          nothing          keep old table, stale = true  │
//! │                                                                         │
//! │   hard purge (5min) ── clear table ──► refetch table + version (quiet)  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A refresh only swaps this table. Lines already in the cart keep the
//! prices they were added with; checkout re-checks their product ids
//! against whatever the table holds at submit time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use mostrador_core::validation::validate_search_query;
use mostrador_core::Product;

use crate::backend::Backend;
use crate::error::{EngineError, EngineResult};
use crate::notice::{CheckoutEventEmitter, Notice};

/// How many results the name search returns at most.
pub const SEARCH_LIMIT: usize = 50;

// =============================================================================
// Sync State
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogSyncState {
    /// Last version counter seen from the backend. 0 after a purge.
    pub last_version: i64,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Set by a failed refresh, cleared by the next successful one.
    pub stale: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct MirrorTable {
    products: HashMap<i64, Product>,
    /// Normalized code → product id.
    by_code: HashMap<String, i64>,
    state: CatalogSyncState,
}

impl MirrorTable {
    fn replace(&mut self, products: Vec<Product>) -> usize {
        self.products.clear();
        self.by_code.clear();
        for product in products.into_iter().filter(|p| p.active) {
            if let Some(code) = product.code.as_deref() {
                self.by_code.insert(normalize_code(code), product.id);
            }
            self.products.insert(product.id, product);
        }
        self.products.len()
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

// =============================================================================
// Mirror
// =============================================================================

/// Shared handle to the catalog mirror. Cheap to clone.
#[derive(Clone)]
pub struct CatalogMirror {
    table: Arc<RwLock<MirrorTable>>,
    backend: Arc<dyn Backend>,
    emitter: Arc<dyn CheckoutEventEmitter>,
    /// Serializes refreshes coming from different timers.
    refresh_lock: Arc<Mutex<()>>,
}

impl CatalogMirror {
    pub fn new(backend: Arc<dyn Backend>, emitter: Arc<dyn CheckoutEventEmitter>) -> Self {
        CatalogMirror {
            table: Arc::new(RwLock::new(MirrorTable::default())),
            backend,
            emitter,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn get(&self, id: i64) -> Option<Product> {
        self.table.read().await.products.get(&id).cloned()
    }

    pub async fn contains(&self, id: i64) -> bool {
        self.table.read().await.products.contains_key(&id)
    }

    /// Ids currently in the mirror.
    pub async fn known_ids(&self) -> HashSet<i64> {
        self.table.read().await.products.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.products.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Exact code match, ignoring case and surrounding whitespace.
    pub async fn find_by_code(&self, code: &str) -> Option<Product> {
        let table = self.table.read().await;
        table
            .by_code
            .get(&normalize_code(code))
            .and_then(|id| table.products.get(id))
            .cloned()
    }

    /// Case-insensitive name search, also matching code prefixes.
    ///
    /// Results are sorted by name and capped at [`SEARCH_LIMIT`].
    pub async fn search(&self, query: &str) -> EngineResult<Vec<Product>> {
        let query = validate_search_query(query).map_err(mostrador_core::CoreError::from)?;
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let needle = query.to_lowercase();

        let table = self.table.read().await;
        let mut found: Vec<Product> = table
            .products
            .values()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p
                        .code
                        .as_deref()
                        .map(|c| c.to_lowercase().starts_with(&needle))
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        found.truncate(SEARCH_LIMIT);
        Ok(found)
    }

    /// True when some product name contains `query` (case-insensitive).
    pub async fn has_name_matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        self.table
            .read()
            .await
            .products
            .values()
            .any(|p| p.name.to_lowercase().contains(&needle))
    }

    /// Resolves a scan code: mirror first, then the backend.
    ///
    /// `Ok(None)` when neither knows the code. Inactive products found
    /// through the backend are treated as unknown.
    pub async fn lookup_code(&self, code: &str) -> EngineResult<Option<Product>> {
        if let Some(product) = self.find_by_code(code).await {
            return Ok(Some(product));
        }
        debug!(code, "Code not in mirror, asking backend");
        let product = self.backend.product_by_code(code.trim()).await?;
        Ok(product.filter(|p| p.active))
    }

    pub async fn current_version(&self) -> i64 {
        self.table.read().await.state.last_version
    }

    pub async fn sync_state(&self) -> CatalogSyncState {
        self.table.read().await.state.clone()
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Replaces the whole table with the backend catalog.
    ///
    /// On failure the previous table stays in place, the mirror is marked
    /// stale and a notice is emitted the first time it goes stale.
    pub async fn refresh_all(&self) -> EngineResult<usize> {
        let _refresh = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> EngineResult<usize> {
        match self.backend.fetch_products().await {
            Ok(products) => {
                let mut table = self.table.write().await;
                let count = table.replace(products);
                table.state.last_synced_at = Some(Utc::now());
                table.state.stale = false;
                table.state.last_error = None;
                debug!(count, "Catalog mirror refreshed");
                Ok(count)
            }
            Err(e) => {
                self.mark_stale(&e).await;
                Err(e)
            }
        }
    }

    /// Refreshes only when the backend version moved past the last one seen.
    ///
    /// Returns true when a refresh happened. Emits `CatalogUpdated` after
    /// each successful one.
    pub async fn check_version(&self) -> EngineResult<bool> {
        let _refresh = self.refresh_lock.lock().await;

        let remote = match self.backend.catalog_version().await {
            Ok(v) => v,
            Err(e) => {
                self.mark_stale(&e).await;
                return Err(e);
            }
        };

        let local = self.table.read().await.state.last_version;
        if remote <= local {
            debug!(local, remote, "Catalog version unchanged");
            return Ok(false);
        }

        let count = self.refresh_locked().await?;
        self.table.write().await.state.last_version = remote;

        info!(version = remote, count, "Catalog updated");
        self.emitter.emit(Notice::CatalogUpdated { version: remote });
        Ok(true)
    }

    /// Clears the table and resets the version counter to 0.
    pub async fn hard_purge(&self) {
        let _refresh = self.refresh_lock.lock().await;
        self.purge_locked().await;
    }

    async fn purge_locked(&self) {
        let mut table = self.table.write().await;
        table.products.clear();
        table.by_code.clear();
        table.state.last_version = 0;
        info!("Catalog mirror purged");
    }

    /// Version check, falling back to a full refresh when the version did
    /// not move (a backend that never bumps it, or a fresh mirror at 0).
    pub async fn reload(&self) -> EngineResult<()> {
        if !self.check_version().await? {
            self.refresh_all().await?;
        }
        Ok(())
    }

    /// Purge followed by an immediate refetch, so the table is only empty
    /// for the duration of one fetch.
    ///
    /// The version counter is restored from the backend without a
    /// `CatalogUpdated` notice: nothing changed from the cashier's view.
    pub async fn purge_and_reload(&self) -> EngineResult<()> {
        let _refresh = self.refresh_lock.lock().await;
        self.purge_locked().await;

        let remote = match self.backend.catalog_version().await {
            Ok(v) => v,
            Err(e) => {
                self.mark_stale(&e).await;
                return Err(e);
            }
        };
        let count = self.refresh_locked().await?;
        self.table.write().await.state.last_version = remote;

        debug!(version = remote, count, "Catalog mirror reloaded after purge");
        Ok(())
    }

    async fn mark_stale(&self, err: &EngineError) {
        let mut table = self.table.write().await;
        let was_stale = table.state.stale;
        table.state.stale = true;
        table.state.last_error = Some(err.to_string());
        drop(table);

        warn!(error = %err, "Catalog refresh failed, keeping previous mirror");
        if !was_stale {
            self.emitter.emit(Notice::CatalogRefreshFailed {
                message: err.user_message(),
            });
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{product, FakeBackend};
    use crate::notice::ChannelEmitter;
    use std::sync::atomic::Ordering;

    fn mirror(backend: Arc<FakeBackend>) -> (CatalogMirror, tokio::sync::mpsc::UnboundedReceiver<Notice>) {
        let (emitter, rx) = ChannelEmitter::new();
        (CatalogMirror::new(backend, Arc::new(emitter)), rx)
    }

    #[tokio::test]
    async fn test_refresh_replaces_table_and_skips_inactive() {
        let mut inactive = product(3, "Descontinuado", 10);
        inactive.active = false;
        let backend = Arc::new(FakeBackend::with_products(vec![
            product(1, "Yerba", 100),
            product(2, "Azúcar", 80),
            inactive,
        ]));
        let (mirror, _rx) = mirror(backend.clone());

        assert_eq!(mirror.refresh_all().await.unwrap(), 2);
        assert!(mirror.contains(1).await);
        assert!(!mirror.contains(3).await);

        backend.set_products(vec![product(2, "Azúcar", 90)]);
        mirror.refresh_all().await.unwrap();
        assert!(!mirror.contains(1).await);
        assert_eq!(mirror.get(2).await.unwrap().retail_price.units(), 90);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_table() {
        let backend = Arc::new(FakeBackend::with_products(vec![product(1, "Yerba", 100)]));
        let (mirror, mut rx) = mirror(backend.clone());
        mirror.refresh_all().await.unwrap();

        backend.fail_fetch.store(true, Ordering::SeqCst);
        assert!(mirror.refresh_all().await.is_err());
        assert!(mirror.refresh_all().await.is_err());

        assert!(mirror.contains(1).await);
        let state = mirror.sync_state().await;
        assert!(state.stale);
        assert!(state.last_error.is_some());

        // One notice per transition into stale
        assert!(matches!(rx.try_recv(), Ok(Notice::CatalogRefreshFailed { .. })));
        assert!(rx.try_recv().is_err());

        backend.fail_fetch.store(false, Ordering::SeqCst);
        mirror.refresh_all().await.unwrap();
        assert!(!mirror.sync_state().await.stale);
    }

    #[tokio::test]
    async fn test_check_version_refreshes_only_on_increase() {
        let backend = Arc::new(FakeBackend::with_products(vec![product(1, "Yerba", 100)]));
        backend.version.store(5, Ordering::SeqCst);
        let (mirror, mut rx) = mirror(backend.clone());

        assert!(mirror.check_version().await.unwrap());
        assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv().unwrap(), Notice::CatalogUpdated { version: 5 });

        assert!(!mirror.check_version().await.unwrap());
        assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_purge_and_reload() {
        let backend = Arc::new(FakeBackend::with_products(vec![product(1, "Yerba", 100)]));
        backend.version.store(2, Ordering::SeqCst);
        let (mirror, mut rx) = mirror(backend.clone());
        mirror.check_version().await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), Notice::CatalogUpdated { version: 2 });

        mirror.hard_purge().await;
        assert!(mirror.is_empty().await);
        assert_eq!(mirror.current_version().await, 0);

        mirror.purge_and_reload().await.unwrap();
        assert_eq!(mirror.current_version().await, 2);
        assert!(mirror.contains(1).await);
        assert!(rx.try_recv().is_err());

        // The next version poll sees nothing new
        assert!(!mirror.check_version().await.unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reload_without_version_bump() {
        let backend = Arc::new(FakeBackend::with_products(vec![product(1, "Yerba", 100)]));
        let (mirror, mut rx) = mirror(backend.clone());

        mirror.reload().await.unwrap();
        assert!(mirror.contains(1).await);
        assert_eq!(mirror.current_version().await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_code_lookup_falls_back_to_backend() {
        let mut listed = product(1, "Yerba", 100);
        listed.code = Some("779001".into());
        let mut remote = product(9, "Fernet", 900);
        remote.code = Some("779009".into());

        let backend = Arc::new(FakeBackend::with_products(vec![listed]));
        backend.by_code.lock().unwrap().push(remote);
        let (mirror, _rx) = mirror(backend);
        mirror.refresh_all().await.unwrap();

        assert_eq!(mirror.lookup_code(" 779001 ").await.unwrap().unwrap().id, 1);
        assert_eq!(mirror.lookup_code("779009").await.unwrap().unwrap().id, 9);
        assert!(mirror.lookup_code("000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search() {
        let backend = Arc::new(FakeBackend::with_products(vec![
            product(1, "Queso cremoso", 100),
            product(2, "Queso rallado", 80),
            product(3, "Yerba", 50),
        ]));
        let (mirror, _rx) = mirror(backend);
        mirror.refresh_all().await.unwrap();

        let found = mirror.search("QUESO").await.unwrap();
        assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(mirror.search("   ").await.unwrap().is_empty());
        assert!(mirror.has_name_matches("yer").await);
        assert!(!mirror.has_name_matches("779").await);
    }
}
