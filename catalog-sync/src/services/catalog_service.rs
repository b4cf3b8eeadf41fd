//! Catalog Service - built-in catalog plus admin overlay, cached and observable
//!
//! Every mutation goes through [`OverlayTxn`]: load the overlay, modify,
//! validate ids, persist, invalidate the read cache, and only then announce
//! on the [`ChangeBus`]. A subscriber that reads during the announcement
//! therefore sees the write. Other sessions hear of the write only after the
//! write lock is released, so their handlers may read and write through this
//! session.

use crate::catalog::classifier::CategoryScheme;
use crate::catalog::ids::find_collisions;
use crate::catalog::{
    IdAllocator, IdPartition, MergedView, ReadCache, ReservedId, ViewNamespace, builtin_catalog,
    merge,
};
use crate::core::Config;
use crate::db::{PersistentStore, SessionId, StorageEvent, StoreResult};
use crate::message::{ChangeBus, ChangeChannel, ChangeEvent, Subscription};
use crate::utils::{CatalogError, CatalogResult};
use parking_lot::Mutex;
use shared::models::{CatalogEntry, OverlayCreate, OverlayEntry, OverlayUpdate, PRICE_ON_REQUEST};
use shared::util::now_millis;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Whether a committed write is announced on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notify {
    Broadcast,
    /// Bulk and migration writes before anything subscribes
    Suppress,
}

struct ServiceInner {
    store: PersistentStore,
    builtin: Arc<[CatalogEntry]>,
    cache: ReadCache,
    bus: ChangeBus,
    /// Shared by every session over the same store
    ids: Arc<IdAllocator>,
    /// Serializes load-modify-save within this session
    write_lock: Mutex<()>,
    watch_id: u64,
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        self.store.unwatch(self.watch_id);
    }
}

/// Unified catalog service (one per session)
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<ServiceInner>,
}

impl std::fmt::Debug for CatalogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogService")
            .field("session", &self.inner.store.session())
            .field("builtin_count", &self.inner.builtin.len())
            .field("cache_ttl", &self.inner.cache.ttl())
            .finish()
    }
}

static GLOBAL: OnceLock<Option<CatalogService>> = OnceLock::new();

impl CatalogService {
    /// Open the service described by `config`
    pub fn open(config: &Config) -> StoreResult<Self> {
        let store = match &config.db_path {
            Some(path) => PersistentStore::open(path)?,
            None => PersistentStore::open_in_memory()?,
        };
        tracing::info!(session = %store.session(), path = ?config.db_path, "📦 CatalogService: store opened");
        Ok(Self::with_parts(
            store,
            builtin_catalog(),
            config.cache_ttl,
            Arc::new(IdAllocator::new()),
        ))
    }

    /// Assemble a service from explicit parts
    pub fn with_parts(
        store: PersistentStore,
        builtin: Arc<[CatalogEntry]>,
        cache_ttl: Duration,
        ids: Arc<IdAllocator>,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &std::sync::Weak<ServiceInner>| {
            let weak = weak.clone();
            // Writes from other sessions: same treatment as a local write
            let watch_id = store.watch(move |event| {
                if let Some(inner) = weak.upgrade() {
                    tracing::debug!(key = %event.key, origin = %event.origin, "Storage changed by another session");
                    inner.cache.invalidate();
                    inner.bus.publish(ChangeEvent::StorageChanged {
                        key: event.key.clone(),
                    });
                }
            });
            ServiceInner {
                store,
                builtin,
                cache: ReadCache::new(cache_ttl),
                bus: ChangeBus::new(),
                ids,
                write_lock: Mutex::new(()),
                watch_id,
            }
        });
        Self { inner }
    }

    /// Process-wide instance, opened from the environment on first access
    ///
    /// Falls back to an in-memory store if the configured one cannot be
    /// opened; `None` only if that fails too.
    pub fn global() -> Option<&'static CatalogService> {
        GLOBAL
            .get_or_init(|| {
                let config = Config::from_env();
                let e = match Self::open(&config) {
                    Ok(service) => return Some(service),
                    Err(e) => e,
                };
                tracing::error!(error = %e, "Catalog store unavailable, using in-memory store");
                match PersistentStore::open_in_memory() {
                    Ok(store) => Some(Self::with_parts(
                        store,
                        builtin_catalog(),
                        config.cache_ttl,
                        Arc::new(IdAllocator::new()),
                    )),
                    Err(e) => {
                        tracing::error!(error = %e, "In-memory catalog store unavailable");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Another session (tab) over the same store
    ///
    /// Shares storage and id reservations, has its own cache and bus.
    pub fn open_session(&self) -> Self {
        Self::with_parts(
            self.inner.store.fork_session(),
            self.inner.builtin.clone(),
            self.inner.cache.ttl(),
            self.inner.ids.clone(),
        )
    }

    pub fn session(&self) -> SessionId {
        self.inner.store.session()
    }

    pub fn store(&self) -> &PersistentStore {
        &self.inner.store
    }

    pub fn builtin(&self) -> &[CatalogEntry] {
        &self.inner.builtin
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.inner.bus
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// The merged view (cached)
    pub fn all(&self) -> Arc<MergedView> {
        self.inner.cache.read(|| {
            let overlay = self.inner.store.load_overlay();
            merge(&self.inner.builtin, &overlay)
        })
    }

    pub fn by_category<K: CategoryScheme>(&self, key: K) -> Vec<CatalogEntry> {
        self.all().by_category(key)
    }

    pub fn featured(&self) -> Vec<CatalogEntry> {
        self.all().featured()
    }

    pub fn find(&self, id: i64) -> Option<CatalogEntry> {
        self.all().find(id).cloned()
    }

    /// Listing for one page, overlay ids shifted into the page's namespace
    pub fn page_entries<K: CategoryScheme>(&self, ns: ViewNamespace, key: K) -> Vec<CatalogEntry> {
        self.all().page_entries(ns, key)
    }

    /// Overlay record by id, active or not (admin editing)
    pub fn overlay_entry(&self, id: i64) -> Option<OverlayEntry> {
        self.inner
            .store
            .load_overlay()
            .into_iter()
            .find(|e| e.id() == id)
    }

    pub fn overlay_entries(&self) -> Vec<OverlayEntry> {
        self.inner.store.load_overlay()
    }

    // =========================================================================
    // Subscribe
    // =========================================================================

    pub fn subscribe(
        &self,
        channel: ChangeChannel,
        handler: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.bus.subscribe(channel, handler)
    }

    /// Handler runs on every refresh trigger (all four channels)
    pub fn subscribe_refresh(
        &self,
        handler: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.bus.subscribe_refresh(handler)
    }

    /// Ask subscribers to re-derive state without a data change
    pub fn force_refresh(&self) {
        self.inner.bus.publish(ChangeEvent::ForceRefresh);
    }

    /// Reserve an id ahead of [`CatalogService::create_with_id`]
    ///
    /// The reservation ends when the guard drops, so an abandoned form does
    /// not hold the id.
    pub fn allocate_id(&self, partition: IdPartition) -> ReservedId {
        let overlay = self.inner.store.load_overlay();
        let known = self.known_ids(&overlay);
        self.inner.ids.reserve(partition, &known)
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Replace the whole overlay collection
    ///
    /// Returns `false` if the write was rejected or failed; the previous
    /// state is kept and the failure logged.
    pub fn save(&self, entries: Vec<OverlayEntry>, notify: Notify) -> bool {
        self.transact(notify, |txn| {
            txn.entries = entries;
            txn.dirty = true;
            Ok(())
        })
        .is_ok()
    }

    /// Create a freely-added overlay entry
    pub fn create(&self, payload: OverlayCreate) -> CatalogResult<OverlayEntry> {
        self.create_in(IdPartition::Free, payload)
    }

    /// Create an overlay entry with an id from `partition`
    pub fn create_in(&self, partition: IdPartition, payload: OverlayCreate) -> CatalogResult<OverlayEntry> {
        self.transact(Notify::Broadcast, |txn| {
            let id = txn.allocate(partition);
            Ok(txn.insert(new_overlay_entry(id, payload, now_millis())))
        })
    }

    /// Create an overlay entry under an id reserved by [`CatalogService::allocate_id`]
    pub fn create_with_id(
        &self,
        reserved: ReservedId,
        payload: OverlayCreate,
    ) -> CatalogResult<OverlayEntry> {
        let id = reserved.id();
        self.transact(Notify::Broadcast, |txn| {
            Ok(txn.insert(new_overlay_entry(id, payload, now_millis())))
        })
    }

    pub fn update(&self, id: i64, patch: OverlayUpdate) -> CatalogResult<OverlayEntry> {
        self.transact(Notify::Broadcast, |txn| {
            let entry = txn.get_mut(id)?;
            patch.apply_to(entry);
            entry.touch(now_millis());
            Ok(entry.clone())
        })
    }

    /// Hard delete
    pub fn delete(&self, id: i64) -> CatalogResult<()> {
        self.transact(Notify::Broadcast, |txn| txn.remove(id).map(|_| ()))
    }

    pub fn set_active(&self, id: i64, active: bool) -> CatalogResult<OverlayEntry> {
        self.transact(Notify::Broadcast, |txn| {
            let entry = txn.get_mut(id)?;
            entry.is_active = active;
            entry.touch(now_millis());
            Ok(entry.clone())
        })
    }

    /// Flip `is_active`, returning the new value
    pub fn toggle_active(&self, id: i64) -> CatalogResult<bool> {
        self.transact(Notify::Broadcast, |txn| {
            let entry = txn.get_mut(id)?;
            entry.is_active = !entry.is_active;
            entry.touch(now_millis());
            Ok(entry.is_active)
        })
    }

    /// Flip `featured`, returning the new value
    pub fn toggle_featured(&self, id: i64) -> CatalogResult<bool> {
        self.transact(Notify::Broadcast, |txn| {
            let entry = txn.get_mut(id)?;
            entry.featured = !entry.featured;
            entry.touch(now_millis());
            Ok(entry.featured)
        })
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn known_ids(&self, overlay: &[OverlayEntry]) -> HashSet<i64> {
        self.inner
            .builtin
            .iter()
            .map(|e| e.id)
            .chain(overlay.iter().map(|e| e.id()))
            .collect()
    }

    /// Run `f` against the overlay and commit if it changed anything
    pub(crate) fn transact<R>(
        &self,
        notify: Notify,
        f: impl FnOnce(&mut OverlayTxn<'_>) -> CatalogResult<R>,
    ) -> CatalogResult<R> {
        let (result, changed, pending) = {
            let _guard = self.inner.write_lock.lock();
            let entries = self.inner.store.load_overlay();
            let known = self.known_ids(&entries);
            let mut txn = OverlayTxn {
                entries,
                known,
                allocator: &self.inner.ids,
                allocated: Vec::new(),
                changed: Vec::new(),
                dirty: false,
            };

            let mut pending = None;
            let result = f(&mut txn).and_then(|value| {
                if txn.dirty {
                    pending = Some(self.commit(&txn.entries)?);
                }
                Ok(value)
            });
            self.inner.ids.release(txn.allocated.iter().copied());
            let changed = if txn.dirty { Some(txn.changed) } else { None };
            (result, changed, pending)
        };

        if let (Ok(_), Some(changed)) = (&result, changed)
            && notify == Notify::Broadcast
        {
            self.announce(&changed);
        }
        if let Some(event) = pending {
            self.inner.store.notify(&event);
        }
        result
    }

    /// Validate and persist, then invalidate the cache
    ///
    /// Returns the storage event other sessions still have to receive.
    fn commit(&self, entries: &[OverlayEntry]) -> CatalogResult<StorageEvent> {
        let collisions = find_collisions(
            self.inner.builtin.iter().map(|e| e.id),
            entries.iter().map(|e| e.id()),
        );
        if !collisions.is_empty() {
            tracing::error!(?collisions, "Rejected overlay write with colliding ids");
            return Err(CatalogError::IdCollision(collisions));
        }

        let event = match self.inner.store.write_overlay(entries) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, entries = entries.len(), "Failed to persist overlay");
                return Err(e.into());
            }
        };

        self.inner.cache.invalidate();
        tracing::debug!(entries = entries.len(), "Overlay committed");
        Ok(event)
    }

    fn announce(&self, changed: &[i64]) {
        self.inner.bus.publish(ChangeEvent::CatalogUpdated);
        for id in changed {
            self.inner.bus.publish(ChangeEvent::ItemChanged { id: *id });
        }
    }
}

fn new_overlay_entry(id: i64, payload: OverlayCreate, now: i64) -> OverlayEntry {
    OverlayEntry {
        entry: CatalogEntry {
            id,
            product_code: payload.product_code,
            title: payload.title,
            price: payload
                .price
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| PRICE_ON_REQUEST.to_string()),
            image: payload.image.unwrap_or_default(),
            images: payload.images.unwrap_or_default(),
            description: payload.description,
            category: payload.category,
            specifications: payload.specifications.unwrap_or_default(),
        },
        is_active: payload.is_active.unwrap_or(true),
        featured: payload.featured.unwrap_or(false),
        created_at: now,
        updated_at: now,
        source_id: None,
    }
}

/// Working copy of the overlay inside [`CatalogService::transact`]
pub(crate) struct OverlayTxn<'a> {
    pub(crate) entries: Vec<OverlayEntry>,
    known: HashSet<i64>,
    allocator: &'a IdAllocator,
    allocated: Vec<i64>,
    changed: Vec<i64>,
    pub(crate) dirty: bool,
}

impl OverlayTxn<'_> {
    pub(crate) fn allocate(&mut self, partition: IdPartition) -> i64 {
        let id = self.allocator.next_id(partition, &self.known);
        self.known.insert(id);
        self.allocated.push(id);
        id
    }

    pub(crate) fn insert(&mut self, entry: OverlayEntry) -> OverlayEntry {
        self.known.insert(entry.id());
        self.changed.push(entry.id());
        self.dirty = true;
        self.entries.push(entry.clone());
        entry
    }

    pub(crate) fn get_mut(&mut self, id: i64) -> CatalogResult<&mut OverlayEntry> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id() == id)
            .ok_or(CatalogError::NotFound(id))?;
        self.changed.push(id);
        self.dirty = true;
        Ok(entry)
    }

    pub(crate) fn remove(&mut self, id: i64) -> CatalogResult<OverlayEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.id() == id)
            .ok_or(CatalogError::NotFound(id))?;
        self.changed.push(id);
        self.dirty = true;
        Ok(self.entries.remove(pos))
    }

    pub(crate) fn contains_code(&self, product_code: &str) -> bool {
        self.entries.iter().any(|e| e.entry.product_code == product_code)
    }

    pub(crate) fn imported_sources(&self) -> HashSet<i64> {
        self.entries.iter().filter_map(|e| e.source_id).collect()
    }
}
