//! redb-based key-value store for the catalog overlay and migration flags
//!
//! A [`PersistentStore`] handle belongs to one session. Handles forked from
//! the same database share the storage and the change listeners; a committed
//! write notifies the listeners of every *other* session, the way a browser
//! `storage` event reaches other tabs but not the one that wrote.
//!
//! [`PersistentStore::write_overlay`] commits without notifying and hands the
//! [`StorageEvent`] back, so a writer holding its own locks can deliver it
//! with [`PersistentStore::notify`] once those locks are released.

use parking_lot::RwLock;
use redb::{Database, ReadableDatabase, TableDefinition};
use shared::models::OverlayEntry;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Key-value table: key = named slot, value = raw bytes (JSON or flag)
const KV_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// Serialized overlay collection
pub const OVERLAY_KEY: &str = "catalog.overlay";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One-shot operations guarded by a persisted flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationFlag {
    StaticCatalogImported,
    DemoContentSeeded,
}

impl MigrationFlag {
    pub fn key(self) -> &'static str {
        match self {
            MigrationFlag::StaticCatalogImported => "migration.static_catalog_imported",
            MigrationFlag::DemoContentSeeded => "migration.demo_content_seeded",
        }
    }
}

/// Identifies the session (tab) a store handle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Storage-change notification delivered to other sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub origin: SessionId,
}

type Listener = Arc<dyn Fn(&StorageEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, SessionId, Listener)>,
}

/// Persistent key-value store
#[derive(Clone)]
pub struct PersistentStore {
    db: Arc<Database>,
    listeners: Arc<RwLock<Listeners>>,
    session: SessionId,
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore")
            .field("session", &self.session)
            .field("listeners", &self.listeners.read().entries.len())
            .finish()
    }
}

impl PersistentStore {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            tracing::warn!(path = %parent.display(), error = %e, "Failed to create store directory");
        }
        Self::init(Database::create(path)?)
    }

    /// Open in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let db =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(KV_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            listeners: Arc::new(RwLock::new(Listeners::default())),
            session: SessionId::next(),
        })
    }

    /// Handle onto the same storage for another session
    pub fn fork_session(&self) -> Self {
        Self {
            db: self.db.clone(),
            listeners: self.listeners.clone(),
            session: SessionId::next(),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    // ========== Raw KV ==========

    pub fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV_TABLE)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    pub fn put_raw(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let event = self.write(key, value)?;
        self.notify(&event);
        Ok(())
    }

    /// Commit one key; listeners are not called
    fn write(&self, key: &str, value: &[u8]) -> StoreResult<StorageEvent> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;

        Ok(StorageEvent {
            key: key.to_string(),
            origin: self.session,
        })
    }

    // ========== Overlay ==========

    /// Load the overlay collection
    ///
    /// Absent, unreadable or corrupt data degrades to an empty collection.
    pub fn load_overlay(&self) -> Vec<OverlayEntry> {
        let bytes = match self.get_raw(OVERLAY_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Overlay store unavailable, using empty overlay");
                return Vec::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, bytes = bytes.len(), "Overlay data corrupt, using empty overlay");
                Vec::new()
            }
        }
    }

    /// Serialize and write the full overlay collection
    ///
    /// Serialization happens before the transaction opens, so a failure
    /// leaves the previous state untouched.
    pub fn save_overlay(&self, entries: &[OverlayEntry]) -> StoreResult<()> {
        let event = self.write_overlay(entries)?;
        self.notify(&event);
        Ok(())
    }

    /// Like [`PersistentStore::save_overlay`], but other sessions are not
    /// told yet; pass the returned event to [`PersistentStore::notify`]
    pub fn write_overlay(&self, entries: &[OverlayEntry]) -> StoreResult<StorageEvent> {
        let value = serde_json::to_vec(entries)?;
        self.write(OVERLAY_KEY, &value)
    }

    // ========== Migration flags ==========

    pub fn flag(&self, flag: MigrationFlag) -> bool {
        match self.get_raw(flag.key()) {
            Ok(value) => value.is_some_and(|v| v == b"1"),
            Err(e) => {
                tracing::warn!(flag = flag.key(), error = %e, "Failed to read migration flag");
                false
            }
        }
    }

    pub fn set_flag(&self, flag: MigrationFlag) -> StoreResult<()> {
        self.put_raw(flag.key(), b"1")
    }

    // ========== Storage change listeners ==========

    /// Register a listener for writes made by other sessions
    ///
    /// Returns a handle for [`PersistentStore::unwatch`].
    pub fn watch(&self, listener: impl Fn(&StorageEvent) + Send + Sync + 'static) -> u64 {
        let listener: Listener = Arc::new(listener);
        let mut listeners = self.listeners.write();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.push((id, self.session, listener));
        id
    }

    pub fn unwatch(&self, id: u64) {
        self.listeners.write().entries.retain(|(lid, _, _)| *lid != id);
    }

    /// Deliver `event` to the listeners of every session but its origin
    pub fn notify(&self, event: &StorageEvent) {
        // Snapshot first: listeners may write back into the store
        let targets: Vec<Listener> = self
            .listeners
            .read()
            .entries
            .iter()
            .filter(|(_, session, _)| *session != event.origin)
            .map(|(_, _, l)| l.clone())
            .collect();

        for listener in targets {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::CatalogEntry;
    use std::sync::atomic::AtomicUsize;

    fn overlay(id: i64) -> OverlayEntry {
        OverlayEntry {
            entry: CatalogEntry {
                id,
                product_code: format!("OV-{id}"),
                title: "Granit Mezar".to_string(),
                price: "1000".to_string(),
                image: String::new(),
                images: vec![],
                description: None,
                category: "Granit Mezar Modelleri".to_string(),
                specifications: vec![],
            },
            is_active: true,
            featured: false,
            created_at: 1,
            updated_at: 1,
            source_id: None,
        }
    }

    #[test]
    fn test_overlay_roundtrip() {
        let store = PersistentStore::open_in_memory().unwrap();
        assert!(store.load_overlay().is_empty());

        store.save_overlay(&[overlay(1), overlay(2)]).unwrap();
        let loaded = store.load_overlay();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].id(), 2);
    }

    #[test]
    fn test_corrupt_overlay_degrades_to_empty() {
        let store = PersistentStore::open_in_memory().unwrap();
        store.put_raw(OVERLAY_KEY, b"{not json").unwrap();
        assert!(store.load_overlay().is_empty());
    }

    #[test]
    fn test_flags() {
        let store = PersistentStore::open_in_memory().unwrap();
        assert!(!store.flag(MigrationFlag::StaticCatalogImported));
        store.set_flag(MigrationFlag::StaticCatalogImported).unwrap();
        assert!(store.flag(MigrationFlag::StaticCatalogImported));
        assert!(!store.flag(MigrationFlag::DemoContentSeeded));
    }

    #[test]
    fn test_listeners_skip_writing_session() {
        let store = PersistentStore::open_in_memory().unwrap();
        let other = store.fork_session();
        assert_ne!(store.session(), other.session());

        let own_hits = Arc::new(AtomicUsize::new(0));
        let other_hits = Arc::new(AtomicUsize::new(0));
        {
            let own_hits = own_hits.clone();
            store.watch(move |_| {
                own_hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        let handle = {
            let other_hits = other_hits.clone();
            other.watch(move |event| {
                assert_eq!(event.key, OVERLAY_KEY);
                other_hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        store.save_overlay(&[overlay(1)]).unwrap();
        assert_eq!(own_hits.load(Ordering::SeqCst), 0);
        assert_eq!(other_hits.load(Ordering::SeqCst), 1);
        assert_eq!(other.load_overlay().len(), 1);

        other.unwatch(handle);
        store.save_overlay(&[]).unwrap();
        assert_eq!(other_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_write_overlay_defers_notification() {
        let store = PersistentStore::open_in_memory().unwrap();
        let other = store.fork_session();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = hits.clone();
            other.watch(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        let event = store.write_overlay(&[overlay(3)]).unwrap();
        assert_eq!(event.origin, store.session());
        assert_eq!(other.load_overlay().len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        store.notify(&event);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_disk_store_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.redb");
        {
            let store = PersistentStore::open(&path).unwrap();
            store.save_overlay(&[overlay(5)]).unwrap();
            store.set_flag(MigrationFlag::DemoContentSeeded).unwrap();
        }
        let store = PersistentStore::open(&path).unwrap();
        assert_eq!(store.load_overlay()[0].id(), 5);
        assert!(store.flag(MigrationFlag::DemoContentSeeded));
    }
}
