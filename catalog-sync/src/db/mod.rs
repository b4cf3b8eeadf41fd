//! Storage Module
//!
//! Embedded redb key-value store holding the overlay and migration flags.

pub mod store;

pub use store::{
    MigrationFlag, OVERLAY_KEY, PersistentStore, SessionId, StorageEvent, StoreError, StoreResult,
};
