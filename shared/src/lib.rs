//! Shared types for the catalog sync layer
//!
//! Data model for built-in and overlay catalog entries, change-notification
//! types and small utilities used across crates.

pub mod message;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use message::{ChangeChannel, ChangeEvent};
pub use models::{CatalogEntry, OverlayCreate, OverlayEntry, OverlayUpdate, SpecField};
